//! Per-proto-site scratch arena.
//!
//! Every intermediate produced while assembling a proto-site is stored
//! under a name. In memory the values simply live in the arena; on disk each
//! value is also written as canonical JSON under `<dir>/proto_<id>/` so a
//! failed unit can be inspected afterwards. The directory disappears with
//! the arena unless intermediates are kept.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use geo::Polygon;
use tracing::warn;

use consite_core::errors::SiteError;
use consite_core::ProtoSiteId;

use crate::config::ScratchLocation;
use crate::persist::{io_error, write_json};

/// Named intermediates of one proto-site.
#[derive(Debug)]
pub struct Scratch {
    proto_site: ProtoSiteId,
    layers: BTreeMap<String, Vec<Polygon<f64>>>,
    dir: Option<PathBuf>,
    keep: bool,
}

impl Scratch {
    /// Opens an arena for `proto_site` at the configured location.
    pub fn open(location: &ScratchLocation, proto_site: ProtoSiteId) -> Result<Self, SiteError> {
        let (dir, keep) = match location {
            ScratchLocation::InMemory => (None, false),
            ScratchLocation::OnDisk {
                dir,
                keep_intermediate,
            } => {
                let unit_dir = dir.join(format!("proto_{}", proto_site.as_raw()));
                fs::create_dir_all(&unit_dir).map_err(|err| io_error("scratch_dir", &unit_dir, err))?;
                (Some(unit_dir), *keep_intermediate)
            }
        };
        Ok(Self {
            proto_site,
            layers: BTreeMap::new(),
            dir,
            keep,
        })
    }

    /// Proto-site owning the arena.
    pub fn proto_site(&self) -> ProtoSiteId {
        self.proto_site
    }

    /// Directory backing the arena, when on disk.
    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Stores (or replaces) a named intermediate.
    pub fn put(&mut self, name: &str, shapes: &[Polygon<f64>]) -> Result<(), SiteError> {
        if let Some(dir) = &self.dir {
            write_json(&dir.join(format!("{name}.json")), &shapes, "scratch_write")?;
        }
        self.layers.insert(name.to_string(), shapes.to_vec());
        Ok(())
    }

    /// Returns a stored intermediate.
    pub fn get(&self, name: &str) -> Option<&[Polygon<f64>]> {
        self.layers.get(name).map(Vec::as_slice)
    }

    /// Names of all stored intermediates, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.layers.keys().map(String::as_str).collect()
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        if let Some(dir) = self.dir.take() {
            if let Err(err) = fs::remove_dir_all(&dir) {
                warn!(dir = %dir.display(), error = %err, "scratch directory not removed");
            }
        }
    }
}
