//! On-disk formats: canonical JSON for scenes, reports and scratch
//! intermediates, YAML for configurations, and content hashes for
//! provenance.

use std::fs;
use std::path::Path;

use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};

use consite_core::errors::{ErrorInfo, SiteError};

pub(crate) fn io_error(code: &str, path: &Path, err: impl ToString) -> SiteError {
    SiteError::Serde(ErrorInfo::new(code, err.to_string()).with_context("path", path.display()))
}

fn encode_error(code: &str, err: impl ToString) -> SiteError {
    SiteError::Serde(ErrorInfo::new(code, err.to_string()))
}

/// JSON with object keys sorted at every level.
///
/// The value is routed through `serde_json::Value`, whose maps are ordered,
/// so struct field order and hash-map iteration order never leak into the
/// bytes.
pub(crate) fn canonical_json<T: Serialize>(value: &T) -> Result<Vec<u8>, SiteError> {
    let tree = serde_json::to_value(value).map_err(|err| encode_error("json_encode", err))?;
    serde_json::to_vec(&tree).map_err(|err| encode_error("json_encode", err))
}

/// Hex SHA-256 of the canonical JSON form.
pub(crate) fn content_hash<T: Serialize>(value: &T) -> Result<String, SiteError> {
    let digest = Sha256::digest(canonical_json(value)?);
    Ok(format!("{:x}", digest))
}

pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T, code: &str) -> Result<(), SiteError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| io_error(code, parent, err))?;
    }
    fs::write(path, canonical_json(value)?).map_err(|err| io_error(code, path, err))
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path, code: &str) -> Result<T, SiteError> {
    let bytes = fs::read(path).map_err(|err| io_error(code, path, err))?;
    serde_json::from_slice(&bytes).map_err(|err| io_error(code, path, err))
}

pub(crate) fn to_yaml<T: Serialize>(value: &T) -> Result<String, SiteError> {
    serde_yaml::to_string(value).map_err(|err| encode_error("yaml_encode", err))
}

pub(crate) fn read_yaml<T: DeserializeOwned>(path: &Path, code: &str) -> Result<T, SiteError> {
    let bytes = fs::read(path).map_err(|err| io_error(code, path, err))?;
    serde_yaml::from_slice(&bytes).map_err(|err| io_error(code, path, err))
}
