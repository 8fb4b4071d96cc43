use consite_core::ProtoSiteId;
use consite_delin::{Scratch, ScratchLocation};
use consite_geom::rectangle;
use geo::coord;

fn shapes() -> Vec<geo::Polygon<f64>> {
    vec![rectangle(coord! { x: 0.0, y: 0.0 }, coord! { x: 1.0, y: 1.0 })]
}

#[test]
fn in_memory_arena_keeps_named_values() {
    let mut scratch = Scratch::open(&ScratchLocation::InMemory, ProtoSiteId::from_raw(1)).unwrap();
    scratch.put("erase", &shapes()).unwrap();
    scratch.put("boundary", &[]).unwrap();
    assert!(scratch.dir().is_none());
    assert_eq!(scratch.get("erase").unwrap().len(), 1);
    assert!(scratch.get("missing").is_none());
    assert_eq!(scratch.names(), vec!["boundary", "erase"]);
}

#[test]
fn on_disk_arena_is_removed_on_drop() {
    let root = tempfile::tempdir().expect("tempdir");
    let location = ScratchLocation::OnDisk {
        dir: root.path().to_path_buf(),
        keep_intermediate: false,
    };
    let unit_dir = root.path().join("proto_3");
    {
        let mut scratch = Scratch::open(&location, ProtoSiteId::from_raw(3)).unwrap();
        scratch.put("erase", &shapes()).unwrap();
        assert!(unit_dir.join("erase.json").exists());
    }
    assert!(!unit_dir.exists());
}

#[test]
fn on_disk_arena_can_keep_intermediates() {
    let root = tempfile::tempdir().expect("tempdir");
    let location = ScratchLocation::OnDisk {
        dir: root.path().to_path_buf(),
        keep_intermediate: true,
    };
    {
        let mut scratch = Scratch::open(&location, ProtoSiteId::from_raw(7)).unwrap();
        scratch.put("split_sites", &shapes()).unwrap();
    }
    let kept = root.path().join("proto_7").join("split_sites.json");
    let bytes = std::fs::read(kept).expect("kept file");
    let restored: Vec<geo::Polygon<f64>> = serde_json::from_slice(&bytes).expect("json");
    assert_eq!(restored, shapes());
}
