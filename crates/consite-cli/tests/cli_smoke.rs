use std::process::Command;

use consite_core::{EvidenceFeature, Footprint, Sfid};
use consite_delin::{load_config, load_report, load_sites, write_scene, Scene};
use geo::Point;

fn consite() -> Command {
    Command::new(env!("CARGO_BIN_EXE_consite"))
}

#[test]
fn config_command_writes_a_loadable_default() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("pipeline.yaml");
    let status = consite()
        .args(["-q", "config", "--out"])
        .arg(&path)
        .status()
        .expect("run consite config");
    assert!(status.success());
    let config = load_config(&path).expect("load config");
    assert_eq!(config.consolidation_distance, 250.0);
}

#[test]
fn run_then_summarize() {
    let dir = tempfile::tempdir().expect("tempdir");
    let scene_path = dir.path().join("scene.json");
    let scene = Scene {
        evidence: vec![EvidenceFeature {
            sfid: Sfid::new("a"),
            rule: "SCS1".to_string(),
            buffer_distance: 100.0,
            shape: Footprint::Point(Point::new(0.0, 0.0)),
        }],
        ..Scene::default()
    };
    write_scene(&scene_path, &scene).expect("write scene");
    let out = dir.path().join("out");

    let status = consite()
        .args(["-q", "run", "--concurrency", "2", "--scene"])
        .arg(&scene_path)
        .arg("--out")
        .arg(&out)
        .status()
        .expect("run consite run");
    assert!(status.success());
    assert_eq!(load_sites(&out.join("consites.json")).expect("sites").len(), 1);
    let report = load_report(&out.join("run_report.json")).expect("report");
    assert_eq!(report.committed, 1);

    let summary = consite()
        .args(["summarize", "--report"])
        .arg(out.join("run_report.json"))
        .output()
        .expect("run consite summarize");
    assert!(summary.status.success());
    let text = String::from_utf8_lossy(&summary.stdout);
    assert!(text.contains("committed:   1"));
}

#[test]
fn missing_scene_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let status = consite()
        .args(["-q", "run", "--scene"])
        .arg(dir.path().join("absent.json"))
        .arg("--out")
        .arg(dir.path().join("out"))
        .status()
        .expect("run consite run");
    assert!(!status.success());
}
