use std::f64::consts::PI;

use consite_core::{
    AttrValue, EvidenceFeature, FieldDef, Footprint, GeometryOps, LayerFeature, Sfid,
    SiteId, SiteTemplate, SiteType,
};
use consite_delin::{
    create_con_sites, load_report, load_sites, write_report, write_sites, CoveragePercent,
    EvidenceFate, ExclusionLayers, PipelineConfig, Scene, UnitState,
};
use consite_geom::{rectangle, PlanarKernel};
use geo::{coord, Point, Polygon};

fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Polygon<f64> {
    rectangle(coord! { x: x0, y: y0 }, coord! { x: x1, y: y1 })
}

fn point_pf(id: &str, x: f64, y: f64, distance: f64) -> EvidenceFeature {
    EvidenceFeature {
        sfid: Sfid::new(id),
        rule: "SCS1".to_string(),
        buffer_distance: distance,
        shape: Footprint::Point(Point::new(x, y)),
    }
}

fn template() -> SiteTemplate {
    SiteTemplate {
        fields: vec![
            FieldDef {
                name: "SITE_NAME".into(),
                default: AttrValue::from("unnamed"),
            },
            FieldDef {
                name: "SITE_TYPE".into(),
                default: AttrValue::Null,
            },
            FieldDef {
                name: "EVIDENCE_COUNT".into(),
                default: AttrValue::Null,
            },
        ],
    }
}

fn two_cluster_scene() -> Scene {
    Scene {
        evidence: vec![
            point_pf("a", 0.0, 0.0, 100.0),
            point_pf("b", 80.0, 0.0, 100.0),
            point_pf("c", 5_000.0, 0.0, 100.0),
        ],
        template: template(),
        ..Scene::default()
    }
}

#[test]
fn two_clusters_yield_two_sites() {
    let kernel = PlanarKernel::default();
    let output = create_con_sites(&kernel, &two_cluster_scene(), &PipelineConfig::default()).unwrap();

    assert_eq!(output.sites.len(), 2);
    assert_eq!(output.report.proto_sites.len(), 2);
    assert!(output.report.failures.is_empty());
    assert_eq!(output.sites[0].evidence, vec![Sfid::new("a"), Sfid::new("b")]);
    assert_eq!(output.sites[1].evidence, vec![Sfid::new("c")]);
    assert_eq!(output.sites[0].id.as_raw(), 0);
    assert_eq!(output.sites[1].id.as_raw(), 1);

    // The isolated site is the block of `c`, off by at most one boundary
    // tolerance along its perimeter.
    let radius = 100.0;
    let isolated = kernel.area(&output.sites[1].shape);
    let allowance = 2.0 * PI * radius * PipelineConfig::default().boundary_tolerance;
    assert!(
        (isolated - PI * radius * radius).abs() <= allowance,
        "isolated site area {isolated}"
    );
    assert_eq!(output.sites[1].shape.0.len(), 1);

    let attributes = &output.sites[0].attributes;
    assert_eq!(attributes.len(), 3);
    assert_eq!(attributes["SITE_NAME"], AttrValue::from("unnamed"));
    assert_eq!(attributes["SITE_TYPE"], AttrValue::from("standard"));
    assert_eq!(attributes["EVIDENCE_COUNT"], AttrValue::from(2.0));
    assert!(!attributes.contains_key("AREA"));

    for site in &output.sites {
        for sfid in &site.evidence {
            let pf = two_cluster_scene()
                .evidence
                .into_iter()
                .find(|feature| &feature.sfid == sfid)
                .unwrap();
            assert!(site.shape.iter().any(|part| kernel.intersects(part, &pf.shape)));
        }
    }

    assert_eq!(output.report.evidence.len(), 3);
    assert!(output
        .report
        .evidence
        .iter()
        .all(|entry| matches!(entry.fate, EvidenceFate::Committed { .. })));
    let summary = output.report.summary();
    assert_eq!(summary.committed, 2);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.culled_evidence, 0);
}

#[test]
fn report_and_sites_round_trip_through_disk() {
    let kernel = PlanarKernel::default();
    let output = create_con_sites(&kernel, &two_cluster_scene(), &PipelineConfig::default()).unwrap();
    let dir = tempfile::tempdir().expect("tempdir");
    let report_path = dir.path().join("run_report.json");
    let sites_path = dir.path().join("consites.json");
    write_report(&report_path, &output.report).unwrap();
    write_sites(&sites_path, &output.sites).unwrap();
    let restored = load_report(&report_path).unwrap();
    assert_eq!(restored.summary(), output.report.summary());
    assert_eq!(restored.evidence, output.report.evidence);
    assert_eq!(restored.provenance, output.report.provenance);
    assert_eq!(load_sites(&sites_path).unwrap().len(), output.sites.len());
    assert_eq!(
        output.report.config_hash,
        PipelineConfig::default().config_hash().unwrap()
    );
}

#[test]
fn selection_restricts_delineation() {
    let kernel = PlanarKernel::default();
    let mut scene = two_cluster_scene();
    scene.selection = Some(vec![Sfid::new("c")]);
    let output = create_con_sites(&kernel, &scene, &PipelineConfig::default()).unwrap();
    assert_eq!(output.sites.len(), 1);
    assert_eq!(output.sites[0].evidence, vec![Sfid::new("c")]);

    let mut config = PipelineConfig::default();
    config.expand_selection = true;
    config.selection_distance = 200.0;
    scene.selection = Some(vec![Sfid::new("a")]);
    let expanded = create_con_sites(&kernel, &scene, &config).unwrap();
    assert_eq!(expanded.sites.len(), 1);
    assert_eq!(expanded.sites[0].evidence, vec![Sfid::new("a"), Sfid::new("b")]);
}

fn strip_config(remerge: f64) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.hydro.elimination_distance = 2.0;
    config.remerge_distance = remerge;
    config
}

fn strip_scene(strip: Polygon<f64>, evidence: Vec<EvidenceFeature>) -> Scene {
    Scene {
        evidence,
        layers: ExclusionLayers {
            hydro: vec![LayerFeature::bare(strip)],
            ..ExclusionLayers::default()
        },
        ..Scene::default()
    }
}

#[test]
fn a_small_cap_cut_by_an_exclusion_does_not_split_the_site() {
    let kernel = PlanarKernel::default();
    let scene = strip_scene(
        rect(80.0, -1_000.0, 90.0, 1_000.0),
        vec![point_pf("a", 0.0, 0.0, 100.0)],
    );
    let output = create_con_sites(&kernel, &scene, &strip_config(250.0)).unwrap();
    assert_eq!(output.report.proto_sites.len(), 1);
    assert_eq!(output.report.proto_sites[0].split_sites, 1);
    assert_eq!(output.sites.len(), 1);
    assert_eq!(output.sites[0].shape.0.len(), 1);
    let beyond = rect(91.0, -20.0, 200.0, 20.0);
    let cap = kernel
        .intersect(&output.sites[0].shape, &geo::MultiPolygon::new(vec![beyond]))
        .unwrap();
    assert!(kernel.area(&cap) < 1.0);
}

#[test]
fn a_crossing_exclusion_splits_and_remerge_distance_decides_the_parts() {
    let kernel = PlanarKernel::default();
    let pf = EvidenceFeature {
        sfid: Sfid::new("reach"),
        rule: "SCU1".to_string(),
        buffer_distance: 50.0,
        shape: Footprint::Area(rect(-150.0, -10.0, 150.0, 10.0)),
    };
    let scene = strip_scene(rect(-10.0, -1_000.0, 10.0, 1_000.0), vec![pf]);

    let merged = create_con_sites(&kernel, &scene, &strip_config(250.0)).unwrap();
    assert_eq!(merged.report.proto_sites[0].split_sites, 2);
    assert_eq!(merged.sites.len(), 1);
    assert_eq!(merged.sites[0].shape.0.len(), 1);

    let apart = create_con_sites(&kernel, &scene, &strip_config(5.0)).unwrap();
    assert_eq!(apart.report.proto_sites[0].split_sites, 2);
    assert_eq!(apart.sites.len(), 2);
    for site in &apart.sites {
        assert_eq!(site.shape.0.len(), 1);
        assert_eq!(site.evidence, vec![Sfid::new("reach")]);
    }
    let mut sides: Vec<bool> = apart
        .sites
        .iter()
        .map(|site| site.shape.0[0].exterior().0.iter().all(|c| c.x < 0.0))
        .collect();
    sides.sort();
    assert_eq!(sides, vec![false, true]);
    assert!(apart.sites.iter().any(|site| site.shape.0[0].exterior().0.iter().all(|c| c.x > 0.0)));
    assert_eq!(apart.report.proto_sites[0].sites.len(), 2);
    assert_eq!(
        apart.report.evidence[0].fate,
        EvidenceFate::Committed {
            sites: vec![SiteId::from_raw(0), SiteId::from_raw(1)]
        }
    );
}

#[test]
fn alternate_sites_ignore_transportation_and_manual_exclusions() {
    let kernel = PlanarKernel::default();
    let pf = EvidenceFeature {
        sfid: Sfid::new("reach"),
        rule: "SCU1".to_string(),
        buffer_distance: 50.0,
        shape: Footprint::Area(rect(-150.0, -10.0, 150.0, 10.0)),
    };
    let scene = Scene {
        evidence: vec![pf],
        layers: ExclusionLayers {
            transportation: vec![LayerFeature::bare(rect(-10.0, -1_000.0, 10.0, 1_000.0))],
            exclusion: vec![LayerFeature::bare(rect(60.0, -1_000.0, 70.0, 1_000.0))],
            ..ExclusionLayers::default()
        },
        ..Scene::default()
    };
    let mut config = strip_config(5.0);
    config.transportation.elimination_distance = 2.0;

    let standard = create_con_sites(&kernel, &scene, &config).unwrap();
    assert!(standard.report.proto_sites[0].split_sites > 1);

    config.site_type = SiteType::Alternate;
    let alternate = create_con_sites(&kernel, &scene, &config).unwrap();
    assert_eq!(alternate.report.proto_sites[0].split_sites, 1);
    assert_eq!(alternate.sites.len(), 1);
    assert_eq!(alternate.sites[0].shape.0.len(), 1);
}

#[test]
fn protected_evidence_keeps_a_heavily_covered_exclusion_out() {
    let kernel = PlanarKernel::default();
    let pf = EvidenceFeature {
        sfid: Sfid::new("wetland"),
        rule: "WET1".to_string(),
        buffer_distance: 50.0,
        shape: Footprint::Area(rect(-40.0, -40.0, 40.0, 40.0)),
    };
    let scene = strip_scene(rect(-20.0, -1_000.0, 20.0, 1_000.0), vec![pf]);
    let output = create_con_sites(&kernel, &scene, &strip_config(250.0)).unwrap();
    assert_eq!(output.report.proto_sites[0].split_sites, 1);
    assert_eq!(output.sites.len(), 1);

    let mut never = strip_config(5.0);
    never.hydro.coverage = CoveragePercent::NEVER;
    let carved = create_con_sites(&kernel, &scene, &never).unwrap();
    assert_eq!(carved.report.proto_sites[0].split_sites, 2);
}

#[test]
fn evidence_lost_to_an_exclusion_is_recorded_in_the_ledger() {
    let kernel = PlanarKernel::default();
    let scene = strip_scene(
        rect(-500.0, -500.0, 500.0, 500.0),
        vec![point_pf("drowned", 0.0, 0.0, 100.0)],
    );
    let output = create_con_sites(&kernel, &scene, &strip_config(250.0)).unwrap();
    assert!(output.sites.is_empty());
    assert_eq!(output.report.proto_sites[0].state, UnitState::Empty);
    assert_eq!(output.report.evidence.len(), 1);
    assert!(matches!(
        output.report.evidence[0].fate,
        EvidenceFate::Culled { .. }
    ));
    assert_eq!(output.report.summary().culled_evidence, 1);
}
