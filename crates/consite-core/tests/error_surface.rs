use consite_core::errors::{ErrorInfo, SiteError};

fn sample_info(code: &str, message: &str) -> ErrorInfo {
    ErrorInfo::new(code, message)
        .with_context("proto_site", 7)
        .with_context("stage", "chop")
}

#[test]
fn config_errors_are_fatal() {
    let err = SiteError::Config(sample_info("zero_dilation", "distance must be non-zero"));
    assert_eq!(err.info().code, "zero_dilation");
    assert!(err.is_fatal());
}

#[test]
fn geometry_and_unit_errors_are_recoverable() {
    let geometry = SiteError::Geometry(sample_info("explode_failed", "degenerate ring"));
    let unit = SiteError::Unit(sample_info("timeout", "stage budget exceeded"));
    assert!(!geometry.is_fatal());
    assert!(!unit.is_fatal());
    assert!(unit.info().context.contains_key("proto_site"));
}

#[test]
fn display_renders_context_and_hint() {
    let err = SiteError::Unit(sample_info("timeout", "stage budget exceeded").with_hint("raise unit_timeout_secs"));
    let rendered = err.to_string();
    assert!(rendered.starts_with("unit error: stage budget exceeded (code: timeout)"));
    assert!(rendered.contains("proto_site=7"));
    assert!(rendered.contains("hint: raise unit_timeout_secs"));
}

#[test]
fn errors_serialize_with_family_tag() {
    let err = SiteError::Serde(ErrorInfo::new("json_read", "eof"));
    let json = serde_json::to_value(&err).expect("serialize");
    assert_eq!(json["family"], "Serde");
    let back: SiteError = serde_json::from_value(json).expect("deserialize");
    assert_eq!(back, err);
}
