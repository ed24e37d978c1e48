use super::*;
use crate::foundation::core::IntRect;

#[test]
fn defaults_are_valid() {
    let opts = RegenOpts::default();
    opts.validate().unwrap();
    assert_eq!(opts.busy_wait_ms, 200);
    assert!(!opts.batch_mode);
    assert!(opts.region_of_interest.is_empty());
    assert!(opts.resolved_max_workers() >= 1);
}

#[test]
fn partial_json_keeps_defaults() {
    let opts = RegenOpts::from_json_str(
        r#"{
            "max_workers": 3,
            "batch_mode": true,
            "region_of_interest": [{ "x": 1, "y": 2, "width": 3, "height": 4 }],
            "memory": { "reserve_fraction": 0.25 }
        }"#,
    )
    .unwrap();
    assert_eq!(opts.max_workers, Some(3));
    assert_eq!(opts.resolved_max_workers(), 3);
    assert!(opts.batch_mode);
    assert_eq!(opts.region_of_interest.rects(), &[IntRect::new(1, 2, 3, 4)]);
    assert_eq!(opts.memory.reserve_fraction, 0.25);
    assert_eq!(opts.memory.clone_cost_multiplier, 1.0);
    assert_eq!(opts.poll_interval_ms, 20);
}

#[test]
fn rejects_unknown_fields_and_bad_ranges() {
    assert!(RegenOpts::from_json_str(r#"{ "workers": 2 }"#).is_err());
    assert!(RegenOpts::from_json_str(r#"{ "max_workers": 0 }"#).is_err());
    assert!(RegenOpts::from_json_str(r#"{ "eta_smoothing": 0.0 }"#).is_err());
    assert!(RegenOpts::from_json_str(r#"{ "poll_interval_ms": 0 }"#).is_err());
    let negative = r#"{ "memory": { "clone_cost_multiplier": -1.0 } }"#;
    assert!(RegenOpts::from_json_str(negative).is_err());
}

#[test]
fn missing_file_is_reported_with_its_path() {
    let err = RegenOpts::from_path("definitely/not/here.json").unwrap_err();
    assert!(format!("{err:#}").contains("definitely/not/here.json"));
}
