//! Loading configuration files from disk.

mod common;

use common::{ConfigBuilder, TestHarness};
use svgpng::{load_config, ConfigError};

#[test]
fn builder_output_round_trips_through_loader() {
    let harness = TestHarness::new();
    let json = ConfigBuilder::new()
        .max_files(7)
        .scale(3.0)
        .thumbnail_size(128)
        .to_json();
    let path = harness.write_input("config.json", json.as_bytes());

    let config = load_config(&path).unwrap();
    assert_eq!(config.max_files, 7);
    assert_eq!(config.scale, 3.0);
    assert_eq!(config.thumbnail_size, 128);
    assert_eq!(config.output_format, "png");
}

#[test]
fn minimal_file_uses_defaults() {
    let harness = TestHarness::new();
    let path = harness.write_input("config.json", br#"{"version": "1.0"}"#);

    let config = load_config(&path).unwrap();
    assert_eq!(config.max_files, 20);
    assert_eq!(config.input_formats, vec!["svg"]);
    assert_eq!(config.download_delay_ms, 100);
}

#[test]
fn unknown_output_format_is_rejected() {
    let harness = TestHarness::new();
    let path = harness.write_input("config.json", br#"{"outputFormat": "webp"}"#);

    assert!(matches!(
        load_config(&path),
        Err(ConfigError::SchemaValidation { .. })
    ));
}

#[test]
fn missing_file_reports_path() {
    let harness = TestHarness::new();
    let path = harness.temp_path().join("nope.json");

    match load_config(&path) {
        Err(ConfigError::ReadFile { path: reported, .. }) => assert_eq!(reported, path),
        other => panic!("unexpected result: {:?}", other),
    }
}
