use std::fs;
use std::time::Duration;

use herakles_proc_mem_graph::config::{
    load_config, validate_effective_config, Config, ConfigError, DEFAULT_PORT,
};
use herakles_proc_mem_graph::metric::MetricKind;

#[test]
fn yaml_file_overrides_only_given_keys() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("graph.yaml");
    fs::write(
        &path,
        "sample-interval-secs: 2\nseries_capacity: 600\nhidden_metrics: [PB]\nprefers_dark: true\n",
    )
    .unwrap();

    let config = load_config(Some(&path)).unwrap();
    assert_eq!(config.sample_interval(), Duration::from_secs(2));
    assert_eq!(config.series_capacity(), 600);
    assert_eq!(config.port(), DEFAULT_PORT);
    assert!(validate_effective_config(&config).is_ok());

    let chart = config.chart_config().unwrap();
    assert!(chart.prefers_dark);
    assert!(chart.visibility.is_visible(MetricKind::Uss));
    assert!(!chart.visibility.is_visible(MetricKind::Pb));
}

#[test]
fn format_follows_extension() {
    let dir = tempfile::tempdir().unwrap();

    let json = dir.path().join("graph.json");
    fs::write(&json, r#"{"port": 9400, "chart_width": 1024.0}"#).unwrap();
    let config = load_config(Some(&json)).unwrap();
    assert_eq!(config.port, Some(9400));
    assert_eq!(config.chart_config().unwrap().container_width, 1024.0);

    let toml = dir.path().join("graph.toml");
    fs::write(&toml, "port = 9401\nenable_telemetry = false\n").unwrap();
    let config = load_config(Some(&toml)).unwrap();
    assert_eq!(config.port, Some(9401));
    assert!(!config.enable_telemetry());
    assert!(config.enable_health());
}

#[test]
fn missing_file_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.yaml");

    match load_config(Some(&path)) {
        Err(ConfigError::Io { path: reported, .. }) => assert_eq!(reported, path),
        other => panic!("expected io error, got {other:?}"),
    }
}

#[test]
fn malformed_file_is_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("graph.json");
    fs::write(&path, "{ port: ").unwrap();
    assert!(matches!(load_config(Some(&path)), Err(ConfigError::Json(_))));
}

#[test]
fn geometry_errors_surface_through_validation() {
    let config = Config {
        padding_percent: Some(0.6),
        ..Config::default()
    };
    assert!(matches!(
        validate_effective_config(&config),
        Err(ConfigError::Chart(_))
    ));
}
