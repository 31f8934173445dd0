use assert_cmd::prelude::*;
use std::fs;
use std::process::{Command, Output};

const BIN: &str = "herakles-proc-mem-graph";

fn run(args: &[&str]) -> Output {
    Command::cargo_bin(BIN)
        .expect("binary exists")
        .args(args)
        .output()
        .expect("run binary")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn config_template_goes_to_stdout() {
    let output = run(&["--no-config", "config", "-o", "-", "--commented"]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.starts_with("# Herakles Process Memory Graph Configuration"));
    assert!(text.contains("port: 9216"));
}

#[test]
fn show_config_applies_cli_overrides() {
    let output = run(&[
        "--no-config",
        "--port",
        "9555",
        "--show-config",
        "--config-format",
        "json",
    ]);
    assert!(output.status.success());
    let config: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(config["port"], 9555);
    assert_eq!(config["series_capacity"], 10_000);
}

#[test]
fn check_config_accepts_defaults() {
    let output = run(&["--no-config", "--check-config"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("Configuration is valid"));
}

#[test]
fn check_config_rejects_invalid_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.yaml");
    fs::write(&path, "series_capacity: 0\n").unwrap();

    let output = run(&["-c", path.to_str().unwrap(), "--check-config"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("series_capacity"));
}

#[test]
fn generated_events_render_offline() {
    let dir = tempfile::tempdir().unwrap();
    let events = dir.path().join("events.jsonl");
    let chart = dir.path().join("chart.svg");

    let output = run(&[
        "--no-config",
        "generate-testdata",
        "-o",
        events.to_str().unwrap(),
        "--processes",
        "2",
        "--samples",
        "30",
    ]);
    assert!(output.status.success());

    let output = run(&[
        "--no-config",
        "render",
        "-i",
        events.to_str().unwrap(),
        "--pid",
        "1001",
        "-o",
        chart.to_str().unwrap(),
    ]);
    assert!(output.status.success());
    let svg = fs::read_to_string(&chart).unwrap();
    assert!(svg.starts_with("<svg"));
    assert!(svg.contains("graph-path graph-path-RSS"));
    assert!(svg.contains("graph-path graph-path-PSS"));
}

#[test]
fn render_to_stdout_and_unknown_pid() {
    let dir = tempfile::tempdir().unwrap();
    let events = dir.path().join("events.json");
    fs::write(
        &events,
        r#"[{"type":"sample","pid":5,"metric":"RSS","moment":0,"bytes":1048576},
            {"type":"sample","pid":5,"metric":"RSS","moment":10,"bytes":2097152}]"#,
    )
    .unwrap();

    let output = run(&["--no-config", "render", "-i", events.to_str().unwrap(), "--pid", "5"]);
    assert!(output.status.success());
    let svg = stdout(&output);
    assert!(svg.starts_with("<svg"));
    assert!(svg.trim_end().ends_with("</svg>"));

    let output = run(&["--no-config", "render", "-i", events.to_str().unwrap(), "--pid", "6"]);
    assert!(!output.status.success());
}
