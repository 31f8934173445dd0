//! Offline rendering of recorded producer events.

use anyhow::{anyhow, Context};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use herakles_proc_mem_graph::chart::ChartRenderer;
use herakles_proc_mem_graph::config::Config;
use herakles_proc_mem_graph::ingest::{parse_events, Ingestor};
use herakles_proc_mem_graph::store::TimeSeriesStore;

/// Replays `input` into a fresh store and renders the chart of `pid`.
pub fn render_events_file(input: &Path, pid: u32, config: &Config) -> anyhow::Result<String> {
    let content = fs::read_to_string(input)
        .with_context(|| format!("Failed to read event file {}", input.display()))?;
    let events = parse_events(&content)
        .with_context(|| format!("Failed to parse event file {}", input.display()))?;
    debug!("Loaded {} events from {}", events.len(), input.display());

    let mut store = TimeSeriesStore::with_capacity(config.series_capacity());
    let mut ingestor = Ingestor::new();
    for event in &events {
        ingestor.apply_event(&mut store, event);
    }
    let stats = ingestor.stats();
    info!(
        "Replayed events: accepted={}, duplicates={}, expired={}, evicted={}, rejected={}",
        stats.accepted, stats.duplicates, stats.expired, stats.evicted, stats.rejected
    );

    let extrema = store
        .get_extrema(pid)
        .ok_or_else(|| anyhow!("Process {} does not appear in {}", pid, input.display()))?;
    let mut renderer = ChartRenderer::new(config.chart_config()?)?;
    Ok(renderer.render_to_string(&extrema, &store.get_series(pid)))
}

pub fn command_render(
    input: &Path,
    pid: u32,
    output: Option<PathBuf>,
    config: &Config,
) -> anyhow::Result<()> {
    let svg = render_events_file(input, pid, config)?;

    match output {
        Some(path) if path.to_string_lossy() != "-" => {
            fs::write(&path, svg)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("✅ Chart for pid {} written to: {}", pid, path.display());
        }
        _ => print!("{}", svg),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVENTS: &str = r#"{"type":"sample","pid":100,"metric":"RSS","moment":0,"bytes":1048576}
{"type":"sample","pid":100,"metric":0,"moment":10,"bytes":2097152}
{"type":"sample","pid":100,"metric":"VSZ","moment":20,"bytes":1}
"#;

    #[test]
    fn renders_recorded_process() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("events.jsonl");
        fs::write(&input, EVENTS).unwrap();

        let svg = render_events_file(&input, 100, &Config::default()).unwrap();
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("graph-path-RSS"));
    }

    #[test]
    fn unknown_pid_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("events.jsonl");
        fs::write(&input, EVENTS).unwrap();

        let err = render_events_file(&input, 7, &Config::default()).unwrap_err();
        assert!(err.to_string().contains("Process 7"));
    }

    #[test]
    fn malformed_file_names_the_line() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("events.jsonl");
        fs::write(&input, "{\"type\":\"sample\"}\n").unwrap();

        let err = render_events_file(&input, 1, &Config::default()).unwrap_err();
        assert!(format!("{:#}", err).contains("line 1"));
    }
}
