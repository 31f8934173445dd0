//! Documentation endpoint handler.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use tracing::{debug, instrument};

use crate::handlers::health::FOOTER_TEXT;
use crate::state::SharedState;

/// Build metadata emitted by build.rs.
pub fn build_info() -> String {
    format!(
        "{} (git {}, built {})",
        env!("CARGO_PKG_VERSION"),
        option_env!("VERGEN_GIT_SHA").unwrap_or("unknown"),
        option_env!("VERGEN_BUILD_TIMESTAMP").unwrap_or("unknown")
    )
}

/// Handler for the /doc endpoint.
#[instrument(skip(state))]
pub async fn doc_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /doc request");
    state.health_stats.record_http_request();

    let config = &state.config;
    let port = config.port();
    let doc = format!(
        r#"HERAKLES PROCESS MEMORY GRAPH - DOCUMENTATION
=============================================

VERSION: {build}
DESCRIPTION: Live per-process RSS/PSS/USS memory charts rendered as SVG

HTTP ENDPOINTS
--------------
GET /chart/{{pid}}  - SVG memory chart of one process (404 for unknown pid)
GET /processes    - Processes currently held in memory (plain text)
GET /health       - Sampler and renderer statistics (plain text)
GET /metrics      - Prometheus telemetry of this server
GET /doc          - This documentation (plain text)

METRICS DRAWN
-------------
RSS  - Resident Set Size, sampled every {sample}s from /proc/<pid>/statm
PSS  - Proportional Set Size, sampled every {smaps}s from smaps_rollup
USS  - Unique Set Size, sampled every {smaps}s (hidden unless enabled)

Each process keeps at most {capacity} samples per metric; the oldest
samples are dropped first.

CONFIGURATION
-------------
Config file locations (in order):
1. CLI specified: -c /path/to/config.yaml
2. System config: /etc/herakles/proc-mem-graph.yaml
3. Current directory: ./herakles-proc-mem-graph.yaml

Key configuration options:
- port: HTTP listen port (default: 9216)
- bind: Bind address (default: 0.0.0.0)
- sample_interval_secs / smaps_interval_secs: sampling cadence
- series_capacity: samples kept per process and metric
- chart_width / chart_height: SVG size in pixels
- prefers_dark: dark chart theme
- hidden_metrics: metrics not drawn (default: USS, PB)

TLS/SSL Configuration:
- enable_tls: Enable HTTPS (default: false)
- tls_cert_path: Path to TLS certificate (PEM format)
- tls_key_path: Path to TLS private key (PEM format)

CLI COMMANDS
------------
herakles-proc-mem-graph                         - Start the server
herakles-proc-mem-graph check --all             - Validate system requirements
herakles-proc-mem-graph config -o config.yaml   - Generate config file
herakles-proc-mem-graph sample --pid 1 -n 3     - Print samples of one process
herakles-proc-mem-graph render -i events.jsonl --pid 1 -o chart.svg
                                                - Render recorded events offline
herakles-proc-mem-graph generate-testdata       - Write a synthetic event file

EXAMPLE USAGE
-------------
curl http://localhost:{port}/processes
curl http://localhost:{port}/chart/1 > chart.svg

{footer}
"#,
        build = build_info(),
        sample = config.sample_interval().as_secs(),
        smaps = config.smaps_interval().as_secs(),
        capacity = config.series_capacity(),
        port = port,
        footer = FOOTER_TEXT
    );

    (
        StatusCode::OK,
        [("Content-Type", "text/plain; charset=utf-8")],
        doc,
    )
}
