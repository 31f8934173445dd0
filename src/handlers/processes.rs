//! Plain-text listing of the processes held by the store.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use std::fmt::Write as FmtWrite;
use tracing::{debug, instrument};

use herakles_proc_mem_graph::chart::format_kb_label;

use crate::handlers::health::FOOTER_TEXT;
use crate::state::{ProcessRow, SharedState};

/// Handler for the /processes endpoint.
#[instrument(skip(state))]
pub async fn processes_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /processes request");
    state.health_stats.record_http_request();

    let rows = state.process_rows().await;
    let precision = state.chart_config.label_precision;
    (
        StatusCode::OK,
        [("Content-Type", "text/plain; charset=utf-8")],
        format!("{}\n{FOOTER_TEXT}", render_rows(&rows, precision)),
    )
}

fn kb_cell(kb: Option<u64>, precision: usize) -> String {
    kb.map_or_else(|| "-".to_string(), |kb| format_kb_label(kb as f64, precision))
}

pub fn render_rows(rows: &[ProcessRow], precision: usize) -> String {
    let mut out = String::new();
    writeln!(out, "PROCESSES ({})", rows.len()).ok();
    writeln!(out).ok();
    writeln!(
        out,
        "{:>8} | {:>6} | {:>8} | {:>12} | {:>12} | {:>12} | chart",
        "pid", "series", "points", "max", "rss", "pss"
    )
    .ok();
    writeln!(out, "{}", "-".repeat(90)).ok();

    for row in rows {
        let max = row
            .max_kb
            .and_then(|kb| u64::try_from(kb).ok());
        writeln!(
            out,
            "{:>8} | {:>6} | {:>8} | {:>12} | {:>12} | {:>12} | /chart/{}",
            row.pid,
            row.series,
            row.points,
            kb_cell(max, precision),
            kb_cell(row.last_rss_kb, precision),
            kb_cell(row.last_pss_kb, precision),
            row.pid
        )
        .ok();
    }
    out
}
