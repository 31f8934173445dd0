//! Health check endpoint handler.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use std::sync::atomic::Ordering;
use tracing::{debug, instrument};

use crate::state::SharedState;

/// Footer text for human-readable HTTP endpoints.
pub const FOOTER_TEXT: &str = "Project: https://github.com/herakles-io/herakles-proc-mem-graph | More info: https://www.herakles.io | Support: proc-mem@herakles.io";

/// Handler for the /health endpoint.
#[instrument(skip(state))]
pub async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /health request");
    state.health_stats.record_http_request();

    // No data until the first sampler pass has landed
    let sampled = state.sampled.load(Ordering::Relaxed);
    let status = if sampled {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let message = if sampled { "OK" } else { "Waiting for first sample" };

    let ingest = state.data.read().await.ingestor.stats();
    let table = state.health_stats.render_table();

    debug!("Health check: {} - {}", status, message);
    (
        status,
        [("Content-Type", "text/plain; charset=utf-8")],
        format!(
            "{message}\n\n{table}\nsamples accepted: {}\nsamples duplicate: {}\nsamples expired: {}\nsamples evicted: {}\nsamples rejected: {}\n\n{FOOTER_TEXT}",
            ingest.accepted, ingest.duplicates, ingest.expired, ingest.evicted, ingest.rejected
        ),
    )
}
