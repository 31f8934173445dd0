//! SVG chart endpoint.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{debug, instrument};

use crate::state::SharedState;

#[derive(Debug)]
pub enum ChartError {
    UnknownProcess(u32),
}

impl IntoResponse for ChartError {
    fn into_response(self) -> axum::response::Response {
        match self {
            ChartError::UnknownProcess(pid) => (
                StatusCode::NOT_FOUND,
                [("Content-Type", "text/plain; charset=utf-8")],
                format!("Unknown process {pid}\n"),
            )
                .into_response(),
        }
    }
}

/// Handler for the /chart/{pid} endpoint.
#[instrument(skip(state))]
pub async fn chart_handler(
    State(state): State<SharedState>,
    Path(pid): Path<u32>,
) -> Result<impl IntoResponse, ChartError> {
    debug!("Processing /chart/{} request", pid);
    state.health_stats.record_http_request();

    let svg = state.chart(pid).await.ok_or(ChartError::UnknownProcess(pid))?;
    Ok((
        StatusCode::OK,
        [
            ("Content-Type", "image/svg+xml"),
            ("Cache-Control", "no-store"),
        ],
        svg.to_string(),
    ))
}
