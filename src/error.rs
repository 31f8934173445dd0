//! Error types shared by the store, the chart renderer and the ingest adapter.
//!
//! The store only rejects structurally invalid input; lookups for unknown
//! processes are never errors and return empty values instead.

use thiserror::Error;

/// A sample was rejected before it touched the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidSampleError {
    #[error("memory amount must not be negative: {bytes} bytes (pid {pid})")]
    NegativeAmount { pid: u32, bytes: i64 },
}

/// A metric code or name outside the closed `MetricKind` set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnknownMetricKind {
    #[error("unknown metric code {0}")]
    Code(i64),
    #[error("unknown metric name '{0}'")]
    Name(String),
}

/// Chart geometry that cannot produce a drawable graph area.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChartError {
    #[error("container size must be finite and positive, got {width}x{height}")]
    InvalidContainer { width: f64, height: f64 },

    #[error("padding_percent must be within [0, 0.5), got {0}")]
    InvalidPadding(f64),

    #[error("{name} must be finite and non-negative, got {value}")]
    InvalidSpace { name: &'static str, value: f64 },

    #[error("min_time_range must be positive, got {0}")]
    InvalidMinTimeRange(i64),

    #[error("graph area collapsed to {width}x{height} pixels")]
    EmptyGraphArea { width: f64, height: f64 },
}

/// Why a producer event was dropped at the ingest boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestError {
    #[error(transparent)]
    UnknownMetric(#[from] UnknownMetricKind),

    #[error(transparent)]
    InvalidSample(#[from] InvalidSampleError),

    #[error("sample for pid {pid} has no usable moment")]
    MissingMoment { pid: u32 },
}

impl IngestError {
    /// Short label used for the rejected-samples counter.
    pub fn reason(&self) -> &'static str {
        match self {
            IngestError::UnknownMetric(_) => "unknown_metric",
            IngestError::InvalidSample(_) => "negative_amount",
            IngestError::MissingMoment { .. } => "missing_moment",
        }
    }
}

/// A recorded event file could not be decoded.
#[derive(Debug, Error)]
#[error("invalid event on line {line}: {source}")]
pub struct EventParseError {
    pub line: usize,
    #[source]
    pub source: serde_json::Error,
}
