//! Per-process memory charts.
//!
//! Samples land in a bounded [`store::TimeSeriesStore`] keyed by process and
//! [`metric::MetricKind`]; [`chart::ChartRenderer`] turns one process's series
//! into a self-contained SVG. The [`sampler`] reads `/proc`, the [`ingest`]
//! adapter validates producer events before they reach the store.

pub mod chart;
pub mod coalesce;
pub mod config;
pub mod error;
pub mod ingest;
pub mod metric;
pub mod sampler;
pub mod store;
