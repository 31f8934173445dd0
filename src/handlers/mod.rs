//! HTTP endpoint handlers.
//!
//! - `/chart/{pid}`: SVG chart of one process
//! - `/processes`: known processes (plain text)
//! - `/health`: sampler and renderer statistics
//! - `/metrics`: Prometheus telemetry of the server itself
//! - `/doc`: documentation

pub mod chart;
pub mod doc;
pub mod health;
pub mod metrics;
pub mod processes;

pub use chart::chart_handler;
pub use doc::doc_handler;
pub use health::health_handler;
pub use metrics::metrics_handler;
pub use processes::processes_handler;
