//! SVG chart rendering for one process.
//!
//! The renderer only consumes plain data (`ProcessExtrema` plus
//! `SeriesSnapshot`s) and never touches the store:
//! - `config`: resolved chart geometry and theme
//! - `transform`: data-space to pixel-space mapping
//! - `grid`: adaptive gridline selection and its cache
//! - `format`: axis and current-value labels
//! - `render`: SVG markup assembly

pub mod config;
pub mod format;
pub mod grid;
pub mod render;
pub mod transform;

pub use config::ChartConfig;
pub use format::{format_kb_label, format_time_label};
pub use grid::{GridCacheStats, GridLine, MAX_HORIZONTAL_GRID_LINES, MAX_VERTICAL_GRID_LINES};
pub use render::ChartRenderer;
pub use transform::ChartTransform;
