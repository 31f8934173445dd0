//! CLI command implementations for herakles-proc-mem-graph.
//!
//! - `check`: System validation
//! - `config`: Configuration file generation and `--show-config`
//! - `render`: Offline chart rendering from recorded events
//! - `sample`: One-shot /proc sampling
//! - `generate`: Synthetic event file generation

pub mod check;
pub mod config;
pub mod generate;
pub mod render;
pub mod sample;

pub use check::command_check;
pub use config::{command_config, show_config};
pub use generate::command_generate_testdata;
pub use render::command_render;
pub use sample::command_sample;
