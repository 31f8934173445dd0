//! Configuration file handling.
//!
//! Every field is optional so a file only needs the keys it overrides;
//! `Config::default()` carries the effective defaults. Files are YAML, JSON
//! or TOML, chosen by extension (YAML otherwise).

use serde::{Deserialize, Serialize};
use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::chart::config as chart_defaults;
use crate::chart::ChartConfig;
use crate::coalesce::DEFAULT_COALESCE_DELAY;
use crate::error::{ChartError, UnknownMetricKind};
use crate::metric::{MetricKind, MetricVisibility};
use crate::sampler::{SamplerConfig, DEFAULT_PROC_ROOT, DEFAULT_SMAPS_BUFFER_KB, DEFAULT_SMAPS_ROLLUP_BUFFER_KB};
use crate::store::DEFAULT_SERIES_CAPACITY;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 9216;
pub const DEFAULT_SAMPLE_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_SMAPS_INTERVAL_SECS: u64 = 30;

/// Locations searched when no config file is given.
pub const DEFAULT_CONFIG_LOCATIONS: [&str; 8] = [
    "/etc/herakles/proc-mem-graph.yaml",
    "/etc/herakles/proc-mem-graph.yml",
    "/etc/herakles/proc-mem-graph.json",
    "/etc/herakles/proc-mem-graph.toml",
    "./herakles-proc-mem-graph.yaml",
    "./herakles-proc-mem-graph.yml",
    "./herakles-proc-mem-graph.json",
    "./herakles-proc-mem-graph.toml",
];

const LOG_LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Chart(#[from] ChartError),

    #[error("hidden_metrics: {0}")]
    Metric(#[from] UnknownMetricKind),

    #[error("{0}")]
    Invalid(String),
}

/// Configuration file contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub port: Option<u16>,
    pub bind: Option<String>,

    // Logging
    #[serde(alias = "log-level")]
    pub log_level: Option<String>,

    // Sampling
    /// Sample only these pids instead of scanning /proc.
    pub pids: Option<Vec<u32>>,
    #[serde(alias = "include-names")]
    pub include_names: Option<Vec<String>>,
    #[serde(alias = "exclude-names")]
    pub exclude_names: Option<Vec<String>>,
    #[serde(alias = "max-processes")]
    pub max_processes: Option<usize>,
    pub parallelism: Option<usize>,
    #[serde(alias = "sample-interval-secs")]
    pub sample_interval_secs: Option<u64>,
    #[serde(alias = "smaps-interval-secs")]
    pub smaps_interval_secs: Option<u64>,
    #[serde(alias = "smaps-buffer-kb")]
    pub smaps_buffer_kb: Option<usize>,
    #[serde(alias = "smaps-rollup-buffer-kb")]
    pub smaps_rollup_buffer_kb: Option<usize>,

    // Store
    #[serde(alias = "series-capacity")]
    pub series_capacity: Option<usize>,

    // Chart
    #[serde(alias = "chart-width")]
    pub chart_width: Option<f64>,
    #[serde(alias = "chart-height")]
    pub chart_height: Option<f64>,
    #[serde(alias = "padding-percent")]
    pub padding_percent: Option<f64>,
    #[serde(alias = "bottom-label-space")]
    pub bottom_label_space: Option<f64>,
    #[serde(alias = "left-label-space")]
    pub left_label_space: Option<f64>,
    #[serde(alias = "right-current-value-width")]
    pub right_current_value_width: Option<f64>,
    #[serde(alias = "right-current-value-padding")]
    pub right_current_value_padding: Option<f64>,
    /// Tenths of a second.
    #[serde(alias = "min-time-range")]
    pub min_time_range: Option<i64>,
    #[serde(alias = "prefers-dark")]
    pub prefers_dark: Option<bool>,
    #[serde(alias = "label-precision")]
    pub label_precision: Option<usize>,
    #[serde(alias = "hidden-metrics")]
    pub hidden_metrics: Option<Vec<String>>,
    #[serde(alias = "coalesce-delay-ms")]
    pub coalesce_delay_ms: Option<u64>,

    // Feature flags
    #[serde(alias = "enable-health")]
    pub enable_health: Option<bool>,
    #[serde(alias = "enable-telemetry")]
    pub enable_telemetry: Option<bool>,

    // TLS
    #[serde(alias = "enable-tls")]
    pub enable_tls: Option<bool>,
    #[serde(alias = "tls-cert-path")]
    pub tls_cert_path: Option<PathBuf>,
    #[serde(alias = "tls-key-path")]
    pub tls_key_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        let chart = ChartConfig::default();
        Self {
            port: Some(DEFAULT_PORT),
            bind: Some(DEFAULT_BIND_ADDR.to_string()),
            log_level: Some("info".into()),
            pids: None,
            include_names: None,
            exclude_names: None,
            max_processes: None,
            parallelism: None,
            sample_interval_secs: Some(DEFAULT_SAMPLE_INTERVAL_SECS),
            smaps_interval_secs: Some(DEFAULT_SMAPS_INTERVAL_SECS),
            smaps_buffer_kb: Some(DEFAULT_SMAPS_BUFFER_KB),
            smaps_rollup_buffer_kb: Some(DEFAULT_SMAPS_ROLLUP_BUFFER_KB),
            series_capacity: Some(DEFAULT_SERIES_CAPACITY),
            chart_width: Some(chart.container_width),
            chart_height: Some(chart.container_height),
            padding_percent: Some(chart.padding_percent),
            bottom_label_space: Some(chart.bottom_label_space),
            left_label_space: Some(chart.left_label_space),
            right_current_value_width: Some(chart.right_current_value_width),
            right_current_value_padding: Some(chart.right_current_value_padding),
            min_time_range: Some(chart.min_time_range),
            prefers_dark: Some(chart.prefers_dark),
            label_precision: Some(chart.label_precision),
            hidden_metrics: Some(
                chart
                    .visibility
                    .hidden()
                    .map(|kind| kind.name().to_string())
                    .collect(),
            ),
            coalesce_delay_ms: Some(DEFAULT_COALESCE_DELAY.as_millis() as u64),
            enable_health: Some(true),
            enable_telemetry: Some(true),
            enable_tls: Some(false),
            tls_cert_path: None,
            tls_key_path: None,
        }
    }
}

impl Config {
    pub fn bind_addr(&self) -> &str {
        self.bind.as_deref().unwrap_or(DEFAULT_BIND_ADDR)
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    pub fn series_capacity(&self) -> usize {
        self.series_capacity.unwrap_or(DEFAULT_SERIES_CAPACITY)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_secs(self.sample_interval_secs.unwrap_or(DEFAULT_SAMPLE_INTERVAL_SECS))
    }

    pub fn smaps_interval(&self) -> Duration {
        Duration::from_secs(self.smaps_interval_secs.unwrap_or(DEFAULT_SMAPS_INTERVAL_SECS))
    }

    pub fn coalesce_delay(&self) -> Duration {
        self.coalesce_delay_ms
            .map_or(DEFAULT_COALESCE_DELAY, Duration::from_millis)
    }

    pub fn enable_health(&self) -> bool {
        self.enable_health.unwrap_or(true)
    }

    pub fn enable_telemetry(&self) -> bool {
        self.enable_telemetry.unwrap_or(true)
    }

    pub fn enable_tls(&self) -> bool {
        self.enable_tls.unwrap_or(false)
    }

    /// Hidden metric kinds; unset means the built-in default set.
    pub fn visibility(&self) -> Result<MetricVisibility, UnknownMetricKind> {
        match &self.hidden_metrics {
            None => Ok(MetricVisibility::default()),
            Some(names) => {
                let hidden = names
                    .iter()
                    .map(|name| name.parse::<MetricKind>())
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(MetricVisibility::with_hidden(hidden))
            }
        }
    }

    /// Chart configuration with file values over chart defaults.
    pub fn chart_config(&self) -> Result<ChartConfig, ConfigError> {
        let defaults = ChartConfig::default();
        let chart = ChartConfig {
            container_width: self.chart_width.unwrap_or(defaults.container_width),
            container_height: self.chart_height.unwrap_or(defaults.container_height),
            padding_percent: self.padding_percent.unwrap_or(defaults.padding_percent),
            bottom_label_space: self
                .bottom_label_space
                .unwrap_or(defaults.bottom_label_space),
            left_label_space: self.left_label_space.unwrap_or(defaults.left_label_space),
            right_current_value_width: self
                .right_current_value_width
                .unwrap_or(defaults.right_current_value_width),
            right_current_value_padding: self
                .right_current_value_padding
                .unwrap_or(defaults.right_current_value_padding),
            min_time_range: self
                .min_time_range
                .unwrap_or(chart_defaults::DEFAULT_MIN_TIME_RANGE),
            prefers_dark: self.prefers_dark.unwrap_or(false),
            label_precision: self
                .label_precision
                .unwrap_or(chart_defaults::DEFAULT_LABEL_PRECISION),
            visibility: self.visibility()?,
        };
        chart.validate()?;
        Ok(chart)
    }

    pub fn sampler_config(&self) -> SamplerConfig {
        SamplerConfig {
            proc_root: PathBuf::from(DEFAULT_PROC_ROOT),
            pids: self.pids.clone(),
            include_names: self.include_names.clone().unwrap_or_default(),
            exclude_names: self.exclude_names.clone().unwrap_or_default(),
            max_processes: self.max_processes,
            smaps_buffer_kb: self.smaps_buffer_kb.unwrap_or(DEFAULT_SMAPS_BUFFER_KB),
            smaps_rollup_buffer_kb: self
                .smaps_rollup_buffer_kb
                .unwrap_or(DEFAULT_SMAPS_ROLLUP_BUFFER_KB),
        }
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), ConfigError> {
    if let Some(bind) = &cfg.bind {
        bind.parse::<IpAddr>()
            .map_err(|_| ConfigError::Invalid(format!("Invalid bind address '{}'", bind)))?;
    }

    if let Some(level) = cfg.log_level.as_deref() {
        if !LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::Invalid(format!(
                "Invalid log_level '{}', expected one of {}",
                level,
                LOG_LEVELS.join(", ")
            )));
        }
    }

    for (name, value) in [
        ("sample_interval_secs", cfg.sample_interval_secs),
        ("smaps_interval_secs", cfg.smaps_interval_secs),
    ] {
        if value == Some(0) {
            return Err(ConfigError::Invalid(format!("{} must be at least 1", name)));
        }
    }

    if cfg.series_capacity == Some(0) {
        return Err(ConfigError::Invalid(
            "series_capacity must be at least 1".into(),
        ));
    }

    if cfg.enable_tls() && (cfg.tls_cert_path.is_none() || cfg.tls_key_path.is_none()) {
        return Err(ConfigError::Invalid(
            "enable_tls requires tls_cert_path and tls_key_path".into(),
        ));
    }

    cfg.chart_config()?;
    Ok(())
}

/// Explicit path if given, otherwise the first existing default location.
pub fn find_config_file(path: Option<&Path>) -> Option<PathBuf> {
    match path {
        Some(p) => Some(p.to_path_buf()),
        None => DEFAULT_CONFIG_LOCATIONS
            .iter()
            .map(PathBuf::from)
            .find(|p| p.exists()),
    }
}

/// Loads a config file; no file found means defaults.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let Some(path) = find_config_file(path) else {
        return Ok(Config::default());
    };

    let content = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    let config = parse_config(&content, &path)?;
    info!("Loaded configuration from: {}", path.display());
    Ok(config)
}

/// Parses config text in the format implied by `path`'s extension.
pub fn parse_config(content: &str, path: &Path) -> Result<Config, ConfigError> {
    let config = match path.extension().and_then(|s| s.to_str()) {
        Some("json") => serde_json::from_str(content)?,
        Some("toml") => toml::from_str(content)?,
        _ => serde_yaml::from_str(content)?,
    };
    Ok(config)
}

/// Adds comments to YAML configuration
pub fn add_config_comments(yaml: String) -> String {
    let comments = r#"# Herakles Process Memory Graph Configuration
# ===========================================
#
# Server Configuration
# --------------------
# bind: "0.0.0.0"                  # Bind IP (0.0.0.0 = all interfaces)
# port: 9216                       # HTTP port
# log_level: "info"                # off, error, warn, info, debug, trace
#
# Sampling
# --------
# pids: null                       # Only sample these pids (null = scan /proc)
# include_names: null              # Include only processes matching these names
# exclude_names: null              # Exclude processes matching these names
# max_processes: null              # Maximum processes to scan
# parallelism: null                # Parallel threads (null = auto)
# sample_interval_secs: 5          # RSS sampling interval
# smaps_interval_secs: 30          # PSS/USS sampling interval
# smaps_buffer_kb: 512             # Buffer size for smaps parsing
# smaps_rollup_buffer_kb: 256      # Buffer size for smaps_rollup parsing
#
# Store
# -----
# series_capacity: 10000           # Samples kept per process and metric
#
# Chart
# -----
# chart_width: 800.0               # SVG width in pixels
# chart_height: 400.0              # SVG height in pixels
# padding_percent: 0.02            # Outer margin as fraction of each dimension
# bottom_label_space: 20.0         # Space reserved for time labels
# left_label_space: 60.0           # Space reserved for memory labels
# right_current_value_width: 120.0 # Current-value column (0 = disabled)
# right_current_value_padding: 10.0
# min_time_range: 1200             # Minimum time window in tenths of a second
# prefers_dark: false              # Dark theme
# label_precision: 1               # Decimals for small memory labels
# hidden_metrics: [USS, PB]        # Metrics not drawn
# coalesce_delay_ms: 16            # Re-render coalescing delay
#
# Feature Flags
# -------------
# enable_health: true              # Enable /health endpoint
# enable_telemetry: true           # Enable /metrics endpoint
#
# TLS
# ---
# enable_tls: false
# tls_cert_path: null              # PEM certificate
# tls_key_path: null               # PEM private key
"#;

    format!("{comments}\n{yaml}")
}
