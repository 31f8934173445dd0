//! CLI arguments and subcommands for herakles-proc-mem-graph.

use clap::{Parser, Subcommand, ValueEnum};
use std::net::IpAddr;
use std::path::PathBuf;

use herakles_proc_mem_graph::config::{load_config, Config};

/// Log level options for CLI parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Configuration format options for output
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "herakles-proc-mem-graph",
    about = "Live per-process RSS/PSS/USS memory charts rendered as SVG",
    long_about = "Live per-process RSS/PSS/USS memory charts rendered as SVG.\n\n\
                  Samples per-process memory from /proc into a bounded in-memory \
                  time-series store and serves adaptive SVG charts over HTTP.",
    author = "Michael Moll <proc-mem@herakles.io> - Herakles IO",
    version,
    propagate_version = true,
    after_help = "Project: https://github.com/herakles-io/herakles-proc-mem-graph | More info: https://www.herakles.io | Support: proc-mem@herakles.io"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// HTTP listen port
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Bind to specific interface/IP
    #[arg(long)]
    pub bind: Option<IpAddr>,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Sample only these pids (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub pids: Option<Vec<u32>>,

    /// Include only processes matching these names (comma-separated)
    #[arg(long)]
    pub include_names: Option<String>,

    /// Exclude processes matching these names (comma-separated)
    #[arg(long)]
    pub exclude_names: Option<String>,

    /// Parallel processing threads (0 = auto)
    #[arg(long)]
    pub parallelism: Option<usize>,

    /// Maximum number of processes to scan
    #[arg(long)]
    pub max_processes: Option<usize>,

    /// RSS sampling interval in seconds
    #[arg(long)]
    pub sample_interval_secs: Option<u64>,

    /// PSS/USS sampling interval in seconds
    #[arg(long)]
    pub smaps_interval_secs: Option<u64>,

    /// Samples kept per process and metric
    #[arg(long)]
    pub series_capacity: Option<usize>,

    /// Override buffer size (KB) for /proc/<pid>/smaps
    #[arg(long)]
    pub smaps_buffer_kb: Option<usize>,

    /// Override buffer size (KB) for /proc/<pid>/smaps_rollup
    #[arg(long)]
    pub smaps_rollup_buffer_kb: Option<usize>,

    /// Render charts with the dark theme
    #[arg(long)]
    pub dark: bool,

    /// Disable /health endpoint
    #[arg(long)]
    pub disable_health: bool,

    /// Disable /metrics endpoint
    #[arg(long)]
    pub disable_telemetry: bool,

    /// Serve HTTPS (requires --tls-cert and --tls-key)
    #[arg(long)]
    pub enable_tls: bool,

    /// TLS certificate (PEM)
    #[arg(long)]
    pub tls_cert: Option<PathBuf>,

    /// TLS private key (PEM)
    #[arg(long)]
    pub tls_key: Option<PathBuf>,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate configuration and system requirements
    Check {
        /// Check memory accessibility
        #[arg(long)]
        memory: bool,

        /// Check /proc filesystem
        #[arg(long)]
        proc: bool,

        /// Check all system requirements
        #[arg(long)]
        all: bool,
    },

    /// Generate configuration files
    Config {
        /// Output file path ("-" for stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },

    /// Render a chart from a recorded event file
    Render {
        /// Event file (JSON lines or JSON array)
        #[arg(short = 'i', long)]
        input: PathBuf,

        /// Process to render
        #[arg(long)]
        pid: u32,

        /// Output SVG file (stdout if omitted)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },

    /// Sample processes from /proc and print the readings
    Sample {
        /// Process to sample (all processes if omitted)
        #[arg(long)]
        pid: Option<u32>,

        /// Number of sampling iterations
        #[arg(short = 'n', long, default_value_t = 1)]
        iterations: usize,

        /// Print events as JSON lines instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Generate a synthetic event file
    GenerateTestdata {
        /// Output file path
        #[arg(short = 'o', long, default_value = "testdata.jsonl")]
        output: PathBuf,

        /// Number of processes
        #[arg(long, default_value_t = 4)]
        processes: usize,

        /// Number of RSS samples per process
        #[arg(long, default_value_t = 360)]
        samples: usize,
    },
}

fn split_names(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Effective configuration: CLI > config file > defaults.
pub fn resolve_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    if let Some(bind_ip) = args.bind {
        config.bind = Some(bind_ip.to_string());
    }
    if let Some(cli_port) = args.port {
        config.port = Some(cli_port);
    }
    if args.log_level != LogLevel::Info {
        config.log_level = Some(format!("{:?}", args.log_level).to_lowercase());
    }

    if let Some(pids) = &args.pids {
        config.pids = Some(pids.clone());
    }
    if let Some(include_str) = &args.include_names {
        config.include_names = Some(split_names(include_str));
    }
    if let Some(exclude_str) = &args.exclude_names {
        config.exclude_names = Some(split_names(exclude_str));
    }
    if args.parallelism.is_some() {
        config.parallelism = args.parallelism;
    }
    if args.max_processes.is_some() {
        config.max_processes = args.max_processes;
    }
    if args.sample_interval_secs.is_some() {
        config.sample_interval_secs = args.sample_interval_secs;
    }
    if args.smaps_interval_secs.is_some() {
        config.smaps_interval_secs = args.smaps_interval_secs;
    }
    if args.series_capacity.is_some() {
        config.series_capacity = args.series_capacity;
    }
    if args.smaps_buffer_kb.is_some() {
        config.smaps_buffer_kb = args.smaps_buffer_kb;
    }
    if args.smaps_rollup_buffer_kb.is_some() {
        config.smaps_rollup_buffer_kb = args.smaps_rollup_buffer_kb;
    }

    if args.dark {
        config.prefers_dark = Some(true);
    }
    if args.disable_health {
        config.enable_health = Some(false);
    }
    if args.disable_telemetry {
        config.enable_telemetry = Some(false);
    }
    if args.enable_tls {
        config.enable_tls = Some(true);
    }
    if let Some(cert) = &args.tls_cert {
        config.tls_cert_path = Some(cert.clone());
    }
    if let Some(key) = &args.tls_key {
        config.tls_key_path = Some(key.clone());
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("herakles-proc-mem-graph").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn cli_overrides_defaults() {
        let args = parse(&[
            "--no-config",
            "--port",
            "9400",
            "--pids",
            "1,2,3",
            "--exclude-names",
            "kworker, ,migration",
            "--dark",
        ]);
        let config = resolve_config(&args).unwrap();
        assert_eq!(config.port, Some(9400));
        assert_eq!(config.pids, Some(vec![1, 2, 3]));
        assert_eq!(
            config.exclude_names,
            Some(vec!["kworker".to_string(), "migration".to_string()])
        );
        assert_eq!(config.prefers_dark, Some(true));
        assert_eq!(config.bind.as_deref(), Some("0.0.0.0"));
    }

    #[test]
    fn config_file_is_overridden_by_cli() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.yaml");
        std::fs::write(&path, "port: 9300\nseries_capacity: 50\n").unwrap();

        let path_arg = path.to_string_lossy().to_string();
        let args = parse(&["-c", &path_arg, "--port", "9500"]);
        let config = resolve_config(&args).unwrap();
        assert_eq!(config.port, Some(9500));
        assert_eq!(config.series_capacity, Some(50));
    }

    #[test]
    fn render_subcommand_parses() {
        let args = parse(&["render", "-i", "events.jsonl", "--pid", "7"]);
        match args.command {
            Some(Commands::Render { pid, output, .. }) => {
                assert_eq!(pid, 7);
                assert!(output.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
