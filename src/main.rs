//! herakles-proc-mem-graph: live per-process memory charts served as SVG.

use anyhow::Context;
use axum::{routing::get, Router};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::{net::TcpListener, signal, task, time::interval};
use tracing::level_filters::LevelFilter;
use tracing::{debug, error, info, warn};

use herakles_proc_mem_graph::coalesce::RenderCoalescer;
use herakles_proc_mem_graph::config::{validate_effective_config, Config};
use herakles_proc_mem_graph::sampler::Sampler;

mod cli;
mod commands;
mod handlers;
mod health_stats;
mod metrics;
mod state;

use cli::{resolve_config, Args, Commands};
use state::{AppState, SharedState};

const TLS_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

fn setup_logging(config: &Config) {
    let configured = config.log_level.as_deref().unwrap_or("info").to_ascii_lowercase();
    let level = match configured.as_str() {
        "off" => LevelFilter::OFF,
        "error" => LevelFilter::ERROR,
        "warn" => LevelFilter::WARN,
        "debug" => LevelFilter::DEBUG,
        "trace" => LevelFilter::TRACE,
        _ => LevelFilter::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return;
    }

    info!("Logging initialized with level: {}", level);
}

fn exit_if_invalid(config: &Config) {
    if let Err(e) = validate_effective_config(config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }
}

/// -------------------------------------------------------------------
/// MAIN APPLICATION ENTRY POINT
/// -------------------------------------------------------------------
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.check_config {
        let config = match resolve_config(&args) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("❌ Configuration invalid: {:#}", e);
                std::process::exit(1);
            }
        };
        exit_if_invalid(&config);
        println!("✅ Configuration is valid");
        return Ok(());
    }

    let config = resolve_config(&args)?;

    if args.show_config {
        return commands::show_config(&config, args.config_format);
    }

    if let Some(command) = args.command {
        exit_if_invalid(&config);
        setup_logging(&config);

        return match command {
            Commands::Check { memory, proc, all } => {
                commands::command_check(memory, proc, all, &config)
            }
            Commands::Config {
                output,
                format,
                commented,
            } => commands::command_config(output, format, commented),
            Commands::Render { input, pid, output } => {
                commands::command_render(&input, pid, output, &config)
            }
            Commands::Sample {
                pid,
                iterations,
                json,
            } => task::spawn_blocking(move || {
                commands::command_sample(pid, iterations, json, &config)
            })
            .await?,
            Commands::GenerateTestdata {
                output,
                processes,
                samples,
            } => commands::command_generate_testdata(output, processes, samples, &config),
        };
    }

    exit_if_invalid(&config);
    setup_logging(&config);
    run_server(config).await
}

/// -------------------------------------------------------------------
/// SERVER MODE
/// -------------------------------------------------------------------
async fn run_server(config: Config) -> anyhow::Result<()> {
    info!("Starting herakles-proc-mem-graph {}", handlers::doc::build_info());

    if let Some(threads) = config.parallelism {
        if threads > 0 {
            rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build_global()
                .unwrap_or_else(|e| error!("Failed to set rayon thread pool: {}", e));
            debug!("Rayon thread pool configured with {} threads", threads);
        }
    }

    let chart_config = config.chart_config()?;
    let state: SharedState = Arc::new(AppState::new(config.clone(), chart_config)?);
    debug!("Application state initialized");

    let sampler_task = tokio::spawn(sampler_loop(Arc::clone(&state)));

    let addr: SocketAddr = format!("{}:{}", config.bind_addr(), config.port())
        .parse()
        .context("Invalid bind address")?;

    let mut app = Router::new()
        .route("/chart/{pid}", get(handlers::chart_handler))
        .route("/processes", get(handlers::processes_handler))
        .route("/doc", get(handlers::doc_handler));
    if config.enable_health() {
        app = app.route("/health", get(handlers::health_handler));
    }
    if config.enable_telemetry() {
        app = app.route("/metrics", get(handlers::metrics_handler));
    }
    let app = app.with_state(Arc::clone(&state));

    let result = if config.enable_tls() {
        serve_tls(&config, addr, app).await
    } else {
        serve_plain(addr, app).await
    };

    sampler_task.abort();
    let _ = sampler_task.await;

    info!("herakles-proc-mem-graph stopped gracefully");
    result
}

async fn serve_plain(addr: SocketAddr, app: Router) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("herakles-proc-mem-graph listening on http://{}", addr);

    tokio::select! {
        result = axum::serve(listener, app) => {
            if let Err(e) = result {
                error!("Server error: {}", e);
                return Err(e.into());
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received, exiting...");
        }
    }
    Ok(())
}

async fn serve_tls(config: &Config, addr: SocketAddr, app: Router) -> anyhow::Result<()> {
    use axum_server::tls_rustls::RustlsConfig;

    let (cert, key) = match (&config.tls_cert_path, &config.tls_key_path) {
        (Some(cert), Some(key)) => (cert, key),
        _ => anyhow::bail!("enable_tls requires tls_cert_path and tls_key_path"),
    };
    let tls = RustlsConfig::from_pem_file(cert, key)
        .await
        .with_context(|| format!("Failed to load TLS material from {}", cert.display()))?;

    let handle = axum_server::Handle::new();
    let shutdown_handle = handle.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received, draining connections...");
        shutdown_handle.graceful_shutdown(Some(TLS_SHUTDOWN_GRACE));
    });

    info!("herakles-proc-mem-graph listening on https://{}", addr);
    axum_server::bind_rustls(addr, tls)
        .handle(handle)
        .serve(app.into_make_service())
        .await
        .map_err(|e| {
            error!("Server error: {}", e);
            e.into()
        })
}

/// Samples on the RSS cadence, feeds the store and requests a coalesced re-render.
async fn sampler_loop(state: SharedState) {
    let render_state = Arc::clone(&state);
    let coalescer = RenderCoalescer::new(state.config.coalesce_delay(), move || {
        let state = Arc::clone(&render_state);
        tokio::spawn(async move { state.render_all().await });
    });

    let mut sampler = Sampler::new(state.config.sampler_config(), state.config.smaps_interval());
    let period = state.config.sample_interval();
    let mut ticker = interval(period);
    debug!("Sampler task started with {}s interval", period.as_secs());

    loop {
        ticker.tick().await;

        let (returned, pass) = match task::spawn_blocking(move || {
            let pass = sampler.sample();
            (sampler, pass)
        })
        .await
        {
            Ok(result) => result,
            Err(e) => {
                error!("Sampler pass panicked, stopping sampler: {}", e);
                return;
            }
        };
        sampler = returned;

        if pass.processes.is_empty() {
            warn!("Sampler pass found no readable processes");
        }
        state.ingest_pass(&pass).await;
        coalescer.request();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), shutting down gracefully...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        }
    }
}
