//! Main entry point for the walk-in queue service
//!
//! Loads configuration, starts the tick scheduler and health endpoints, and
//! shuts everything down gracefully on SIGINT or SIGTERM.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use walkin_queue::config::{validate_config, AppConfig};
use walkin_queue::service::{AppState, HealthCheck, HealthStatus};

/// Walk-in Queue Service - tickets, counter assignment and wait estimates
#[derive(Parser)]
#[command(
    name = "walkin-queue",
    version,
    about = "Walk-in service queue with counter assignment and wait-time estimates",
    long_about = "Issues sequential tickets to walk-in visitors, assigns them to counters that \
                 offer the services they requested, completes services when their estimated \
                 time elapses, and estimates the wait for the next visitor."
)]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Perform health check and exit
    #[arg(long, help = "Perform a health check and exit with status code")]
    health_check: bool,

    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    #[arg(long, value_name = "PORT", help = "Override metrics server port")]
    metrics_port: Option<u16>,

    #[arg(long, value_name = "SECONDS", help = "Override seconds between ticks")]
    tick_interval: Option<u64>,

    #[arg(long, value_name = "COUNT", help = "Override the waiting-visitor limit")]
    max_waiting: Option<usize>,

    #[arg(short, long, help = "Enable debug mode with verbose logging")]
    debug: bool,

    #[arg(
        long,
        help = "Validate configuration and exit without starting service"
    )]
    dry_run: bool,
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Ask a running instance for its health and exit with a matching status code
async fn perform_health_check(config: AppConfig) -> Result<()> {
    let url = format!("http://127.0.0.1:{}/stats", config.service.metrics_port);
    info!("Performing health check against {}", url);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()?;

    let health: HealthCheck = match client.get(&url).send().await {
        Ok(response) => match response.json::<serde_json::Value>().await {
            Ok(body) => match serde_json::from_value(body["health"].clone()) {
                Ok(health) => health,
                Err(e) => {
                    error!("Unexpected health response: {}", e);
                    std::process::exit(1);
                }
            },
            Err(e) => {
                error!("Unreadable health response: {}", e);
                std::process::exit(1);
            }
        },
        Err(e) => {
            error!("Health check failed: {}", e);
            std::process::exit(1);
        }
    };

    println!("Health Check: {}", health.status);
    println!("  Waiting: {}", health.stats.waiting);
    println!("  In service: {}", health.stats.in_service);
    println!("  Unroutable: {}", health.stats.unroutable);
    println!("  Uptime: {}", health.stats.uptime_info);

    if health.status == HealthStatus::Healthy {
        std::process::exit(0);
    } else {
        std::process::exit(1);
    }
}

/// Wait for shutdown signals (SIGINT, SIGTERM)
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C) signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

fn display_startup_banner(config: &AppConfig) {
    info!("Walk-in Queue Service");
    info!("   Service: {}", config.service.name);
    info!("   Log level: {}", config.service.log_level);
    info!("   Metrics port: {}", config.service.metrics_port);
    info!("   Tick interval: {}s", config.queue.tick_interval_seconds);
    info!("   Max waiting: {}", config.queue.max_waiting);
    info!(
        "   Prediction: {}",
        config
            .estimator
            .prediction_url
            .as_deref()
            .unwrap_or("fallback only")
    );
}

/// Load configuration and apply CLI overrides
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(config_path) => AppConfig::from_file(config_path)?,
        None => AppConfig::from_env()?,
    };

    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }

    if args.debug {
        config.service.log_level = "debug".to_string();
    }

    if let Some(metrics_port) = args.metrics_port {
        config.service.metrics_port = metrics_port;
    }

    if let Some(tick_interval) = args.tick_interval {
        config.queue.tick_interval_seconds = tick_interval;
    }

    if let Some(max_waiting) = args.max_waiting {
        config.queue.max_waiting = max_waiting;
    }

    validate_config(&config)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    });

    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    if args.health_check {
        return perform_health_check(config).await;
    }

    if args.dry_run {
        info!("Configuration validation successful");
        display_startup_banner(&config);
        info!("Dry run completed - exiting without starting service");
        return Ok(());
    }

    display_startup_banner(&config);

    let mut app_state = match AppState::new(config.clone()).await {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = app_state.start().await {
        error!("Failed to start service: {}", e);
        std::process::exit(1);
    }

    info!("Walk-in queue service is running");
    info!("Press Ctrl+C to shutdown gracefully...");

    wait_for_shutdown_signal().await;

    info!("Shutdown signal received, beginning graceful shutdown...");

    match tokio::time::timeout(config.shutdown_timeout(), app_state.shutdown()).await {
        Ok(Ok(())) => info!("Graceful shutdown completed successfully"),
        Ok(Err(e)) => warn!("Shutdown finished with errors: {}", e),
        Err(_) => warn!("Shutdown timeout exceeded, forcing exit"),
    }

    info!("Walk-in queue service stopped");
    Ok(())
}
