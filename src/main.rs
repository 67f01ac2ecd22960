//! Access console - headless live monitor for an access-control facility
//!
//! Loads the topology snapshot, subscribes to the live event stream, and
//! logs access events plus periodic metric summaries. The full-screen
//! operator dashboard lives in the `access-tui` binary.
//!
//! Module structure:
//! - `domain/` - Core types (Gate, AccessEvent, ZoneOccupancy)
//! - `io/` - External interfaces (snapshot, stream, control)
//! - `services/` - Live view state (event log, router, occupancy, controller)
//! - `infra/` - Infrastructure (config, metrics, broker)

use access_console::infra::{Config, Metrics};
use access_console::services::Dashboard;
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// Access console - live gate and zone monitoring
#[derive(Parser, Debug)]
#[command(name = "access-console", version, about)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "config/dev.toml")]
    config: String,

    /// Metrics summary interval (seconds)
    #[arg(long, default_value = "10")]
    metrics_interval_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with configurable level via RUST_LOG env var
    // Default: INFO, use RUST_LOG=debug for full event visibility
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    info!(git_hash = %env!("GIT_HASH"), "access-console starting");

    let args = Args::parse();
    let config = Config::load_from_path(&args.config);

    info!(
        config_file = %config.config_file(),
        api_base_url = %config.api_base_url(),
        stream_host = %config.stream_host(),
        stream_port = %config.stream_port(),
        access_topic = %config.access_topic(),
        occupancy_topic = %config.occupancy_topic(),
        reconnect_max_attempts = %config.reconnect_max_attempts(),
        reconnect_delay_ms = %config.reconnect_delay_ms(),
        "config_loaded"
    );

    let metrics = Arc::new(Metrics::new());

    // Snapshot, per-gate logs, stream subscription - all owned here
    let dashboard = Dashboard::activate(&config, metrics.clone()).await?;
    info!(phase = %dashboard.phase().as_str(), "dashboard_ready");

    // Periodic metrics summary
    let metrics_reporter = metrics.clone();
    let interval_secs = args.metrics_interval_secs;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
        loop {
            interval.tick().await;
            metrics_reporter.report().log();
        }
    });

    // Run until Ctrl+C, then tear the view down cleanly
    tokio::signal::ctrl_c().await.ok();
    info!("shutdown_signal_received");

    dashboard.close();
    info!("access-console shutdown complete");
    Ok(())
}
