//! swarmd: the swarm daemon.
//!
//! Loads `swarm.toml`, starts a coordination engine with its heartbeat
//! monitor and optimization loop, logs every engine event and a periodic
//! status line, and shuts the engine down cleanly on Ctrl-C.
//!
//! # Usage
//!
//! ```text
//! swarmd run --config swarm.toml
//! swarmd run --config swarm.toml --json-logs --status-interval 30
//! swarmd check-config --config swarm.toml
//! swarmd print-config
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::{broadcast, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use swarm_core::SwarmConfig;
use swarm_engine::{SwarmEngine, SwarmEvent};

const DEFAULT_FILTER: &str = "info,swarmd=debug,swarm=debug";

#[derive(Parser)]
#[command(name = "swarmd", about = "Swarm coordination daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the engine until interrupted.
    Run {
        /// Configuration file. Defaults apply when it is absent.
        #[arg(long, default_value = "swarm.toml")]
        config: PathBuf,

        /// Emit logs as JSON lines.
        #[arg(long)]
        json_logs: bool,

        /// Seconds between status log lines; 0 disables them.
        #[arg(long, default_value = "60")]
        status_interval: u64,
    },
    /// Parse and validate a configuration file, then exit.
    CheckConfig {
        #[arg(long, default_value = "swarm.toml")]
        config: PathBuf,
    },
    /// Print the default configuration as TOML.
    PrintConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            config,
            json_logs,
            status_interval,
        } => {
            init_tracing(json_logs);
            let config = load_config(&config)?;
            run(config, status_interval).await
        }
        Command::CheckConfig { config } => {
            init_tracing(false);
            let loaded = SwarmConfig::from_file(&config)
                .with_context(|| format!("invalid config {}", config.display()))?;
            info!(
                path = %config.display(),
                topology = %loaded.topology,
                consensus = %loaded.consensus.algorithm,
                "configuration is valid"
            );
            Ok(())
        }
        Command::PrintConfig => {
            print!("{}", SwarmConfig::default().to_toml_string()?);
            Ok(())
        }
    }
}

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Read the file if it exists; otherwise fall back to defaults.
fn load_config(path: &Path) -> anyhow::Result<SwarmConfig> {
    if !path.exists() {
        warn!(path = %path.display(), "config file not found, using defaults");
        return Ok(SwarmConfig::default());
    }
    let config = SwarmConfig::from_file(path)
        .with_context(|| format!("failed to load {}", path.display()))?;
    info!(path = %path.display(), "configuration loaded");
    Ok(config)
}

async fn run(config: SwarmConfig, status_interval: u64) -> anyhow::Result<()> {
    info!(
        topology = %config.topology,
        consensus = %config.consensus.algorithm,
        max_nodes = config.max_nodes,
        "swarm daemon starting"
    );

    let builder = SwarmEngine::builder(config);
    let events = builder.subscribe();
    let engine = builder.initialize().await?;

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Background tasks ───────────────────────────────────────

    let events_handle = tokio::spawn(log_events(events));

    let status_handle = (status_interval > 0).then(|| {
        let engine = engine.clone();
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            log_status(engine, Duration::from_secs(status_interval), shutdown).await;
        })
    });

    tokio::signal::ctrl_c()
        .await
        .context("failed to install Ctrl-C handler")?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    if let Some(handle) = status_handle {
        let _ = handle.await;
    }
    engine.shutdown().await?;
    let _ = events_handle.await;

    info!("swarm daemon stopped");
    Ok(())
}

/// Log every engine event until the engine reports shutdown.
async fn log_events(mut events: broadcast::Receiver<SwarmEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => {
                let name = event.name();
                match serde_json::to_string(&event) {
                    Ok(body) => debug!(event = name, %body, "swarm event"),
                    Err(e) => warn!(event = name, error = %e, "failed to encode event"),
                }
                if matches!(event, SwarmEvent::Shutdown { .. }) {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "event log fell behind");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn log_status(engine: SwarmEngine, period: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let status = engine.swarm_status().await;
                info!(
                    nodes = status.total_nodes,
                    active = status.active_nodes,
                    tasks = status.total_tasks,
                    completed = status.completed_tasks,
                    failed = status.failed_tasks,
                    cpu_avg = status.resource_utilization.cpu.avg,
                    consensus_success = status.consensus.success_rate,
                    "swarm status"
                );
            }
            _ = shutdown.changed() => {
                debug!("status logger shutting down");
                return;
            }
        }
    }
}
