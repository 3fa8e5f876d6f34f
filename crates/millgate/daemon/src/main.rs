//! millgated - pipeline coordination daemon
//!
//! Wires the in-memory pipeline store, the configured role rosters, and a
//! log-based notification drain into the engine, then runs the deadline
//! and retention sweeps until the process receives a shutdown signal.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;

use config::DaemonConfig;
use millgate_engine::{
    ChannelNotifier, PipelineCoordinator, SlaMonitor, StaticRoleDirectory, SweepScheduler,
};
use millgate_storage::InMemoryPipelineStore;
use millgate_types::Identity;

/// millgate daemon CLI
#[derive(Parser)]
#[command(name = "millgated")]
#[command(about = "Inspection pipeline coordination daemon", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "MILLGATE_CONFIG")]
    config: Option<String>,

    /// Log level, overriding the configuration file
    #[arg(long, env = "MILLGATE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "MILLGATE_LOG_JSON")]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = DaemonConfig::load(cli.config.as_deref()).context("loading configuration")?;

    // Initialize tracing
    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.into());

    if cli.json || config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    // Print startup banner
    println!(
        r#"
  millgate - inspection pipeline coordinator
  Version: {}
  Sweep interval: {}s
  Staffed roles: {}
"#,
        env!("CARGO_PKG_VERSION"),
        config.engine.sweep_interval_secs,
        config.roles.len()
    );

    let store = Arc::new(InMemoryPipelineStore::new());
    let directory = Arc::new(StaticRoleDirectory::new());
    for (role, members) in &config.roles {
        directory.set_members(
            *role,
            members
                .iter()
                .map(|member| Identity::new(member.as_str()))
                .collect(),
        );
    }

    // Log-based delivery: every notification request lands in the log
    // stream instead of an external transport.
    let (notifier, mut notifications) = ChannelNotifier::new();
    tokio::spawn(async move {
        while let Some(request) = notifications.recv().await {
            tracing::info!(
                kind = ?request.kind,
                process_id = %request.process_id,
                recipients = request.recipients.len(),
                message = %request.message,
                "notification"
            );
        }
    });

    let coordinator = Arc::new(PipelineCoordinator::new(
        store.clone(),
        directory.clone(),
        Arc::new(notifier),
        config.engine.clone(),
    ));
    let monitor = Arc::new(SlaMonitor::new(
        store,
        coordinator,
        config.engine.clone(),
    ));
    let (scheduler, sweep_rx) = SweepScheduler::new(monitor, config.engine.clone());

    let runner = tokio::spawn(scheduler.clone().start(sweep_rx));

    shutdown_signal().await;

    scheduler.stop().await;
    // Wake the sweep loop so it observes the stop flag.
    scheduler.trigger_sweep().await;
    runner.await.context("scheduler task panicked")?;

    tracing::info!("millgated shut down cleanly");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
