//! Background scheduling of the deadline and retention sweeps.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval, Duration};
use tracing::info;

use crate::config::EngineConfig;
use crate::monitor::SlaMonitor;

/// Drives the periodic sweeps and accepts manual sweep triggers.
pub struct SweepScheduler {
    monitor: Arc<SlaMonitor>,
    config: EngineConfig,
    sweep_tx: mpsc::Sender<()>,
    running: Arc<RwLock<bool>>,
}

impl SweepScheduler {
    /// Create the scheduler and the trigger receiver handed to `start`.
    pub fn new(
        monitor: Arc<SlaMonitor>,
        config: EngineConfig,
    ) -> (Arc<Self>, mpsc::Receiver<()>) {
        let (sweep_tx, sweep_rx) = mpsc::channel(10);

        let scheduler = Arc::new(Self {
            monitor,
            config,
            sweep_tx,
            running: Arc::new(RwLock::new(false)),
        });

        (scheduler, sweep_rx)
    }

    /// Request an immediate deadline sweep.
    pub async fn trigger_sweep(&self) {
        let _ = self.sweep_tx.send(()).await;
    }

    /// Start the background loops and wait until one of them stops.
    pub async fn start(self: Arc<Self>, mut sweep_rx: mpsc::Receiver<()>) {
        {
            let mut running = self.running.write().await;
            *running = true;
        }

        info!(
            sweep_interval_secs = self.config.sweep_interval_secs,
            retention_interval_secs = self.config.retention_interval_secs,
            "sweep scheduler started"
        );

        let sweep_scheduler = self.clone();
        let sweep_handle = tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(
                sweep_scheduler.config.sweep_interval_secs,
            ));

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        sweep_scheduler.monitor.run_sweep(Utc::now()).await;
                    }
                    Some(_) = sweep_rx.recv() => {
                        sweep_scheduler.monitor.run_sweep(Utc::now()).await;
                    }
                    else => break,
                }

                let running = sweep_scheduler.running.read().await;
                if !*running {
                    break;
                }
            }
        });

        let retention_scheduler = self.clone();
        let retention_handle = tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(
                retention_scheduler.config.retention_interval_secs,
            ));

            loop {
                ticker.tick().await;

                let running = retention_scheduler.running.read().await;
                if !*running {
                    break;
                }

                retention_scheduler.monitor.run_retention(Utc::now()).await;
            }
        });

        tokio::select! {
            _ = sweep_handle => {}
            _ = retention_handle => {}
        }

        info!("sweep scheduler stopped");
    }

    /// Stop the background loops after their current pass.
    pub async fn stop(&self) {
        let mut running = self.running.write().await;
        *running = false;
    }
}
