//! Optimization loop: runs a pass every optimization interval.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::optimizer::OptimizationReport;

type BoxFuture = Pin<Box<dyn Future<Output = anyhow::Result<OptimizationReport>> + Send>>;

/// One optimization pass against the caller's state.
pub type PassCallback = Arc<dyn Fn() -> BoxFuture + Send + Sync>;

pub struct OptimizationLoop {
    interval: Duration,
    on_pass: PassCallback,
}

impl OptimizationLoop {
    pub fn new(interval: Duration, on_pass: PassCallback) -> Self {
        Self { interval, on_pass }
    }

    /// Run until `shutdown` flips. A failed pass is logged and the loop
    /// carries on with the next tick.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(interval_ms = self.interval.as_millis() as u64, "optimization loop started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match (self.on_pass)().await {
                        Ok(report) => debug!(
                            moves = report.moves.len(),
                            rescheduled = report.rescheduled.len(),
                            load_variance = report.load_variance_after,
                            "optimization pass complete"
                        ),
                        Err(e) => error!(error = %e, "optimization pass failed"),
                    }
                }
                _ = shutdown.changed() => {
                    debug!("optimization loop shutting down");
                    break;
                }
            }
        }
        info!("optimization loop stopped");
    }
}
