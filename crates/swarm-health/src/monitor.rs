//! Heartbeat monitor: background loop that triggers the sweep.
//!
//! The monitor owns only the cadence. The callback does the actual sweep
//! against whatever state the caller holds, so the engine can take its own
//! locks and act on the resulting transitions.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Invoked once per heartbeat interval.
pub type SweepCallback = Arc<dyn Fn() -> BoxFuture + Send + Sync>;

pub struct HeartbeatMonitor {
    interval: Duration,
    on_sweep: SweepCallback,
}

impl HeartbeatMonitor {
    pub fn new(interval: Duration, on_sweep: SweepCallback) -> Self {
        Self { interval, on_sweep }
    }

    /// Run until `shutdown` flips. A tick that arrives while a sweep is
    /// still running is dropped rather than queued.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(interval_ms = self.interval.as_millis() as u64, "heartbeat monitor started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    (self.on_sweep)().await;
                }
                _ = shutdown.changed() => {
                    debug!("heartbeat monitor shutting down");
                    break;
                }
            }
        }
        info!("heartbeat monitor stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn sweeps_on_interval_until_shutdown() {
        let count = Arc::new(AtomicU32::new(0));
        let counter = count.clone();
        let callback: SweepCallback = Arc::new(move || -> BoxFuture {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        });

        let (tx, rx) = watch::channel(false);
        let monitor = HeartbeatMonitor::new(Duration::from_millis(100), callback);
        let handle = tokio::spawn(async move { monitor.run(rx).await });

        tokio::time::sleep(Duration::from_millis(350)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();

        let sweeps = count.load(Ordering::SeqCst);
        assert!(sweeps >= 2, "expected at least two sweeps, got {sweeps}");

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(count.load(Ordering::SeqCst), sweeps);
    }

    #[tokio::test(start_paused = true)]
    async fn no_sweep_before_first_interval() {
        let count = Arc::new(AtomicU32::new(0));
        let counter = count.clone();
        let callback: SweepCallback = Arc::new(move || -> BoxFuture {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        });

        let (tx, rx) = watch::channel(false);
        let monitor = HeartbeatMonitor::new(Duration::from_secs(5), callback);
        let handle = tokio::spawn(async move { monitor.run(rx).await });

        tokio::time::sleep(Duration::from_secs(1)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
