//! Fixed-cadence tick loop
//!
//! Runs [`QueueManager::run_tick`] on a tokio interval. Shutdown is only
//! observed between ticks, so a tick that has started always finishes its
//! write.

use crate::error::{QueueError, Result};
use crate::queue::QueueManager;
use crate::utils::current_timestamp;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Source of the tick timestamp
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Handle to a running tick loop
pub struct TickScheduler {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<u64>,
}

impl TickScheduler {
    /// Start ticking every `interval` against the wall clock
    pub fn spawn(manager: Arc<QueueManager>, interval: Duration) -> Self {
        Self::spawn_with_clock(manager, interval, Arc::new(current_timestamp))
    }

    /// Start ticking every `interval`, stamping each tick with `clock()`
    pub fn spawn_with_clock(manager: Arc<QueueManager>, interval: Duration, clock: Clock) -> Self {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let period = interval.max(Duration::from_millis(1));

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // Missed ticks are skipped, never bunched
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut ticks: u64 = 0;

            info!("Tick scheduler started ({}ms interval)", period.as_millis());

            loop {
                tokio::select! {
                    biased;
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                        continue;
                    }
                    _ = ticker.tick() => {}
                }

                let now = clock();
                match manager.run_tick(now).await {
                    Ok(outcome) => debug!(
                        "Scheduled tick {} done: {} serviced, {} assigned",
                        ticks + 1,
                        outcome.newly_serviced.len(),
                        outcome.assignments.len()
                    ),
                    Err(e) => warn!("Scheduled tick at {} failed: {}", now, e),
                }
                ticks += 1;
            }

            info!("Tick scheduler stopped after {} ticks", ticks);
            ticks
        });

        Self {
            shutdown_tx,
            handle,
        }
    }

    /// Whether the loop has exited
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop after the current tick and return how many ticks ran
    pub async fn shutdown(self) -> Result<u64> {
        // The loop may already be gone; the join below reports that
        let _ = self.shutdown_tx.send(true);

        self.handle.await.map_err(|e| {
            QueueError::InternalError {
                message: format!("Tick scheduler task failed: {}", e),
            }
            .into()
        })
    }
}
