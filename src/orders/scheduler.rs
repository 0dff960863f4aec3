// Order status scheduler
// Background task that advances orders through their lifecycle on elapsed time alone

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::orders::{LifecycleDurations, OrderBook};

/// Periodic scan over an order book
pub struct OrderStatusScheduler {
    book: Arc<OrderBook>,
    durations: LifecycleDurations,
    poll_interval: Duration,
}

impl OrderStatusScheduler {
    /// # Arguments
    /// * `book` - Order book to scan; scans take the same lock as every other book operation
    /// * `durations` - Elapsed-time thresholds per status
    /// * `poll_interval` - Time between scans, must be non-zero
    pub fn new(book: Arc<OrderBook>, durations: LifecycleDurations, poll_interval: Duration) -> Self {
        Self {
            book,
            durations,
            poll_interval,
        }
    }

    /// Spawn the scan loop as a background task
    ///
    /// The first scan runs one poll interval after spawning.
    pub fn spawn(self) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(shutdown_rx));

        SchedulerHandle {
            shutdown: shutdown_tx,
            task,
        }
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // first tick completes immediately
        interval.tick().await;

        info!(
            "Order status scheduler started (poll every {:?}, pending→shipped {}s, shipped→delivered {}s)",
            self.poll_interval,
            self.durations.pending_to_shipped.num_seconds(),
            self.durations.shipped_to_delivered.num_seconds()
        );

        loop {
            // Shutdown is only observed between scans
            tokio::select! {
                _ = interval.tick() => {
                    match self.book.advance_statuses(Utc::now(), &self.durations).await {
                        Ok(0) => {}
                        Ok(count) => debug!("Scheduler advanced {} orders", count),
                        Err(e) => warn!("Order status scan failed, retrying next poll: {}", e),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Order status scheduler stopped");
    }
}

/// Owner-side handle of a running scheduler
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Signal the loop to exit and wait until it has
    pub async fn stop(self) {
        // A send error means the loop already exited
        let _ = self.shutdown.send(true);

        if let Err(e) = self.task.await {
            warn!("Order status scheduler ended abnormally: {}", e);
        }
    }
}
