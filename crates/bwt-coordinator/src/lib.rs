//! Polling coordinator
//!
//! The coordinator is the sole publisher of device snapshots: it polls the
//! client on an interval and replaces the single cached [`CurrentData`]
//! wholesale through a `tokio::sync::watch` channel. Every subscriber
//! observes the same `Arc` per cycle, so there are no torn reads across
//! fields. A failed poll keeps the previous snapshot and logs at warn; the
//! next tick tries again.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use bwt_api::{ApiError, BwtClient, CurrentData};

/// Default poll interval against the device
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(30);

/// Coordinates polling for one config entry
pub struct DataCoordinator {
    client: Arc<dyn BwtClient>,
    interval: Duration,
    tx: watch::Sender<Arc<CurrentData>>,
}

impl DataCoordinator {
    /// Create a coordinator; the snapshot is empty until
    /// [`DataCoordinator::first_refresh`] succeeds.
    pub fn new(client: Arc<dyn BwtClient>, interval: Duration) -> Self {
        let (tx, _) = watch::channel(Arc::new(CurrentData::default()));
        Self {
            client,
            interval,
            tx,
        }
    }

    /// Seed the snapshot with one initial poll.
    ///
    /// Entry setup calls this before any sensor exists; a failure here
    /// surfaces as "not ready" to the lifecycle layer.
    pub async fn first_refresh(&self) -> Result<(), ApiError> {
        let data = self.client.poll().await?;
        self.tx.send_replace(Arc::new(data));
        debug!("seeded initial snapshot");
        Ok(())
    }

    /// The latest snapshot
    pub fn data(&self) -> Arc<CurrentData> {
        self.tx.borrow().clone()
    }

    /// Subscribe to snapshot replacements
    pub fn subscribe(&self) -> watch::Receiver<Arc<CurrentData>> {
        self.tx.subscribe()
    }

    /// Start the background poll loop
    pub fn spawn(self: Arc<Self>) -> CoordinatorHandle {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately; the snapshot was already
            // seeded by first_refresh.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = &mut stop_rx => {
                        debug!("poll loop stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        match self.client.poll().await {
                            Ok(data) => {
                                self.tx.send_replace(Arc::new(data));
                                debug!("published new snapshot");
                            }
                            Err(err) => {
                                warn!(error = %err, "poll failed, keeping last snapshot");
                            }
                        }
                    }
                }
            }
        });

        CoordinatorHandle {
            stop: Some(stop_tx),
            task,
        }
    }
}

/// Handle to a running poll loop; unload shuts it down
pub struct CoordinatorHandle {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl CoordinatorHandle {
    /// Stop the poll loop and wait for it to finish
    pub async fn shutdown(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        let _ = self.task.await;
    }
}
