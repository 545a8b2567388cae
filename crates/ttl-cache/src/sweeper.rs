//! Background task that reclaims expired entries

use crate::cache::TtlCache;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

/// Handle to a running sweep task
///
/// The task calls [`TtlCache::clear_expired`] every `period` until
/// [`shutdown`](Sweeper::shutdown) is called or the runtime stops. Dropping
/// the handle detaches the task; it keeps sweeping.
#[must_use = "dropping a Sweeper detaches the task, call `shutdown` to stop it"]
pub struct Sweeper {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Sweeper {
    /// Start sweeping `cache` on a fixed period
    pub fn spawn<T>(cache: Arc<TtlCache<T>>, period: Duration) -> Self
    where
        T: Clone + Send + 'static,
    {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            let mut watching = true;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = cache.clear_expired();
                        if removed > 0 {
                            debug!(removed, remaining = cache.len(), "Swept expired cache entries");
                        }
                    }
                    changed = shutdown_rx.changed(), if watching => {
                        match changed {
                            Ok(()) if *shutdown_rx.borrow() => break,
                            Ok(()) => {}
                            // Handle dropped: sweep until the runtime goes away
                            Err(_) => watching = false,
                        }
                    }
                }
            }

            info!("Cache sweeper stopped");
        });

        Self {
            shutdown_tx,
            handle,
        }
    }

    /// Stop the sweep task and wait for it to exit
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.handle.await;
    }
}
