//! Periodic pruning of expired entries.
//!
//! Reads that never happen leave stale entries on disk; the scheduler walks
//! the manifest on a fixed interval and drops them, reclaiming namespaces
//! that end a sweep empty. Sweeps run one at a time on a single background
//! task.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::store::CacheStore;

/// Result of one sweep over the manifest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepStats {
    /// Number of namespaces examined.
    pub namespaces_swept: usize,
    /// Number of stale entries dropped.
    pub entries_removed: usize,
    /// Number of namespaces that ended the sweep empty and were deregistered.
    pub namespaces_removed: usize,
}

/// Handle to the background prune task.
///
/// Dropping the handle leaves the task running for the life of the runtime;
/// call [`stop`](Self::stop) or [`shutdown`](Self::shutdown) to end it.
pub struct PruneScheduler {
    store: CacheStore,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl PruneScheduler {
    /// Spawn the prune task over `store`.
    ///
    /// The first sweep fires one full `interval` after this call, then every
    /// `interval` after the previous sweep completes. Sweeps never overlap.
    pub fn start(store: CacheStore, interval: Duration) -> Self {
        let cancel = CancellationToken::new();
        let task_store = store.clone();
        let task_cancel = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick of an interval completes immediately; consume
            // it so the first sweep waits a full period
            ticker.tick().await;

            loop {
                tokio::select! {
                    // Cancellation wins over a pending tick
                    _ = task_cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        sweep(&task_store, &task_cancel).await;
                    }
                }
            }
            debug!("Prune scheduler stopped");
        });

        Self {
            store,
            cancel,
            handle,
        }
    }

    /// Run one sweep right now, on the caller's task.
    ///
    /// Independent of the timer; a sweep triggered here may run alongside a
    /// scheduled one, which is safe because pruning is idempotent and
    /// serialized per namespace.
    pub async fn sweep_now(&self) -> SweepStats {
        sweep(&self.store, &self.cancel).await
    }

    /// Cancel future sweeps without waiting for the task to exit.
    ///
    /// A sweep in progress finishes the namespace it is working on and stops
    /// before the next one. Already-pruned entries stay pruned.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Check if the background task is still running.
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stop the scheduler and wait for the background task to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.handle.await;
    }
}

async fn sweep(store: &CacheStore, cancel: &CancellationToken) -> SweepStats {
    let namespaces = store.manifest().list().await;
    let mut stats = SweepStats::default();

    for namespace in namespaces {
        // Stop between namespaces, never in the middle of one
        if cancel.is_cancelled() {
            break;
        }

        let outcome = store.prune_namespace(&namespace).await;
        stats.namespaces_swept += 1;
        stats.entries_removed += outcome.entries_removed;
        if outcome.namespace_removed {
            stats.namespaces_removed += 1;
        }
    }

    info!(
        namespaces_swept = stats.namespaces_swept,
        entries_removed = stats.entries_removed,
        namespaces_removed = stats.namespaces_removed,
        "Prune sweep completed"
    );

    stats
}
