//! TTL Sweep Task
//!
//! Background task that periodically reclaims expired entries of one local
//! cache instance. Reads never depend on it: expired entries are already
//! invisible, the sweep only frees their memory and corrects the gauges.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::CacheStore;
use crate::stats::StatsReporter;

/// Spawns the sweep loop for one store.
///
/// The task exits when the registry the reporter belongs to is shut down, or
/// when the returned handle is aborted (the owning engine does this on drop).
///
/// # Arguments
/// * `store` - Shared store of the local engine
/// * `reporter` - Registry handle the expirations are reported to
/// * `interval_secs` - Interval in seconds between sweeps
pub(crate) fn spawn_sweep_task(
    store: Arc<RwLock<CacheStore>>,
    reporter: StatsReporter,
    interval_secs: u64,
) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs);
    let mut shutdown = reporter.registry().shutdown_signal();

    tokio::spawn(async move {
        info!(
            service = reporter.service(),
            interval_secs = interval_secs,
            "Starting TTL sweep task"
        );

        while !*shutdown.borrow() {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            }

            let removed = sweep_expired(&store, &reporter).await;
            if removed > 0 {
                info!(
                    service = reporter.service(),
                    removed = removed,
                    "TTL sweep removed expired entries"
                );
            } else {
                debug!(service = reporter.service(), "TTL sweep: no expired entries found");
            }
        }

        info!(service = reporter.service(), "TTL sweep task stopped");
    })
}

/// Removes every currently expired entry, one write lock per entry.
///
/// Candidates are collected under a read lock; each is re-checked before
/// removal since a concurrent `set` may have replaced it.
pub(crate) async fn sweep_expired(store: &RwLock<CacheStore>, reporter: &StatsReporter) -> usize {
    let candidates = store.read().await.expired_keys();
    let mut removed = 0;

    for key in candidates {
        let mut guard = store.write().await;
        if let Some(size_bytes) = guard.remove_if_expired(&key) {
            reporter.expire(&key, size_bytes);
            removed += 1;
        }
    }

    removed
}
