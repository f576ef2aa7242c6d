//! crates/recap_core/src/metrics.rs
//!
//! The metrics aggregator: a per-user view of the derived counters kept by
//! the remote store. The store is the serialization point for concurrent
//! increments; this side only holds the last snapshot it has seen.

use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::domain::{MetricKind, UserMetrics};
use crate::ports::{PortResult, RemoteStoreService};

/// Tracks one user's counters. Increments go through the gateway (which is
/// atomic per counter) and the returned totals become the new snapshot.
pub struct MetricsAggregator {
    store: Arc<dyn RemoteStoreService>,
    user_id: String,
    snapshot: Mutex<Option<UserMetrics>>,
}

impl MetricsAggregator {
    pub fn new(store: Arc<dyn RemoteStoreService>, user_id: impl Into<String>) -> Self {
        Self {
            store,
            user_id: user_id.into(),
            snapshot: Mutex::new(None),
        }
    }

    /// Returns current counters, refreshing from the gateway. When the
    /// gateway is unreachable the last-known snapshot is returned instead;
    /// only a user with no snapshot at all sees the error.
    pub async fn read(&self) -> PortResult<UserMetrics> {
        match self.refresh().await {
            Ok(metrics) => Ok(metrics),
            Err(e) => {
                let last_known = self.last_known();
                match last_known {
                    Some(stale) => {
                        warn!(
                            "Metrics refresh for {} failed ({}); serving last-known snapshot",
                            self.user_id, e
                        );
                        Ok(stale)
                    }
                    None => Err(e),
                }
            }
        }
    }

    /// Fetches fresh counters from the gateway and replaces the snapshot.
    pub async fn refresh(&self) -> PortResult<UserMetrics> {
        let metrics = self.store.get_metrics(&self.user_id).await?;
        self.install(metrics.clone());
        Ok(metrics)
    }

    /// Adds `amount` to one counter through the gateway. The returned totals
    /// replace the snapshot, so a successful increment is observed exactly
    /// once.
    pub async fn increment(&self, kind: MetricKind, amount: f64) -> PortResult<UserMetrics> {
        let metrics = self
            .store
            .increment_metric(&self.user_id, kind, amount)
            .await?;
        self.install(metrics.clone());
        Ok(metrics)
    }

    /// The last snapshot seen, if any. Purely local; never goes to the wire.
    pub fn last_known(&self) -> Option<UserMetrics> {
        match self.snapshot.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn install(&self, metrics: UserMetrics) {
        match self.snapshot.lock() {
            Ok(mut guard) => *guard = Some(metrics),
            Err(poisoned) => *poisoned.into_inner() = Some(metrics),
        }
    }
}
