//! Moka backend implementation.

use std::time::Duration;

use async_trait::async_trait;
use livebox_backend::{CacheBackend, DeleteStatus};
use livebox_core::{BackendLabel, CachedEntry, ResourceKey};
use moka::future::Cache;
use tracing::trace;

use crate::builder::{MokaBackendBuilder, NoCapacity};
use crate::metrics;

/// Bounded in-memory TTL cache powered by Moka.
///
/// Adds an entry cap to the strict-TTL contract of
/// [`CacheBackend`]: when the cap is reached, entries are evicted by the
/// configured [`EvictionPolicy`](moka::policy::EvictionPolicy), LRU by
/// default. This bounds memory in long-lived sessions where keys keep
/// accumulating (every profile a user ever opened, for instance).
///
/// Freshness is checked twice: Moka drops entries after their TTL on its
/// own schedule, and every read re-checks the entry stamp against
/// [`tokio::time::Instant`] so expiry is exact at the TTL boundary.
///
/// # Caveats
///
/// - Data is **not persisted** and **not shared** across processes.
/// - [`entry_count`](Self::entry_count) is eventually consistent; call
///   [`run_pending_tasks`](Self::run_pending_tasks) before asserting on it.
#[derive(Clone)]
pub struct MokaBackend<T> {
    cache: Cache<ResourceKey, CachedEntry<T>>,
    ttl: Duration,
    label: BackendLabel,
}

impl<T> MokaBackend<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Creates a new builder with the given time-to-live.
    ///
    /// A capacity must be set with
    /// [`max_entries`](MokaBackendBuilder::max_entries) before building.
    pub fn builder(ttl: Duration) -> MokaBackendBuilder<T, NoCapacity> {
        MokaBackendBuilder::new(ttl)
    }

    pub(crate) fn from_parts(
        cache: Cache<ResourceKey, CachedEntry<T>>,
        ttl: Duration,
        label: BackendLabel,
    ) -> Self {
        Self { cache, ttl, label }
    }

    /// Approximate number of entries.
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Runs Moka's pending maintenance (evictions, expirations).
    pub async fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks().await;
    }
}

impl<T> std::fmt::Debug for MokaBackend<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MokaBackend")
            .field("label", &self.label)
            .field("ttl", &self.ttl)
            .field("entries", &self.cache.entry_count())
            .finish()
    }
}

#[async_trait]
impl<T> CacheBackend<T> for MokaBackend<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &ResourceKey) -> Option<T> {
        let entry = self.cache.get(key).await?;
        if entry.is_fresh(self.ttl) {
            Some(entry.into_inner())
        } else {
            trace!(%key, backend = %self.label, "dropping expired entry");
            self.cache.invalidate(key).await;
            None
        }
    }

    async fn set(&self, key: &ResourceKey, value: T) {
        self.cache.insert(key.clone(), CachedEntry::new(value)).await;
        metrics::record_capacity(self.label.as_str(), self.cache.entry_count());
    }

    async fn invalidate(&self, key: &ResourceKey) -> DeleteStatus {
        match self.cache.remove(key).await {
            Some(_) => DeleteStatus::Deleted(1),
            None => DeleteStatus::Missing,
        }
    }

    fn ttl(&self) -> Duration {
        self.ttl
    }

    fn label(&self) -> BackendLabel {
        self.label.clone()
    }
}
