//! Unbounded in-memory backend with strict TTL.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use livebox_core::{BackendLabel, CachedEntry, ResourceKey};
use tokio::time::Instant;
use tracing::trace;

use crate::{CacheBackend, DeleteStatus, metrics};

/// In-memory TTL cache backed by a [`DashMap`].
///
/// Expired entries are treated as absent and dropped lazily on read; there
/// is no capacity bound. Use `livebox-moka` when the number of keys can grow
/// without limit over a long session.
///
/// Cloning is cheap and clones share the same map.
///
/// ```
/// use std::time::Duration;
/// use livebox_backend::{CacheBackend, MemoryBackend};
/// use livebox_core::ResourceKey;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let cache = MemoryBackend::new(Duration::from_secs(30));
/// let key = ResourceKey::new("profile", "42");
/// cache.set(&key, "Ada".to_string()).await;
/// assert_eq!(cache.get(&key).await.as_deref(), Some("Ada"));
/// # }
/// ```
#[derive(Clone)]
pub struct MemoryBackend<T> {
    entries: Arc<DashMap<ResourceKey, CachedEntry<T>>>,
    ttl: Duration,
    label: BackendLabel,
}

impl<T> MemoryBackend<T> {
    /// Creates an empty backend with the given time-to-live.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl,
            label: BackendLabel::new_static("memory"),
        }
    }

    /// Sets the label reported in logs and metrics.
    pub fn with_label(mut self, label: impl Into<BackendLabel>) -> Self {
        self.label = label.into();
        self
    }

    /// Number of stored entries, including expired ones not yet dropped.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the backend holds no entries at all.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every expired entry and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.is_fresh_at(self.ttl, now));
        before.saturating_sub(self.entries.len())
    }
}

impl<T> std::fmt::Debug for MemoryBackend<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("label", &self.label)
            .field("ttl", &self.ttl)
            .field("entries", &self.entries.len())
            .finish()
    }
}

#[async_trait]
impl<T> CacheBackend<T> for MemoryBackend<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &ResourceKey) -> Option<T> {
        let now = Instant::now();
        let fresh = match self.entries.get(key) {
            Some(entry) if entry.is_fresh_at(self.ttl, now) => Some(entry.value().value().clone()),
            Some(_) => None,
            None => {
                metrics::record_read(self.label.as_str(), false);
                return None;
            }
        };
        if fresh.is_none() {
            trace!(%key, backend = %self.label, "dropping expired entry");
            self.entries
                .remove_if(key, |_, entry| !entry.is_fresh_at(self.ttl, now));
        }
        metrics::record_read(self.label.as_str(), fresh.is_some());
        fresh
    }

    async fn set(&self, key: &ResourceKey, value: T) {
        self.entries.insert(key.clone(), CachedEntry::new(value));
        metrics::record_write(self.label.as_str());
    }

    async fn invalidate(&self, key: &ResourceKey) -> DeleteStatus {
        match self.entries.remove(key) {
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
