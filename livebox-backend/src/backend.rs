use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use livebox_core::{BackendLabel, ResourceKey};

use crate::DeleteStatus;

/// Key→value store with strict time-to-live.
///
/// Contract:
/// - [`get`](Self::get) returns `None` if the key is missing or its entry is
///   at least [`ttl`](Self::ttl) old.
/// - [`set`](Self::set) overwrites unconditionally and stamps the current time.
/// - [`invalidate`](Self::invalidate) removes the key regardless of age.
///
/// A backend instance is meant to be shared: every consumer of a resource
/// type holds the same `Arc`, which makes cached values visible across
/// independent owners.
#[async_trait]
pub trait CacheBackend<T>: Send + Sync
where
    T: Clone + Send + Sync + 'static,
{
    /// Returns the cached value if present and fresh.
    async fn get(&self, key: &ResourceKey) -> Option<T>;

    /// Stores `value` under `key`, replacing any previous entry.
    async fn set(&self, key: &ResourceKey, value: T);

    /// Removes `key` regardless of age.
    async fn invalidate(&self, key: &ResourceKey) -> DeleteStatus;

    /// Time-to-live applied to every entry.
    fn ttl(&self) -> Duration;

    /// Label used in logs and metrics.
    fn label(&self) -> BackendLabel {
        BackendLabel::new_static("backend")
    }
}

#[async_trait]
impl<T, B> CacheBackend<T> for Arc<B>
where
    T: Clone + Send + Sync + 'static,
    B: CacheBackend<T> + ?Sized,
{
    async fn get(&self, key: &ResourceKey) -> Option<T> {
        (**self).get(key).await
    }

    async fn set(&self, key: &ResourceKey, value: T) {
        (**self).set(key, value).await
    }

    async fn invalidate(&self, key: &ResourceKey) -> DeleteStatus {
        (**self).invalidate(key).await
    }

    fn ttl(&self) -> Duration {
        (**self).ttl()
    }

    fn label(&self) -> BackendLabel {
        (**self).label()
    }
}

#[async_trait]
impl<T> CacheBackend<T> for Box<dyn CacheBackend<T>>
where
    T: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &ResourceKey) -> Option<T> {
        (**self).get(key).await
    }

    async fn set(&self, key: &ResourceKey, value: T) {
        (**self).set(key, value).await
    }

    async fn invalidate(&self, key: &ResourceKey) -> DeleteStatus {
        (**self).invalidate(key).await
    }

    fn ttl(&self) -> Duration {
        (**self).ttl()
    }

    fn label(&self) -> BackendLabel {
        (**self).label()
    }
}
