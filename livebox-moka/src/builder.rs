//! Builder for configuring [`MokaBackend`].

use std::marker::PhantomData;
use std::time::Duration;

use livebox_core::{BackendLabel, CachedEntry, ResourceKey};
use moka::future::{Cache, CacheBuilder};
use moka::policy::EvictionPolicy;

use crate::backend::MokaBackend;

/// Marker type: capacity has not been configured yet.
///
/// This is the initial state of a [`MokaBackendBuilder`]. Call
/// [`max_entries()`](MokaBackendBuilder::max_entries) before `build()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCapacity;

/// Marker type: entry-count capacity has been configured.
///
/// The cache holds at most `n` entries and evicts by the configured policy
/// when the cap is exceeded.
#[derive(Debug, Clone, Copy)]
pub struct EntryCapacity(pub(crate) u64);

/// Builder for creating and configuring a [`MokaBackend`].
///
/// Use [`MokaBackend::builder`] to create a new builder instance. The
/// typestate parameter makes `build()` available only once a capacity is
/// set, so a bounded backend can never be built unbounded by accident.
///
/// ```
/// use std::time::Duration;
/// use livebox_moka::{EvictionPolicy, MokaBackend};
///
/// let backend = MokaBackend::<String>::builder(Duration::from_secs(300))
///     .label("profiles")
///     .max_entries(10_000)
///     .eviction_policy(EvictionPolicy::lru())
///     .build();
/// ```
pub struct MokaBackendBuilder<T, Cap> {
    ttl: Duration,
    capacity: Cap,
    label: BackendLabel,
    eviction_policy: Option<EvictionPolicy>,
    _value: PhantomData<fn() -> T>,
}

impl<T> MokaBackendBuilder<T, NoCapacity> {
    /// Creates a new builder with the given TTL and no capacity configured.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            capacity: NoCapacity,
            label: BackendLabel::new_static("moka"),
            eviction_policy: None,
            _value: PhantomData,
        }
    }

    /// Sets the maximum number of entries the cache can hold.
    pub fn max_entries(self, capacity: u64) -> MokaBackendBuilder<T, EntryCapacity> {
        MokaBackendBuilder {
            ttl: self.ttl,
            capacity: EntryCapacity(capacity),
            label: self.label,
            eviction_policy: self.eviction_policy,
            _value: PhantomData,
        }
    }
}

impl<T, Cap> MokaBackendBuilder<T, Cap> {
    /// Sets a custom label for this backend.
    ///
    /// # Default
    ///
    /// `"moka"`
    pub fn label(mut self, label: impl Into<BackendLabel>) -> Self {
        self.label = label.into();
        self
    }

    /// Sets the eviction policy used when the entry cap is reached.
    ///
    /// # Default
    ///
    /// [`EvictionPolicy::lru()`]: session data is recency-biased, the key a
    /// user looked at last is the one most likely to be asked for again.
    pub fn eviction_policy(mut self, policy: EvictionPolicy) -> Self {
        self.eviction_policy = Some(policy);
        self
    }
}

impl<T> MokaBackendBuilder<T, EntryCapacity>
where
    T: Clone + Send + Sync + 'static,
{
    /// Builds the [`MokaBackend`].
    pub fn build(self) -> MokaBackend<T> {
        let policy = self.eviction_policy.unwrap_or_else(EvictionPolicy::lru);
        let cache: Cache<ResourceKey, CachedEntry<T>> = CacheBuilder::new(self.capacity.0)
            .name(self.label.as_str())
            .eviction_policy(policy)
            .time_to_live(self.ttl)
            .build();

        MokaBackend::from_parts(cache, self.ttl, self.label)
    }
}
