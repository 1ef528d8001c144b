//! Cached value with its insertion timestamp.
//!
//! Livebox caches use strict expiry: an entry is valid iff
//! `now - stored_at < ttl`. There is no stale window and no background
//! revalidation, an expired entry is simply absent.
//!
//! Timestamps come from [`tokio::time::Instant`], so tests running on a
//! paused runtime can move the clock with `tokio::time::advance`.

use std::time::Duration;
use tokio::time::Instant;

/// A cached value stamped with the instant it was stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedEntry<T> {
    value: T,
    stored_at: Instant,
}

impl<T> CachedEntry<T> {
    /// Wraps `value`, stamping it with the current instant.
    pub fn new(value: T) -> Self {
        Self::stored_at(value, Instant::now())
    }

    /// Wraps `value` with an explicit timestamp.
    pub fn stored_at(value: T, stored_at: Instant) -> Self {
        Self { value, stored_at }
    }

    /// Returns a reference to the cached value.
    #[inline]
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Returns when the value was stored.
    #[inline]
    pub fn timestamp(&self) -> Instant {
        self.stored_at
    }

    /// Age of the entry at `now`.
    pub fn age_at(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.stored_at)
    }

    /// Whether the entry is still valid for `ttl` at `now`.
    pub fn is_fresh_at(&self, ttl: Duration, now: Instant) -> bool {
        self.age_at(now) < ttl
    }

    /// Whether the entry is still valid for `ttl` right now.
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.is_fresh_at(ttl, Instant::now())
    }

    /// Remaining lifetime, or `None` if already expired.
    pub fn remaining(&self, ttl: Duration) -> Option<Duration> {
        ttl.checked_sub(self.age_at(Instant::now()))
            .filter(|left| !left.is_zero())
    }

    /// Consumes the entry and returns the value.
    pub fn into_inner(self) -> T {
        self.value
    }
}
