//! Fetch-once guard.
//!
//! Concurrent fetches of the same key share one loader call: the first
//! caller leads and runs the loader, later callers await its result. The
//! registry is keyed globally, so two owners mounting the same profile at
//! the same moment issue one network round trip.
//!
//! An invalidation detaches the running fetch: callers arriving after it
//! start a fresh load, and the detached leader no longer writes its
//! result to the cache.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use livebox_core::{LoadError, ResourceKey};
use tokio::sync::broadcast;
use tracing::trace;

use crate::error::FetchError;

type Outcome<T> = Result<T, LoadError>;

/// Future resolving to the result of a fetch led by another caller.
pub type SharedFetch<T> = Pin<Box<dyn Future<Output = Result<T, FetchError>> + Send>>;

/// Result of [`FetchGuard::check`]: run the loader or await the leader.
pub enum FetchDecision<T> {
    /// No fetch is in flight; the caller must load and complete the lease.
    Proceed(InFlightLease<T>),
    /// Another caller is loading; await its result.
    Await(SharedFetch<T>),
}

struct InFlight<T> {
    tx: broadcast::Sender<Outcome<T>>,
    detached: Arc<AtomicBool>,
}

type Registry<T> = DashMap<ResourceKey, InFlight<T>>;

/// Per-key registry of in-flight fetches.
pub struct FetchGuard<T> {
    in_flight: Arc<Registry<T>>,
}

impl<T> Clone for FetchGuard<T> {
    fn clone(&self) -> Self {
        Self {
            in_flight: Arc::clone(&self.in_flight),
        }
    }
}

impl<T> Default for FetchGuard<T> {
    fn default() -> Self {
        Self {
            in_flight: Arc::new(DashMap::new()),
        }
    }
}

impl<T> std::fmt::Debug for FetchGuard<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchGuard")
            .field("in_flight", &self.in_flight.len())
            .finish()
    }
}

impl<T> FetchGuard<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Creates an empty guard.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the caller for `key`.
    pub fn check(&self, key: &ResourceKey) -> FetchDecision<T> {
        match self.in_flight.entry(key.clone()) {
            Entry::Occupied(entry) => {
                let mut rx = entry.get().tx.subscribe();
                let key = key.clone();
                trace!(%key, "awaiting in-flight fetch");
                FetchDecision::Await(Box::pin(async move {
                    match rx.recv().await {
                        Ok(outcome) => outcome.map_err(FetchError::from),
                        Err(_) => Err(FetchError::Abandoned(key)),
                    }
                }))
            }
            Entry::Vacant(entry) => {
                let (tx, _) = broadcast::channel(1);
                let detached = Arc::new(AtomicBool::new(false));
                entry.insert(InFlight {
                    tx: tx.clone(),
                    detached: Arc::clone(&detached),
                });
                FetchDecision::Proceed(InFlightLease {
                    key: key.clone(),
                    in_flight: Arc::clone(&self.in_flight),
                    tx: Some(tx),
                    detached,
                })
            }
        }
    }

    /// `true` while a fetch for `key` is running.
    pub fn is_in_flight(&self, key: &ResourceKey) -> bool {
        self.in_flight.contains_key(key)
    }

    /// Detaches the fetch running for `key`, if any. Its current waiters
    /// still get its result; the next caller leads a new load.
    pub fn detach(&self, key: &ResourceKey) -> bool {
        match self.in_flight.remove(key) {
            Some((_, in_flight)) => {
                in_flight.detached.store(true, Ordering::SeqCst);
                trace!(%key, "in-flight fetch detached");
                true
            }
            None => false,
        }
    }
}

/// Held by the caller running the loader.
///
/// Completing the lease hands the result to every waiter and clears the
/// key, so a failed fetch leaves nothing behind and the next call retries.
/// Dropping it uncompleted (the leading caller was cancelled) clears the
/// key as well and wakes waiters with [`FetchError::Abandoned`].
pub struct InFlightLease<T> {
    key: ResourceKey,
    in_flight: Arc<Registry<T>>,
    tx: Option<broadcast::Sender<Outcome<T>>>,
    detached: Arc<AtomicBool>,
}

impl<T> InFlightLease<T> {
    /// `true` once the key was invalidated while this fetch ran. Its
    /// result must not be cached.
    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::SeqCst)
    }

    /// Publishes the loader result to all waiters.
    pub fn complete(mut self, outcome: &Outcome<T>)
    where
        T: Clone,
    {
        if let Some(tx) = self.release() {
            let waiters = tx.receiver_count();
            if waiters > 0 {
                trace!(key = %self.key, waiters, "sharing fetch result");
                let _ = tx.send(outcome.clone());
            }
        }
    }

    fn release(&mut self) -> Option<broadcast::Sender<Outcome<T>>> {
        let tx = self.tx.take()?;
        self.in_flight
            .remove_if(&self.key, |_, registered| registered.tx.same_channel(&tx));
        Some(tx)
    }
}

impl<T> Drop for InFlightLease<T> {
    fn drop(&mut self) {
        if self.release().is_some() {
            trace!(key = %self.key, "in-flight fetch abandoned");
        }
    }
}
