//! Cache-first resource fetching.

use std::fmt;
use std::sync::Arc;

use livebox_backend::{CacheBackend, DeleteStatus};
use livebox_core::{Loader, ResourceKey};
use tokio::time::Instant;
use tracing::{Instrument, debug, debug_span, field, warn};

use crate::error::FetchError;
use crate::guard::{FetchDecision, FetchGuard};
use crate::metrics::{self, FetchOutcome};

/// Options of a single fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// Skip the cache read and always run (or join) a loader call.
    pub force_refresh: bool,
}

impl FetchOptions {
    /// Options for a forced refresh.
    pub fn refresh() -> Self {
        Self {
            force_refresh: true,
        }
    }
}

/// Where a fetched value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchSource {
    /// Fresh cache entry.
    Cache,
    /// This caller ran the loader.
    Loader,
    /// Another caller's in-flight loader call.
    Shared,
}

impl FetchSource {
    /// Static label for logs.
    pub fn as_str(self) -> &'static str {
        match self {
            FetchSource::Cache => "cache",
            FetchSource::Loader => "loader",
            FetchSource::Shared => "shared",
        }
    }
}

/// A fetched value and its provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched<T> {
    /// The value.
    pub value: T,
    /// Where it came from.
    pub source: FetchSource,
}

/// Cache-first fetcher for one resource type.
///
/// A fetch consults the injected [`CacheBackend`]; a fresh entry is
/// returned without touching the loader. Otherwise the fetch goes through
/// the [`FetchGuard`], so at most one loader call per key is in flight and
/// every concurrent caller receives its result. Successful results are
/// written back to the cache; failures are not cached.
pub struct ResourceFetcher<T> {
    backend: Arc<dyn CacheBackend<T>>,
    guard: FetchGuard<T>,
}

impl<T> Clone for ResourceFetcher<T> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            guard: self.guard.clone(),
        }
    }
}

impl<T> fmt::Debug for ResourceFetcher<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceFetcher")
            .field("backend", &self.backend.label())
            .field("ttl", &self.backend.ttl())
            .field("guard", &self.guard)
            .finish()
    }
}

impl<T> ResourceFetcher<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Creates a fetcher over `backend` with its own in-flight registry.
    pub fn new<B>(backend: B) -> Self
    where
        B: CacheBackend<T> + 'static,
    {
        Self::from_shared(Arc::new(backend))
    }

    /// Creates a fetcher over an already shared backend.
    pub fn from_shared(backend: Arc<dyn CacheBackend<T>>) -> Self {
        Self {
            backend,
            guard: FetchGuard::new(),
        }
    }

    /// The backend behind this fetcher.
    pub fn backend(&self) -> &Arc<dyn CacheBackend<T>> {
        &self.backend
    }

    /// The in-flight registry of this fetcher.
    pub fn guard(&self) -> &FetchGuard<T> {
        &self.guard
    }

    /// Fetches `key`, from cache when fresh, from `loader` otherwise.
    ///
    /// With [`FetchOptions::force_refresh`] the cache read is skipped. A
    /// forced fetch still joins a loader call that is already in flight.
    pub async fn fetch<L>(
        &self,
        key: &ResourceKey,
        loader: &L,
        options: FetchOptions,
    ) -> Result<Fetched<T>, FetchError>
    where
        L: Loader<T> + ?Sized,
    {
        let span = debug_span!(
            "livebox.fetch",
            %key,
            force_refresh = options.force_refresh,
            source = field::Empty,
        );
        async move {
            let resource = key.namespace();

            if !options.force_refresh {
                if let Some(value) = self.backend.get(key).await {
                    tracing::Span::current().record("source", FetchSource::Cache.as_str());
                    metrics::record_fetch(resource, FetchOutcome::Hit);
                    return Ok(Fetched {
                        value,
                        source: FetchSource::Cache,
                    });
                }
            }

            match self.guard.check(key) {
                FetchDecision::Await(shared) => {
                    tracing::Span::current().record("source", FetchSource::Shared.as_str());
                    metrics::record_fetch(resource, FetchOutcome::Shared);
                    debug!("joined in-flight fetch");
                    let value = shared.await?;
                    Ok(Fetched {
                        value,
                        source: FetchSource::Shared,
                    })
                }
                FetchDecision::Proceed(lease) => {
                    tracing::Span::current().record("source", FetchSource::Loader.as_str());
                    metrics::record_fetch(resource, FetchOutcome::Miss);
                    let started = Instant::now();
                    let outcome = loader.load(key).await;
                    metrics::record_loader_duration(resource, started.elapsed());

                    match &outcome {
                        Ok(_) if lease.is_detached() => {
                            debug!("invalidated while loading, result not cached");
                        }
                        Ok(value) => {
                            self.backend.set(key, value.clone()).await;
                            if lease.is_detached() {
                                self.backend.invalidate(key).await;
                            }
                        }
                        Err(error) => {
                            metrics::record_fetch(resource, FetchOutcome::Error);
                            warn!(%error, "loader failed");
                        }
                    }
                    lease.complete(&outcome);

                    let value = outcome?;
                    Ok(Fetched {
                        value,
                        source: FetchSource::Loader,
                    })
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Drops the cached value for `key`. The next fetch runs the loader,
    /// even if a load of `key` is running: that load's result is not
    /// cached.
    pub async fn invalidate(&self, key: &ResourceKey) -> DeleteStatus {
        self.guard.detach(key);
        let status = self.backend.invalidate(key).await;
        if let DeleteStatus::Deleted(_) = status {
            debug!(%key, "cache entry invalidated");
        }
        status
    }
}
