//! Resource loaders.

use std::future::Future;

use async_trait::async_trait;

use crate::error::LoadError;
use crate::key::ResourceKey;

/// Performs the backend round trip for a resource and normalizes the result.
///
/// Implemented for any `Fn(ResourceKey) -> impl Future<Output = Result<T, LoadError>>`,
/// so ad-hoc loaders can be plain async closures:
///
/// ```
/// use livebox_core::{Loader, LoadError, ResourceKey};
///
/// # async fn run() -> Result<(), LoadError> {
/// let loader = |key: ResourceKey| async move { Ok::<_, LoadError>(key.id().len()) };
/// assert_eq!(loader.load(&ResourceKey::new("profile", "abc")).await?, 3);
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait Loader<T>: Send + Sync {
    /// Loads the current value of the resource identified by `key`.
    async fn load(&self, key: &ResourceKey) -> Result<T, LoadError>;
}

#[async_trait]
impl<T, F, Fut> Loader<T> for F
where
    F: Fn(ResourceKey) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, LoadError>> + Send,
    T: Send + 'static,
{
    async fn load(&self, key: &ResourceKey) -> Result<T, LoadError> {
        (self)(key.clone()).await
    }
}
