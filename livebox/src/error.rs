//! Error types surfaced by resources, fetches and mutations.

use livebox_core::{LoadError, RemoteError, ResourceKey};
use thiserror::Error;

/// Failure of a [`ResourceFetcher::fetch`](crate::ResourceFetcher::fetch).
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// The loader failed. Callers that joined the in-flight fetch see the
    /// same error as the caller that ran the loader.
    #[error(transparent)]
    Load(#[from] LoadError),

    /// The fetch this caller joined was dropped before it finished.
    #[error("in-flight fetch for {0} was abandoned")]
    Abandoned(ResourceKey),
}

/// Failure of an optimistic mutation.
///
/// Every variant carries the operation name and the remote cause, so
/// callers can show "could not like post" style messages.
#[derive(Debug, Clone, Error)]
pub enum MutationError {
    /// The remote call failed and the optimistic patch was reverted.
    #[error("{operation} failed and was rolled back: {source}")]
    RolledBack {
        /// Operation name.
        operation: &'static str,
        /// Remote cause.
        source: RemoteError,
    },

    /// The remote call failed and the resource was refetched from the
    /// server instead of reverted in place.
    #[error("{operation} failed, state reloaded from server: {source}")]
    Reconciled {
        /// Operation name.
        operation: &'static str,
        /// Remote cause.
        source: RemoteError,
    },

    /// The remote call failed after the resource was unmounted or rekeyed,
    /// so there was no local state left to revert.
    #[error("{operation} failed after the resource was detached: {source}")]
    Detached {
        /// Operation name.
        operation: &'static str,
        /// Remote cause.
        source: RemoteError,
    },

    /// The mutation was attempted on a resource that is not mounted.
    #[error("{operation} rejected: resource is not mounted")]
    NotMounted {
        /// Operation name.
        operation: &'static str,
    },
}

impl MutationError {
    /// Operation the error belongs to.
    pub fn operation(&self) -> &'static str {
        match self {
            MutationError::RolledBack { operation, .. }
            | MutationError::Reconciled { operation, .. }
            | MutationError::Detached { operation, .. }
            | MutationError::NotMounted { operation } => operation,
        }
    }

    /// Remote cause, if the remote call was made.
    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            MutationError::RolledBack { source, .. }
            | MutationError::Reconciled { source, .. }
            | MutationError::Detached { source, .. } => Some(source),
            MutationError::NotMounted { .. } => None,
        }
    }
}

/// Configuration loading failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The YAML document could not be deserialized.
    #[error("failed to parse configuration: {0}")]
    Parse(String),

    /// The configuration parsed but holds an unusable value.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
