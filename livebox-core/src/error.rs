//! Error types shared by loaders, collaborators and transports.


use thiserror::Error;

use crate::key::ResourceKey;

/// Error returned by a remote collaborator (relational store, document
/// store, RPC).
///
/// Collaborators report failures as values, never as panics. The message
/// is meant for logs; the UI shows a generic text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// The backend refused the operation (constraint, permission, ...).
    #[error("rejected by backend: {0}")]
    Rejected(String),
    /// The backend could not be reached.
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    /// Anything else reported by the backend.
    #[error("backend error: {0}")]
    Internal(String),
}

/// Error returned by a resource loader.
///
/// `Clone`, so a single failed fetch can be handed to every caller that
/// joined it.
#[derive(Debug, Clone, Error)]
pub enum LoadError {
    /// The backend holds no row for the key.
    #[error("resource {0} not found")]
    NotFound(ResourceKey),

    /// The round trip failed.
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// Error opening a realtime channel.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The transport is shut down and accepts no new channels.
    #[error("realtime transport is closed")]
    Closed,
    /// The channel name or filter was rejected.
    #[error("channel {0} rejected: {1}")]
    Rejected(ResourceKey, String),
}
