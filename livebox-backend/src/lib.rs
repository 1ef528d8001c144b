//! TTL cache backends for livebox.
//!
//! Implement [`CacheBackend`] to plug a custom store under the resource
//! fetcher. Two backends ship with livebox:
//!
//! | Backend | Crate | Bound |
//! |---------|-------|-------|
//! | [`MemoryBackend`] | `livebox-backend` | TTL only |
//! | `MokaBackend` | `livebox-moka` | TTL + entry cap (LRU / TinyLFU) |
mod backend;
mod memory;
pub mod metrics;

pub use backend::CacheBackend;
pub use memory::MemoryBackend;

/// Result of an invalidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteStatus {
    /// Entries removed.
    Deleted(u32),
    /// Nothing stored under the key.
    Missing,
}
