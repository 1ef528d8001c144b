//! Resource key types.
//!
//! A [`ResourceKey`] scopes everything livebox keeps per logical resource:
//! cache entries, in-flight fetches and realtime channels.
//!
//! ## Format
//!
//! Keys render as `{namespace}:{id}`:
//!
//! ```
//! use livebox_core::ResourceKey;
//!
//! let key = ResourceKey::new("notifications", "42");
//! assert_eq!(key.to_string(), "notifications:42");
//! assert_eq!(key.namespace(), "notifications");
//! assert_eq!(key.id(), "42");
//! ```
//!
//! ## Performance
//!
//! [`ResourceKey`] uses `Arc` internally for cheap cloning. Both components
//! are [`SmolStr`], so short namespaces and ids (≤23 bytes) are stored inline.

use smol_str::SmolStr;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::mem::size_of;
use std::sync::Arc;

#[derive(Debug, Clone, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
struct ResourceKeyInner {
    namespace: SmolStr,
    id: SmolStr,
}

/// Identifier of a logical resource, e.g. the notifications of one user.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(from = "ResourceKeyInner", into = "ResourceKeyInner")]
pub struct ResourceKey {
    inner: Arc<ResourceKeyInner>,
}

impl ResourceKey {
    /// Creates a key from a namespace and a resource id.
    pub fn new(namespace: impl Into<SmolStr>, id: impl Into<SmolStr>) -> Self {
        Self {
            inner: Arc::new(ResourceKeyInner {
                namespace: namespace.into(),
                id: id.into(),
            }),
        }
    }

    /// Returns the namespace (resource kind) of the key.
    #[inline]
    pub fn namespace(&self) -> &str {
        &self.inner.namespace
    }

    /// Returns the resource id of the key.
    #[inline]
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Approximate memory footprint of the key in bytes.
    ///
    /// Counts the `Arc` allocation plus heap spill of strings longer than
    /// the inline threshold.
    pub fn memory_size(&self) -> usize {
        let heap = |len: usize| len.saturating_sub(23);
        size_of::<Self>()
            + size_of::<ResourceKeyInner>()
            + heap(self.inner.namespace.len())
            + heap(self.inner.id.len())
    }
}

impl PartialEq for ResourceKey {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner) || self.inner == other.inner
    }
}

impl Eq for ResourceKey {}

impl Hash for ResourceKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.hash(state);
    }
}

impl From<ResourceKeyInner> for ResourceKey {
    fn from(inner: ResourceKeyInner) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }
}

impl From<ResourceKey> for ResourceKeyInner {
    fn from(key: ResourceKey) -> Self {
        Arc::try_unwrap(key.inner).unwrap_or_else(|arc| (*arc).clone())
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.inner.namespace, self.inner.id)
    }
}
