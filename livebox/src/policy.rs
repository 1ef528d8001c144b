//! Resource policies.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default cache time-to-live.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30);

/// What to do with an optimistic patch whose remote call failed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RollbackPolicy {
    /// Revert the patch in place with the undo token it produced.
    #[default]
    Snapshot,
    /// Drop the patch by reloading the resource from the server.
    Refetch,
}

/// Per-resource caching and mutation policy.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct ResourcePolicy {
    /// Time-to-live of cached snapshots (e.g., "30s", "5m").
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
    /// Upper bound on cached keys. `None` keeps the cache unbounded.
    pub max_entries: Option<u64>,
    /// Number of records fetched per page, for collection resources.
    pub page_size: Option<usize>,
    /// Rollback behaviour of failed optimistic mutations.
    pub rollback: RollbackPolicy,
}

impl Default for ResourcePolicy {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            max_entries: None,
            page_size: None,
            rollback: RollbackPolicy::default(),
        }
    }
}

impl ResourcePolicy {
    /// Starts building a policy from the defaults.
    pub fn builder() -> ResourcePolicyBuilder {
        ResourcePolicyBuilder::default()
    }

    /// Page size, or `default` when unset.
    pub fn page_size_or(&self, default: usize) -> usize {
        self.page_size.unwrap_or(default)
    }
}

/// Builder for [`ResourcePolicy`].
#[derive(Debug, Clone, Default)]
pub struct ResourcePolicyBuilder {
    policy: ResourcePolicy,
}

impl ResourcePolicyBuilder {
    /// Sets the cache time-to-live.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.policy.ttl = ttl;
        self
    }

    /// Caps the number of cached keys.
    pub fn max_entries(mut self, max_entries: u64) -> Self {
        self.policy.max_entries = Some(max_entries);
        self
    }

    /// Sets the page size.
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.policy.page_size = Some(page_size);
        self
    }

    /// Sets the rollback policy.
    pub fn rollback(mut self, rollback: RollbackPolicy) -> Self {
        self.policy.rollback = rollback;
        self
    }

    /// Finishes the policy.
    pub fn build(self) -> ResourcePolicy {
        self.policy
    }
}
