//! Records held in local resource state.
//!
//! A [`Record`] is anything with a stable identity that can be inserted,
//! updated or deleted by realtime pushes. Records may also expose a
//! monotonic [`RecordVersion`]; when both the held and the incoming copy
//! carry one, older incoming copies are discarded instead of overwriting
//! newer local data.

use std::fmt::Debug;
use std::hash::Hash;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Monotonic version of a record.
///
/// Usually derived from a server-side `updated_at` timestamp, but any
/// sequence number works as long as it grows with every write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordVersion(i64);

impl RecordVersion {
    /// Creates a version from a raw sequence number.
    pub const fn new(sequence: i64) -> Self {
        Self(sequence)
    }

    /// Returns the raw sequence number.
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl From<DateTime<Utc>> for RecordVersion {
    fn from(at: DateTime<Utc>) -> Self {
        Self(at.timestamp_micros())
    }
}

/// An identifiable record that realtime pushes can patch.
pub trait Record: Clone + Debug + Send + Sync + 'static {
    /// Identifier type; unique within one resource.
    type Id: Clone + Debug + Eq + Hash + Send + Sync + 'static;

    /// Returns the record identifier.
    fn id(&self) -> &Self::Id;

    /// Returns the record version, if the record carries one.
    fn version(&self) -> Option<RecordVersion> {
        None
    }

    /// Merges an incoming copy of the same record into `self`.
    ///
    /// The default replaces `self` wholesale. Records whose push payloads
    /// omit client-side joined fields override this to keep them.
    fn merge(&mut self, incoming: Self) {
        *self = incoming;
    }

    /// Whether `self` is newer than `incoming`, which must then be ignored.
    fn supersedes(&self, incoming: &Self) -> bool {
        matches!(
            (self.version(), incoming.version()),
            (Some(held), Some(new)) if new < held
        )
    }
}
