//! Push-event payloads.

use crate::record::Record;

/// A record mutation delivered over a realtime channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Change<T: Record> {
    /// A new record was created.
    Insert(T),
    /// An existing record changed; carries the new copy.
    Update(T),
    /// A record was removed.
    Delete(T::Id),
}

impl<T: Record> Change<T> {
    /// Short name of the change kind, used as a tracing field and metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            Change::Insert(_) => "insert",
            Change::Update(_) => "update",
            Change::Delete(_) => "delete",
        }
    }
}

/// What applying a [`Change`] did to local state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// A new record was added.
    Inserted,
    /// An existing record was merged.
    Updated,
    /// A record was removed.
    Removed,
    /// Insert of an id already present; ignored.
    Duplicate,
    /// Update older than the held version; ignored.
    Stale,
    /// Update or delete for an id not held locally; ignored.
    Missing,
}

impl Applied {
    /// Whether local state changed.
    pub fn is_modified(self) -> bool {
        matches!(self, Applied::Inserted | Applied::Updated | Applied::Removed)
    }
}
