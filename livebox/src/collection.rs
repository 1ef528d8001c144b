//! Ordered record collections patched by realtime changes.

use std::slice;

use livebox_core::{Applied, Change, Record};
use tracing::trace;

/// Where inserted records land.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Placement {
    /// Newest first, as in notification lists and feeds.
    #[default]
    Prepend,
    /// Oldest first.
    Append,
}

/// List of records with unique ids.
///
/// [`apply`](Self::apply) implements the push semantics shared by every
/// collection resource:
///
/// - an insert whose id is already present is a duplicate and ignored;
/// - an update merges into the existing record unless the held record
///   carries a newer version;
/// - an update for an unknown id is ignored;
/// - a delete removes the record if present.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordList<T> {
    items: Vec<T>,
    placement: Placement,
}

impl<T> Default for RecordList<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            placement: Placement::default(),
        }
    }
}

impl<T: Record> RecordList<T> {
    /// Creates an empty list.
    pub fn new(placement: Placement) -> Self {
        Self {
            items: Vec::new(),
            placement,
        }
    }

    /// Builds a list from a snapshot, keeping the first occurrence of
    /// every id.
    pub fn from_snapshot(placement: Placement, snapshot: Vec<T>) -> Self {
        let mut list = Self::new(placement);
        list.replace_all(snapshot);
        list
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// `true` when the list holds no records.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterates in display order.
    pub fn iter(&self) -> slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Records in display order.
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    /// Looks a record up by id.
    pub fn get(&self, id: &T::Id) -> Option<&T> {
        self.items.iter().find(|item| item.id() == id)
    }

    /// `true` if a record with `id` is held.
    pub fn contains(&self, id: &T::Id) -> bool {
        self.get(id).is_some()
    }

    /// Runs `f` on the record with `id`, if present.
    pub fn modify<R>(&mut self, id: &T::Id, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        self.items.iter_mut().find(|item| item.id() == id).map(f)
    }

    /// Runs `f` on every record.
    pub fn modify_all(&mut self, mut f: impl FnMut(&mut T)) {
        self.items.iter_mut().for_each(&mut f);
    }

    /// Applies a realtime change.
    pub fn apply(&mut self, change: Change<T>) -> Applied {
        match change {
            Change::Insert(record) => self.insert(record),
            Change::Update(record) => self.merge(record),
            Change::Delete(id) => match self.remove(&id) {
                Some(_) => Applied::Removed,
                None => Applied::Missing,
            },
        }
    }

    /// Inserts a record at the list's placement unless its id is present.
    pub fn insert(&mut self, record: T) -> Applied {
        if self.contains(record.id()) {
            trace!(id = ?record.id(), "duplicate insert ignored");
            return Applied::Duplicate;
        }
        match self.placement {
            Placement::Prepend => self.items.insert(0, record),
            Placement::Append => self.items.push(record),
        }
        Applied::Inserted
    }

    /// Merges an updated record into the one with the same id.
    pub fn merge(&mut self, record: T) -> Applied {
        let Some(held) = self.items.iter_mut().find(|item| item.id() == record.id()) else {
            return Applied::Missing;
        };
        if held.supersedes(&record) {
            trace!(id = ?record.id(), "stale update discarded");
            return Applied::Stale;
        }
        held.merge(record);
        Applied::Updated
    }

    /// Removes and returns the record with `id`.
    pub fn remove(&mut self, id: &T::Id) -> Option<T> {
        let index = self.items.iter().position(|item| item.id() == id)?;
        Some(self.items.remove(index))
    }

    /// Replaces the content with a fetched snapshot.
    ///
    /// Records held locally with a newer version than their snapshot
    /// counterpart are kept: a push can land between the server building
    /// the snapshot and the snapshot arriving here.
    pub fn replace_all(&mut self, snapshot: Vec<T>) {
        let mut previous = std::mem::take(&mut self.items);
        self.items.reserve(snapshot.len());
        for incoming in snapshot {
            if self.contains(incoming.id()) {
                continue;
            }
            let kept = previous
                .iter()
                .position(|held| held.id() == incoming.id() && held.supersedes(&incoming))
                .map(|index| previous.swap_remove(index));
            self.items.push(kept.unwrap_or(incoming));
        }
    }
}

impl<'a, T> IntoIterator for &'a RecordList<T> {
    type Item = &'a T;
    type IntoIter = slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
