//! Observable local state guarded by mount tickets.

use std::sync::Arc;

use tokio::sync::watch;

use crate::lifecycle::Ticket;

/// Shared, observable value.
///
/// Writes go through [`update`](Self::update), which takes the mount
/// [`Ticket`] of the caller and checks it inside the write lock: a
/// continuation of an unmounted owner can never slip a write in after
/// the unmount.
#[derive(Debug)]
pub struct StateCell<S> {
    tx: Arc<watch::Sender<S>>,
}

impl<S> Clone for StateCell<S> {
    fn clone(&self) -> Self {
        Self {
            tx: Arc::clone(&self.tx),
        }
    }
}

impl<S> StateCell<S> {
    /// Creates a cell holding `initial`.
    pub fn new(initial: S) -> Self {
        Self {
            tx: Arc::new(watch::Sender::new(initial)),
        }
    }

    /// Returns a clone of the current value.
    pub fn get(&self) -> S
    where
        S: Clone,
    {
        self.tx.borrow().clone()
    }

    /// Reads the current value without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.tx.borrow())
    }

    /// Applies `f` if `ticket` is still current. `f` returns whether it
    /// modified the value; observers are woken only if it did.
    ///
    /// Returns `true` if the value was modified.
    pub fn update(&self, ticket: &Ticket, f: impl FnOnce(&mut S) -> bool) -> bool {
        self.tx
            .send_if_modified(|value| ticket.is_current() && f(value))
    }

    /// Overwrites the value regardless of mount state.
    pub fn replace(&self, value: S) -> S {
        self.tx.send_replace(value)
    }

    /// Subscribes to changes.
    pub fn subscribe(&self) -> watch::Receiver<S> {
        self.tx.subscribe()
    }
}
