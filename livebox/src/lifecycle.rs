//! Mount generations.
//!
//! A [`Lifecycle`] counts mounts. Every mount hands out a [`Ticket`], and
//! every asynchronous continuation (fetch completion, push delivery,
//! mutation rollback) carries the ticket of the mount that started it.
//! Unmounting or remounting bumps the generation, so continuations holding
//! an older ticket find it stale and leave the state alone.
//!
//! The generation is odd while mounted and even while unmounted.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Mount generation counter shared by an owner and its tasks.
#[derive(Debug, Clone, Default)]
pub struct Lifecycle {
    generation: Arc<AtomicU64>,
}

impl Lifecycle {
    /// Creates an unmounted lifecycle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new mount and returns its ticket. Tickets of earlier mounts
    /// become stale.
    pub fn begin(&self) -> Ticket {
        let previous = self
            .generation
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |g| {
                Some(if g % 2 == 0 { g + 1 } else { g + 2 })
            })
            .unwrap_or_else(|g| g);
        let generation = if previous % 2 == 0 {
            previous + 1
        } else {
            previous + 2
        };
        Ticket {
            generation,
            lifecycle: self.clone(),
        }
    }

    /// Ends the current mount. No-op when already unmounted.
    pub fn end(&self) {
        let _ = self
            .generation
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |g| {
                (g % 2 == 1).then_some(g + 1)
            });
    }

    /// `true` between [`begin`](Self::begin) and [`end`](Self::end).
    pub fn is_mounted(&self) -> bool {
        self.generation.load(Ordering::Acquire) % 2 == 1
    }

    /// Ticket for the current generation. Stale right away if unmounted.
    pub fn current(&self) -> Ticket {
        Ticket {
            generation: self.generation.load(Ordering::Acquire),
            lifecycle: self.clone(),
        }
    }
}

/// Proof that a continuation belongs to a particular mount.
#[derive(Debug, Clone)]
pub struct Ticket {
    generation: u64,
    lifecycle: Lifecycle,
}

impl Ticket {
    /// `true` while the mount that issued this ticket is still active.
    pub fn is_current(&self) -> bool {
        self.generation % 2 == 1
            && self.lifecycle.generation.load(Ordering::Acquire) == self.generation
    }

    /// Generation number of the issuing mount.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}
