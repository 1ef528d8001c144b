//! Optimistic mutations.

use std::future::Future;

use livebox_core::RemoteError;
use tracing::{Instrument, debug, debug_span, warn};

use crate::error::MutationError;
use crate::lifecycle::Lifecycle;
use crate::metrics;
use crate::state::StateCell;

/// Outcome of a mutation that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome<R> {
    /// The server confirmed the mutation with this response.
    Confirmed(R),
    /// The local patch found nothing to change; no remote call was made.
    Skipped,
}

impl<R> MutationOutcome<R> {
    /// The server response, if the mutation was confirmed.
    pub fn confirmed(self) -> Option<R> {
        match self {
            MutationOutcome::Confirmed(response) => Some(response),
            MutationOutcome::Skipped => None,
        }
    }
}

/// Applies local patches before their remote call completes.
///
/// [`mutate`](Self::mutate) patches the local state right away so the
/// change is visible without waiting for the server. The patch returns an
/// undo token (typically the previous value of whatever it touched); if
/// the remote call fails, the token is handed to `revert` to restore the
/// state. Patches and reverts are skipped once the owner is unmounted.
#[derive(Debug)]
pub struct OptimisticMutator<S> {
    state: StateCell<S>,
    lifecycle: Lifecycle,
}

impl<S> Clone for OptimisticMutator<S> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            lifecycle: self.lifecycle.clone(),
        }
    }
}

impl<S> OptimisticMutator<S> {
    /// Creates a mutator over `state`, guarded by `lifecycle`.
    pub fn new(state: StateCell<S>, lifecycle: Lifecycle) -> Self {
        Self { state, lifecycle }
    }

    /// Runs an optimistic mutation.
    ///
    /// - `apply` patches the state and returns an undo token, or `None` if
    ///   there is nothing to change (the remote call is then skipped);
    /// - `remote` is awaited only after the patch is visible;
    /// - `revert` receives the undo token if `remote` fails.
    pub async fn mutate<U, R, A, F, V>(
        &self,
        operation: &'static str,
        apply: A,
        remote: F,
        revert: V,
    ) -> Result<MutationOutcome<R>, MutationError>
    where
        A: FnOnce(&mut S) -> Option<U>,
        F: Future<Output = Result<R, RemoteError>>,
        V: FnOnce(&mut S, U),
    {
        self.mutate_with(operation, apply, remote, revert, |_, _, _| false)
            .await
    }

    /// Like [`mutate`](Self::mutate), then patches the state with the
    /// server response.
    ///
    /// `confirm` runs once `remote` succeeds, with the response and the
    /// undo token of the patch it confirms, and returns whether it changed
    /// the state. It runs under the same mount as `apply`: if the owner
    /// was unmounted or remounted meanwhile, it is skipped.
    pub async fn mutate_with<U, R, A, F, V, C>(
        &self,
        operation: &'static str,
        apply: A,
        remote: F,
        revert: V,
        confirm: C,
    ) -> Result<MutationOutcome<R>, MutationError>
    where
        A: FnOnce(&mut S) -> Option<U>,
        F: Future<Output = Result<R, RemoteError>>,
        V: FnOnce(&mut S, U),
        C: FnOnce(&mut S, &R, U) -> bool,
    {
        let ticket = self.lifecycle.current();
        if !ticket.is_current() {
            return Err(MutationError::NotMounted { operation });
        }

        let span = debug_span!("livebox.mutate", operation);
        async move {
            let mut undo = None;
            self.state.update(&ticket, |state| {
                undo = apply(state);
                undo.is_some()
            });
            let Some(undo) = undo else {
                debug!("nothing to change, remote call skipped");
                return Ok(MutationOutcome::Skipped);
            };

            match remote.await {
                Ok(response) => {
                    metrics::record_mutation(operation, true);
                    self.state
                        .update(&ticket, |state| confirm(state, &response, undo));
                    debug!("mutation confirmed");
                    Ok(MutationOutcome::Confirmed(response))
                }
                Err(source) => {
                    metrics::record_mutation(operation, false);
                    let reverted = self.state.update(&ticket, |state| {
                        revert(state, undo);
                        true
                    });
                    if reverted {
                        warn!(error = %source, "remote call failed, local patch reverted");
                        Err(MutationError::RolledBack { operation, source })
                    } else {
                        warn!(error = %source, "remote call failed after unmount");
                        Err(MutationError::Detached { operation, source })
                    }
                }
            }
        }
        .instrument(span)
        .await
    }
}
