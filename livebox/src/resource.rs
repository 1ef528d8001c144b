//! Mounted resources.
//!
//! A [`LiveResource`] is the owner side of the pattern: it holds the local
//! state of one keyed resource for as long as it is mounted. Mounting
//! fetches a snapshot (cache first), subscribes to realtime changes and
//! patches the local state with every push. Unmounting closes the
//! subscription and turns every continuation still in flight into a
//! no-op.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use livebox_core::{
    Applied, Change, ChannelState, Loader, RemoteError, Record, ResourceKey,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{Instrument, Span, debug, debug_span, trace, warn};

use crate::error::{FetchError, MutationError};
use crate::fetcher::{FetchOptions, FetchSource, Fetched, ResourceFetcher};
use crate::lifecycle::{Lifecycle, Ticket};
use crate::manager::{Delivery, EventStream, SubscriptionLease, SubscriptionManager};
use crate::optimistic::{MutationOutcome, OptimisticMutator};
use crate::policy::{ResourcePolicy, RollbackPolicy};
use crate::state::StateCell;

/// Local state of a resource kind.
///
/// `Snapshot` is what the loader returns and the cache stores; the state
/// is rebuilt from it on every successful fetch and patched in between by
/// realtime changes to `Item` records.
pub trait LiveState: Clone + Default + Send + Sync + 'static {
    /// Fetched representation.
    type Snapshot: Clone + Send + Sync + 'static;
    /// Record type carried by realtime changes.
    type Item: Record;

    /// Replaces the state with a fetched snapshot.
    fn load(&mut self, snapshot: Self::Snapshot);

    /// Applies one realtime change.
    fn apply(&mut self, change: Change<Self::Item>) -> Applied;

    /// Snapshot shown when the first fetch of `key` fails. `None` leaves
    /// the state empty.
    fn fallback(_key: &ResourceKey) -> Option<Self::Snapshot> {
        None
    }
}

/// Loading phase of a mounted resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadPhase {
    /// Not mounted, or mounted without a key.
    #[default]
    Idle,
    /// A fetch is running.
    Loading,
    /// The state reflects a fetched snapshot.
    Ready,
    /// The last fetch failed.
    Failed,
}

/// What the state shows after a failed fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Degraded {
    /// The previously loaded state, kept as is.
    Stale,
    /// The resource's fallback snapshot.
    Fallback,
    /// Nothing was loaded.
    Empty,
}

impl Degraded {
    fn as_str(self) -> &'static str {
        match self {
            Degraded::Stale => "stale",
            Degraded::Fallback => "fallback",
            Degraded::Empty => "empty",
        }
    }
}

/// Observable status of a resource, alongside its state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResourceStatus {
    /// Loading phase.
    pub phase: LoadPhase,
    /// Realtime channel state.
    pub channel: ChannelState,
    /// Source of the last successful fetch.
    pub source: Option<FetchSource>,
    /// Set while the last fetch failed.
    pub degraded: Option<Degraded>,
    /// Message of the last fetch error.
    pub error: Option<String>,
}

impl ResourceStatus {
    /// `true` while a fetch is running.
    pub fn is_loading(&self) -> bool {
        self.phase == LoadPhase::Loading
    }

    /// `true` once the state reflects a fetched snapshot.
    pub fn is_ready(&self) -> bool {
        self.phase == LoadPhase::Ready
    }

    /// `true` while the realtime channel delivers changes.
    pub fn is_live(&self) -> bool {
        self.channel.is_connected()
    }
}

type Observer<T> = Arc<dyn Fn(&Change<T>, Applied) + Send + Sync>;

/// Collaborators shared by all resources of one kind.
pub struct ResourceContext<St: LiveState> {
    fetcher: ResourceFetcher<St::Snapshot>,
    loader: Arc<dyn Loader<St::Snapshot>>,
    subscriptions: Option<SubscriptionManager<St::Item>>,
    policy: ResourcePolicy,
}

impl<St: LiveState> Clone for ResourceContext<St> {
    fn clone(&self) -> Self {
        Self {
            fetcher: self.fetcher.clone(),
            loader: Arc::clone(&self.loader),
            subscriptions: self.subscriptions.clone(),
            policy: self.policy.clone(),
        }
    }
}

impl<St: LiveState> fmt::Debug for ResourceContext<St> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceContext")
            .field("fetcher", &self.fetcher)
            .field("subscriptions", &self.subscriptions)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl<St: LiveState> ResourceContext<St> {
    /// Creates a fetch-only context.
    pub fn new<L>(fetcher: ResourceFetcher<St::Snapshot>, loader: L, policy: ResourcePolicy) -> Self
    where
        L: Loader<St::Snapshot> + 'static,
    {
        Self {
            fetcher,
            loader: Arc::new(loader),
            subscriptions: None,
            policy,
        }
    }

    /// Adds realtime changes to resources created from this context.
    pub fn with_realtime(mut self, subscriptions: SubscriptionManager<St::Item>) -> Self {
        self.subscriptions = Some(subscriptions);
        self
    }

    /// The shared fetcher.
    pub fn fetcher(&self) -> &ResourceFetcher<St::Snapshot> {
        &self.fetcher
    }

    /// The shared subscription manager, if realtime is enabled.
    pub fn subscriptions(&self) -> Option<&SubscriptionManager<St::Item>> {
        self.subscriptions.as_ref()
    }

    /// The policy of this resource kind.
    pub fn policy(&self) -> &ResourcePolicy {
        &self.policy
    }

    /// Creates an unmounted resource.
    pub fn resource(&self) -> LiveResource<St> {
        LiveResource::new(self.clone())
    }
}

/// What a fetch or push continuation needs, detached from the owner.
struct Session<St: LiveState> {
    context: ResourceContext<St>,
    state: StateCell<St>,
    status: StateCell<ResourceStatus>,
}

impl<St: LiveState> Clone for Session<St> {
    fn clone(&self) -> Self {
        Self {
            context: self.context.clone(),
            state: self.state.clone(),
            status: self.status.clone(),
        }
    }
}

impl<St: LiveState> Session<St> {
    async fn load(
        &self,
        key: &ResourceKey,
        ticket: &Ticket,
        options: FetchOptions,
    ) -> Result<FetchSource, FetchError> {
        self.status.update(ticket, |status| {
            status.phase = LoadPhase::Loading;
            true
        });

        match self
            .context
            .fetcher
            .fetch(key, &*self.context.loader, options)
            .await
        {
            Ok(Fetched { value, source }) => {
                self.state.update(ticket, |state| {
                    state.load(value);
                    true
                });
                self.status.update(ticket, |status| {
                    status.phase = LoadPhase::Ready;
                    status.source = Some(source);
                    status.degraded = None;
                    status.error = None;
                    true
                });
                debug!(source = source.as_str(), "resource loaded");
                Ok(source)
            }
            Err(error) => {
                let degraded = if self.status.with(|status| status.source.is_some()) {
                    Degraded::Stale
                } else if let Some(fallback) = St::fallback(key) {
                    self.state.update(ticket, |state| {
                        state.load(fallback);
                        true
                    });
                    Degraded::Fallback
                } else {
                    Degraded::Empty
                };
                let message = error.to_string();
                self.status.update(ticket, |status| {
                    status.phase = LoadPhase::Failed;
                    status.degraded = Some(degraded);
                    status.error = Some(message);
                    true
                });
                warn!(%error, showing = degraded.as_str(), "resource fetch failed");
                Err(error)
            }
        }
    }

    fn apply(
        &self,
        ticket: &Ticket,
        change: Change<St::Item>,
        observer: Option<&Observer<St::Item>>,
    ) {
        let observed = observer.map(|_| change.clone());
        let kind = change.kind();
        let mut applied = Applied::Missing;
        self.state.update(ticket, |state| {
            applied = state.apply(change);
            applied.is_modified()
        });
        trace!(kind, ?applied, "change applied");

        if let (Some(observer), Some(change)) = (observer, observed) {
            if ticket.is_current() {
                observer(&change, applied);
            }
        }
    }

    fn set_channel(&self, ticket: &Ticket, channel: ChannelState) {
        self.status.update(ticket, |status| {
            let modified = status.channel != channel;
            status.channel = channel;
            modified
        });
    }
}

struct Active<T: Record> {
    key: ResourceKey,
    ticket: Ticket,
    lease: Option<SubscriptionLease<T>>,
    pump: Option<JoinHandle<()>>,
}

/// Owner of one mounted resource.
///
/// At most one key is mounted at a time. Mounting a different key tears
/// the previous mount down first: its channel lease is released before
/// the new one is taken, and its pending fetches and pushes can no longer
/// touch the state.
pub struct LiveResource<St: LiveState> {
    session: Session<St>,
    lifecycle: Lifecycle,
    mutator: OptimisticMutator<St>,
    observer: Option<Observer<St::Item>>,
    active: Option<Active<St::Item>>,
}

impl<St: LiveState> LiveResource<St> {
    /// Creates an unmounted resource.
    pub fn new(context: ResourceContext<St>) -> Self {
        let lifecycle = Lifecycle::new();
        let state = StateCell::new(St::default());
        Self {
            mutator: OptimisticMutator::new(state.clone(), lifecycle.clone()),
            session: Session {
                context,
                state,
                status: StateCell::new(ResourceStatus::default()),
            },
            lifecycle,
            observer: None,
            active: None,
        }
    }

    /// Registers a callback run after every realtime change is applied.
    /// Takes effect on the next mount.
    pub fn on_change<F>(&mut self, observer: F)
    where
        F: Fn(&Change<St::Item>, Applied) + Send + Sync + 'static,
    {
        self.observer = Some(Arc::new(observer));
    }

    /// Mounts `key`, or unmounts when `key` is `None`.
    ///
    /// Returns once the first fetch settled and the realtime channel was
    /// requested. Mounting the key that is already mounted does nothing.
    pub async fn mount(&mut self, key: Option<ResourceKey>) {
        if let (Some(active), Some(next)) = (&self.active, &key) {
            if active.key == *next {
                return;
            }
        }
        self.unmount();
        let Some(key) = key else {
            return;
        };

        let ticket = self.lifecycle.begin();
        let span = debug_span!("livebox.resource", %key);
        let active = self.start(key, ticket).instrument(span).await;
        self.active = Some(active);
    }

    /// Switches to another key. Same as [`mount`](Self::mount).
    pub async fn set_key(&mut self, key: Option<ResourceKey>) {
        self.mount(key).await;
    }

    async fn start(&self, key: ResourceKey, ticket: Ticket) -> Active<St::Item> {
        debug!("mounting");
        self.session.state.update(&ticket, |state| {
            *state = St::default();
            true
        });
        self.session.status.update(&ticket, |status| {
            *status = ResourceStatus::default();
            true
        });

        let _ = self
            .session
            .load(&key, &ticket, FetchOptions::default())
            .await;

        let (lease, pump) = match &self.session.context.subscriptions {
            None => (None, None),
            Some(manager) => match manager.subscribe(&key) {
                Ok(subscription) => {
                    let (lease, events, channel) = subscription.into_parts();
                    let pump = tokio::spawn(
                        pump(
                            self.session.clone(),
                            key.clone(),
                            ticket.clone(),
                            events,
                            channel,
                            self.observer.clone(),
                        )
                        .instrument(Span::current()),
                    );
                    (Some(lease), Some(pump))
                }
                Err(error) => {
                    warn!(%error, "realtime unavailable, resource will not receive changes");
                    (None, None)
                }
            },
        };

        Active {
            key,
            ticket,
            lease,
            pump,
        }
    }

    /// Unmounts: releases the channel lease and suppresses every pending
    /// continuation. The last state stays readable. Idempotent.
    pub fn unmount(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        self.lifecycle.end();
        if let Some(pump) = active.pump {
            pump.abort();
        }
        drop(active.lease);
        self.session.status.replace(ResourceStatus {
            phase: LoadPhase::Idle,
            channel: ChannelState::Closed,
            ..self.session.status.get()
        });
        debug!(key = %active.key, "unmounted");
    }

    /// Mounted key.
    pub fn key(&self) -> Option<&ResourceKey> {
        self.active.as_ref().map(|active| &active.key)
    }

    /// `true` while a key is mounted.
    pub fn is_mounted(&self) -> bool {
        self.active.is_some()
    }

    /// Current state.
    pub fn state(&self) -> St {
        self.session.state.get()
    }

    /// Reads the current state without cloning it.
    pub fn with_state<R>(&self, f: impl FnOnce(&St) -> R) -> R {
        self.session.state.with(f)
    }

    /// Watches state changes.
    pub fn watch(&self) -> watch::Receiver<St> {
        self.session.state.subscribe()
    }

    /// Current status.
    pub fn status(&self) -> ResourceStatus {
        self.session.status.get()
    }

    /// Watches status changes.
    pub fn watch_status(&self) -> watch::Receiver<ResourceStatus> {
        self.session.status.subscribe()
    }

    /// Shared collaborators.
    pub fn context(&self) -> &ResourceContext<St> {
        &self.session.context
    }

    /// Reloads the mounted key from the loader, bypassing the cache.
    pub async fn refresh(&self) -> Result<(), FetchError> {
        let Some(active) = &self.active else {
            return Ok(());
        };
        self.session
            .load(&active.key, &active.ticket, FetchOptions::refresh())
            .await
            .map(|_| ())
    }

    /// Like [`refresh`](Self::refresh), in a background task. The result
    /// is discarded if the resource is unmounted before it arrives.
    pub fn spawn_refresh(&self) -> Option<JoinHandle<Result<(), FetchError>>> {
        let active = self.active.as_ref()?;
        let session = self.session.clone();
        let key = active.key.clone();
        let ticket = active.ticket.clone();
        let span = debug_span!("livebox.resource", %key);
        Some(tokio::spawn(
            async move {
                session
                    .load(&key, &ticket, FetchOptions::refresh())
                    .await
                    .map(|_| ())
            }
            .instrument(span),
        ))
    }

    /// Patches the local state without a remote call. Returns whether `f`
    /// modified it; no-op while unmounted.
    pub fn update(&self, f: impl FnOnce(&mut St) -> bool) -> bool {
        self.session.state.update(&self.lifecycle.current(), f)
    }

    /// Runs an optimistic mutation against the local state.
    ///
    /// On failure the patch is undone according to the resource's
    /// [`RollbackPolicy`]: reverted in place with `revert`, or dropped by
    /// reloading from the server. If that reload fails too, `revert` runs
    /// after all. A confirmed mutation invalidates the cached snapshot,
    /// which no longer matches the local state.
    pub async fn mutate<U, R, A, F, V>(
        &self,
        operation: &'static str,
        apply: A,
        remote: F,
        revert: V,
    ) -> Result<MutationOutcome<R>, MutationError>
    where
        A: FnOnce(&mut St) -> Option<U>,
        F: Future<Output = Result<R, RemoteError>>,
        V: FnOnce(&mut St, U),
    {
        self.mutate_with(operation, apply, remote, revert, |_, _, _| false)
            .await
    }

    /// Like [`mutate`](Self::mutate), with `confirm` patching the state
    /// from the server response. See [`OptimisticMutator::mutate_with`].
    pub async fn mutate_with<U, R, A, F, V, C>(
        &self,
        operation: &'static str,
        apply: A,
        remote: F,
        revert: V,
        confirm: C,
    ) -> Result<MutationOutcome<R>, MutationError>
    where
        A: FnOnce(&mut St) -> Option<U>,
        F: Future<Output = Result<R, RemoteError>>,
        V: FnOnce(&mut St, U),
        C: FnOnce(&mut St, &R, U) -> bool,
    {
        let ticket = self.lifecycle.current();
        let result = match self.session.context.policy.rollback {
            RollbackPolicy::Snapshot => {
                self.mutator
                    .mutate_with(operation, apply, remote, revert, confirm)
                    .await
            }
            RollbackPolicy::Refetch => {
                let mut pending = None;
                let result = self
                    .mutator
                    .mutate_with(
                        operation,
                        apply,
                        remote,
                        |_: &mut St, undo: U| pending = Some(undo),
                        confirm,
                    )
                    .await;
                match result {
                    Err(MutationError::RolledBack { operation, source }) => {
                        match self.refresh().await {
                            Ok(()) => Err(MutationError::Reconciled { operation, source }),
                            Err(error) => {
                                warn!(operation, %error, "reload after failed mutation failed, reverting");
                                if let Some(undo) = pending.take() {
                                    self.session.state.update(&ticket, |state| {
                                        revert(state, undo);
                                        true
                                    });
                                }
                                Err(MutationError::RolledBack { operation, source })
                            }
                        }
                    }
                    other => other,
                }
            }
        };

        if let (Ok(MutationOutcome::Confirmed(_)), Some(key)) = (&result, self.key()) {
            self.session.context.fetcher.invalidate(key).await;
        }
        result
    }
}

impl<St: LiveState> Drop for LiveResource<St> {
    fn drop(&mut self) {
        self.unmount();
    }
}

impl<St: LiveState> fmt::Debug for LiveResource<St> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveResource")
            .field("key", &self.key())
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

async fn pump<St: LiveState>(
    session: Session<St>,
    key: ResourceKey,
    ticket: Ticket,
    mut events: EventStream<St::Item>,
    mut channel: watch::Receiver<ChannelState>,
    observer: Option<Observer<St::Item>>,
) {
    let initial = *channel.borrow_and_update();
    session.set_channel(&ticket, initial);

    loop {
        tokio::select! {
            delivery = events.next() => match delivery {
                Some(Delivery::Change(change)) => {
                    if !ticket.is_current() {
                        break;
                    }
                    session.context.fetcher.invalidate(&key).await;
                    session.apply(&ticket, change, observer.as_ref());
                }
                Some(Delivery::Lagged(skipped)) => {
                    warn!(skipped, "missed realtime changes, reloading");
                    let _ = session.load(&key, &ticket, FetchOptions::refresh()).await;
                }
                None => {
                    debug!("change stream ended");
                    break;
                }
            },
            changed = channel.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *channel.borrow_and_update();
                session.set_channel(&ticket, state);
            }
        }
    }
}
