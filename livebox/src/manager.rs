//! Reference-counted realtime channels.
//!
//! Several owners may watch the same key: two views of one profile, a
//! badge and a drawer over the same notification list. The manager opens
//! one channel per key and fans its changes out to every lease; the
//! channel closes when the last lease is dropped.

use std::fmt;
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use livebox_core::{
    Change, ChannelState, RealtimeTransport, Record, ResourceKey, TransportError,
};
use tokio::sync::{broadcast, watch};
use tracing::debug;

use crate::subscriber::Subscriber;

/// Default capacity of the per-channel fan-out buffer.
pub const DEFAULT_EVENT_BUFFER: usize = 64;

struct SharedChannel<T: Record> {
    leases: usize,
    events: broadcast::Sender<Change<T>>,
    state: Arc<watch::Sender<ChannelState>>,
    subscriber: Subscriber<T>,
}

struct Registry<T: Record> {
    transport: Arc<dyn RealtimeTransport<T>>,
    channels: DashMap<ResourceKey, SharedChannel<T>>,
    buffer: usize,
}

impl<T: Record> Registry<T> {
    fn release(&self, key: &ResourceKey) {
        let Entry::Occupied(mut entry) = self.channels.entry(key.clone()) else {
            return;
        };
        let shared = entry.get_mut();
        shared.leases = shared.leases.saturating_sub(1);
        if shared.leases > 0 {
            debug!(%key, leases = shared.leases, "subscription released");
            return;
        }
        let (_, mut shared) = entry.remove_entry();
        shared.subscriber.close();
        debug!(%key, "last subscription released");
    }
}

/// Ref-counted registry of realtime channels for records of type `T`.
pub struct SubscriptionManager<T: Record> {
    registry: Arc<Registry<T>>,
}

impl<T: Record> Clone for SubscriptionManager<T> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<T: Record> fmt::Debug for SubscriptionManager<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionManager")
            .field("channels", &self.registry.channels.len())
            .field("buffer", &self.registry.buffer)
            .finish()
    }
}

impl<T: Record> SubscriptionManager<T> {
    /// Creates a manager opening channels on `transport`.
    pub fn new<R>(transport: R) -> Self
    where
        R: RealtimeTransport<T> + 'static,
    {
        Self::with_buffer(transport, DEFAULT_EVENT_BUFFER)
    }

    /// Creates a manager whose per-channel fan-out holds `buffer` changes.
    /// A lease that falls further behind observes
    /// [`Delivery::Lagged`].
    pub fn with_buffer<R>(transport: R, buffer: usize) -> Self
    where
        R: RealtimeTransport<T> + 'static,
    {
        Self {
            registry: Arc::new(Registry {
                transport: Arc::new(transport),
                channels: DashMap::new(),
                buffer: buffer.max(1),
            }),
        }
    }

    /// Takes a lease on the channel for `key`, opening it if no lease is
    /// held. A channel that was closed by the server is replaced by a
    /// fresh subscriber.
    pub fn subscribe(&self, key: &ResourceKey) -> Result<Subscription<T>, TransportError> {
        let registry = &self.registry;
        let shared = match registry.channels.entry(key.clone()) {
            Entry::Occupied(mut entry) => {
                let shared = entry.get_mut();
                if shared.subscriber.is_closed() {
                    debug!(%key, "reopening closed channel");
                    shared.subscriber.close();
                    let sink = shared.events.clone();
                    shared.subscriber = Subscriber::open_with_state(
                        &*registry.transport,
                        key.clone(),
                        Arc::clone(&shared.state),
                        move |change| {
                            let _ = sink.send(change);
                        },
                    )?;
                }
                shared.leases += 1;
                debug!(%key, leases = shared.leases, "joined open channel");
                entry.into_ref()
            }
            Entry::Vacant(entry) => {
                let (events, _) = broadcast::channel(registry.buffer);
                let state = Arc::new(watch::Sender::new(ChannelState::Closed));
                let sink = events.clone();
                let subscriber = Subscriber::open_with_state(
                    &*registry.transport,
                    key.clone(),
                    Arc::clone(&state),
                    move |change| {
                        let _ = sink.send(change);
                    },
                )?;
                entry.insert(SharedChannel {
                    leases: 1,
                    events,
                    state,
                    subscriber,
                })
            }
        };

        Ok(Subscription {
            key: key.clone(),
            events: shared.events.subscribe(),
            state: shared.state.subscribe(),
            lease: SubscriptionLease {
                key: key.clone(),
                registry: Arc::downgrade(&self.registry),
            },
        })
    }

    /// Number of leases held on `key`'s channel.
    pub fn lease_count(&self, key: &ResourceKey) -> usize {
        self.registry
            .channels
            .get(key)
            .map(|shared| shared.leases)
            .unwrap_or(0)
    }

    /// Number of channels currently open.
    pub fn open_channels(&self) -> usize {
        self.registry.channels.len()
    }
}

/// Item of a [`Subscription`] stream.
#[derive(Debug, Clone)]
pub enum Delivery<T: Record> {
    /// A change pushed by the server.
    Change(Change<T>),
    /// This lease fell behind and lost `n` changes. Local state must be
    /// reloaded.
    Lagged(u64),
}

/// A lease on a shared channel.
///
/// Dropping the subscription releases the lease.
pub struct Subscription<T: Record> {
    key: ResourceKey,
    events: broadcast::Receiver<Change<T>>,
    state: watch::Receiver<ChannelState>,
    lease: SubscriptionLease<T>,
}

impl<T: Record> Subscription<T> {
    /// Key of the channel.
    pub fn key(&self) -> &ResourceKey {
        &self.key
    }

    /// Current channel state.
    pub fn state(&self) -> ChannelState {
        *self.state.borrow()
    }

    /// Next change; `None` once the channel is gone.
    pub async fn next(&mut self) -> Option<Delivery<T>> {
        next_delivery(&mut self.events).await
    }

    /// Splits into the lease, the change stream and the state watch, so
    /// the lease can stay with the owner while a task drains the stream.
    pub fn into_parts(self) -> (SubscriptionLease<T>, EventStream<T>, watch::Receiver<ChannelState>) {
        (
            self.lease,
            EventStream {
                events: self.events,
            },
            self.state,
        )
    }
}

impl<T: Record> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Change stream detached from its lease.
pub struct EventStream<T: Record> {
    events: broadcast::Receiver<Change<T>>,
}

impl<T: Record> EventStream<T> {
    /// Next change; `None` once the channel is gone.
    pub async fn next(&mut self) -> Option<Delivery<T>> {
        next_delivery(&mut self.events).await
    }
}

async fn next_delivery<T: Record>(
    events: &mut broadcast::Receiver<Change<T>>,
) -> Option<Delivery<T>> {
    match events.recv().await {
        Ok(change) => Some(Delivery::Change(change)),
        Err(broadcast::error::RecvError::Lagged(skipped)) => Some(Delivery::Lagged(skipped)),
        Err(broadcast::error::RecvError::Closed) => None,
    }
}

/// Keeps a channel open. Releasing the last lease of a key closes its
/// channel synchronously.
pub struct SubscriptionLease<T: Record> {
    key: ResourceKey,
    registry: Weak<Registry<T>>,
}

impl<T: Record> SubscriptionLease<T> {
    /// Key of the leased channel.
    pub fn key(&self) -> &ResourceKey {
        &self.key
    }
}

impl<T: Record> Drop for SubscriptionLease<T> {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.release(&self.key);
        }
    }
}

impl<T: Record> fmt::Debug for SubscriptionLease<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionLease")
            .field("key", &self.key)
            .finish()
    }
}
