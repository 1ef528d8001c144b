//! In-process realtime transport.
//!
//! [`MemoryTransport`] is a broker that delivers published changes to
//! every open channel of a key. It backs tests and single-process
//! deployments, and documents the contract a networked transport has to
//! honour: channels start unacknowledged, status and changes arrive in
//! publish order, and `close` takes effect before it returns.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use livebox_core::{
    Change, ChannelControl, ChannelHandle, ChannelMessage, ChannelStatus, RealtimeTransport,
    Record, ResourceKey, TransportError,
};
use tokio::sync::mpsc;
use tracing::trace;

type Channels<T> = DashMap<ResourceKey, HashMap<u64, mpsc::UnboundedSender<ChannelMessage<T>>>>;

struct Broker<T: Record> {
    channels: Channels<T>,
    next_id: AtomicU64,
    auto_acknowledge: bool,
    shut_down: AtomicBool,
}

/// In-process pub/sub transport.
pub struct MemoryTransport<T: Record> {
    broker: Arc<Broker<T>>,
}

impl<T: Record> Clone for MemoryTransport<T> {
    fn clone(&self) -> Self {
        Self {
            broker: Arc::clone(&self.broker),
        }
    }
}

impl<T: Record> Default for MemoryTransport<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Record> std::fmt::Debug for MemoryTransport<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTransport")
            .field("keys", &self.broker.channels.len())
            .field("auto_acknowledge", &self.broker.auto_acknowledge)
            .finish()
    }
}

impl<T: Record> MemoryTransport<T> {
    /// Transport that acknowledges every channel as soon as it opens.
    pub fn new() -> Self {
        Self::with_acknowledgement(true)
    }

    /// Transport whose channels stay unacknowledged until
    /// [`acknowledge`](Self::acknowledge) is called.
    pub fn manual() -> Self {
        Self::with_acknowledgement(false)
    }

    fn with_acknowledgement(auto_acknowledge: bool) -> Self {
        Self {
            broker: Arc::new(Broker {
                channels: DashMap::new(),
                next_id: AtomicU64::new(0),
                auto_acknowledge,
                shut_down: AtomicBool::new(false),
            }),
        }
    }

    /// Delivers a change to every open channel of `key`. Returns the number
    /// of channels reached.
    pub fn publish(&self, key: &ResourceKey, change: Change<T>) -> usize {
        trace!(%key, kind = change.kind(), "publishing change");
        self.broadcast(key, ChannelMessage::Change(change))
    }

    /// Reports a status on every open channel of `key`.
    pub fn report_status(&self, key: &ResourceKey, status: ChannelStatus) -> usize {
        self.broadcast(key, ChannelMessage::Status(status))
    }

    /// Acknowledges every open channel of `key`.
    pub fn acknowledge(&self, key: &ResourceKey) -> usize {
        self.report_status(key, ChannelStatus::Subscribed)
    }

    /// Number of open channels for `key`.
    pub fn open_channels(&self, key: &ResourceKey) -> usize {
        self.broker
            .channels
            .get(key)
            .map(|senders| senders.len())
            .unwrap_or(0)
    }

    /// Number of open channels across all keys.
    pub fn total_open_channels(&self) -> usize {
        self.broker
            .channels
            .iter()
            .map(|senders| senders.len())
            .sum()
    }

    /// Sends `CLOSED` to every channel, drops them, and rejects further
    /// opens with [`TransportError::Closed`].
    pub fn shutdown(&self) {
        self.broker.shut_down.store(true, Ordering::Release);
        let keys: Vec<ResourceKey> = self.broker.channels.iter().map(|e| e.key().clone()).collect();
        for key in keys {
            if let Some((_, senders)) = self.broker.channels.remove(&key) {
                for tx in senders.into_values() {
                    let _ = tx.send(ChannelMessage::Status(ChannelStatus::Closed));
                }
            }
        }
    }

    fn broadcast(&self, key: &ResourceKey, message: ChannelMessage<T>) -> usize {
        let Some(mut senders) = self.broker.channels.get_mut(key) else {
            return 0;
        };
        senders.retain(|_, tx| tx.send(message.clone()).is_ok());
        senders.len()
    }
}

impl<T: Record> RealtimeTransport<T> for MemoryTransport<T> {
    fn open(&self, key: &ResourceKey) -> Result<ChannelHandle<T>, TransportError> {
        if self.broker.shut_down.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        let id = self.broker.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        if self.broker.auto_acknowledge {
            let _ = tx.send(ChannelMessage::Status(ChannelStatus::Subscribed));
        }
        self.broker
            .channels
            .entry(key.clone())
            .or_default()
            .insert(id, tx);
        trace!(%key, channel = id, "channel opened");

        let control = Arc::new(MemoryChannelControl {
            broker: Arc::downgrade(&self.broker),
            key: key.clone(),
            id,
        });
        Ok(ChannelHandle::new(key.clone(), rx, control))
    }
}

struct MemoryChannelControl<T: Record> {
    broker: Weak<Broker<T>>,
    key: ResourceKey,
    id: u64,
}

impl<T: Record> ChannelControl for MemoryChannelControl<T> {
    fn close(&self) {
        let Some(broker) = self.broker.upgrade() else {
            return;
        };
        broker.channels.remove_if_mut(&self.key, |_, senders| {
            senders.remove(&self.id);
            senders.is_empty()
        });
        trace!(key = %self.key, channel = self.id, "channel closed");
    }
}
