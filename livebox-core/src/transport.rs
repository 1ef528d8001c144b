//! Realtime channel collaborator.
//!
//! A [`RealtimeTransport`] opens server-push channels scoped to a
//! [`ResourceKey`]. Opening returns immediately with a [`ChannelHandle`];
//! the server acknowledgement arrives later as a
//! [`ChannelMessage::Status`], the same way a hosted realtime service calls
//! its subscribe status callback.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::change::Change;
use crate::error::TransportError;
use crate::key::ResourceKey;
use crate::record::Record;
use crate::status::ChannelStatus;

/// Message delivered on an open channel.
#[derive(Debug, Clone)]
pub enum ChannelMessage<T: Record> {
    /// Subscription status changed.
    Status(ChannelStatus),
    /// A record changed on the server.
    Change(Change<T>),
}

/// Releases a channel on the transport side.
pub trait ChannelControl: Send + Sync {
    /// Closes the channel. Must be synchronous and idempotent: once it
    /// returns, the transport delivers nothing more on the channel.
    fn close(&self);
}

/// An open realtime channel, owned by exactly one subscriber.
pub struct ChannelHandle<T: Record> {
    key: ResourceKey,
    messages: mpsc::UnboundedReceiver<ChannelMessage<T>>,
    control: Arc<dyn ChannelControl>,
}

impl<T: Record> ChannelHandle<T> {
    /// Assembles a handle from the transport's message stream and control.
    pub fn new(
        key: ResourceKey,
        messages: mpsc::UnboundedReceiver<ChannelMessage<T>>,
        control: Arc<dyn ChannelControl>,
    ) -> Self {
        Self {
            key,
            messages,
            control,
        }
    }

    /// Key the channel is scoped to.
    pub fn key(&self) -> &ResourceKey {
        &self.key
    }

    /// Receives the next message; `None` once the channel is closed.
    pub async fn recv(&mut self) -> Option<ChannelMessage<T>> {
        self.messages.recv().await
    }

    /// Returns a control that can close the channel from another task.
    pub fn control(&self) -> Arc<dyn ChannelControl> {
        Arc::clone(&self.control)
    }

    /// Closes the channel and drops the handle.
    pub fn close(self) {
        self.control.close();
    }
}

impl<T: Record> fmt::Debug for ChannelHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelHandle")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// Opens server-push channels for records of type `T`.
pub trait RealtimeTransport<T: Record>: Send + Sync {
    /// Opens a channel for `key`. The channel starts unacknowledged.
    fn open(&self, key: &ResourceKey) -> Result<ChannelHandle<T>, TransportError>;
}

impl<T: Record, R: RealtimeTransport<T> + ?Sized> RealtimeTransport<T> for Arc<R> {
    fn open(&self, key: &ResourceKey) -> Result<ChannelHandle<T>, TransportError> {
        (**self).open(key)
    }
}
