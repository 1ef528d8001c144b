//! Realtime subscriber state machine.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use livebox_core::{
    Change, ChannelControl, ChannelHandle, ChannelMessage, ChannelState, ChannelStatus,
    RealtimeTransport, Record, ResourceKey, TransportError,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, debug_span, trace, warn};

use crate::metrics;

/// One realtime channel and the task pumping its messages.
///
/// The channel moves `Closed → Opening → Subscribed → Closed`:
///
/// - it is `Opening` from [`open`](Self::open) until the server reports
///   `SUBSCRIBED`;
/// - `CHANNEL_ERROR` and `TIMED_OUT` drop it back to `Opening`, the
///   transport is expected to retry;
/// - server `CLOSED`, [`close`](Self::close) and drop end it in `Closed`.
///
/// `Closed` is terminal. Changes are handed to the handler only while
/// `Subscribed`; anything that arrives earlier is dropped. A closed
/// subscriber is never reopened, open a new one instead.
pub struct Subscriber<T: Record> {
    key: ResourceKey,
    state: Arc<watch::Sender<ChannelState>>,
    control: Arc<dyn ChannelControl>,
    pump: JoinHandle<()>,
    open: Arc<Mutex<bool>>,
    closed: bool,
    _record: std::marker::PhantomData<fn() -> T>,
}

impl<T: Record> Subscriber<T> {
    /// Opens a channel for `key` and starts delivering its changes to
    /// `handler`.
    pub fn open<R, H>(transport: &R, key: ResourceKey, handler: H) -> Result<Self, TransportError>
    where
        R: RealtimeTransport<T> + ?Sized,
        H: FnMut(Change<T>) + Send + 'static,
    {
        let state = Arc::new(watch::Sender::new(ChannelState::Closed));
        Self::open_with_state(transport, key, state, handler)
    }

    /// Like [`open`](Self::open), but publishes state transitions into an
    /// existing watch channel. Observers of `state` keep working across
    /// successive subscribers of the same key.
    pub fn open_with_state<R, H>(
        transport: &R,
        key: ResourceKey,
        state: Arc<watch::Sender<ChannelState>>,
        handler: H,
    ) -> Result<Self, TransportError>
    where
        R: RealtimeTransport<T> + ?Sized,
        H: FnMut(Change<T>) + Send + 'static,
    {
        let handle = transport.open(&key)?;
        state.send_replace(ChannelState::Opening);
        metrics::channel_opened(key.namespace());
        debug!(%key, "channel opening");

        let control = handle.control();
        let open = Arc::new(Mutex::new(true));
        let span = debug_span!("livebox.subscribe", %key);
        let pump = tokio::spawn(
            pump(handle, Arc::clone(&state), Arc::clone(&open), handler).instrument(span),
        );

        Ok(Self {
            key,
            state,
            control,
            pump,
            open,
            closed: false,
            _record: std::marker::PhantomData,
        })
    }

    /// Key of the channel.
    pub fn key(&self) -> &ResourceKey {
        &self.key
    }

    /// Current channel state.
    pub fn state(&self) -> ChannelState {
        *self.state.borrow()
    }

    /// Watches channel state transitions.
    pub fn watch_state(&self) -> watch::Receiver<ChannelState> {
        self.state.subscribe()
    }

    /// `true` once the subscriber reached `Closed`, whoever closed it.
    pub fn is_closed(&self) -> bool {
        self.closed || self.state() == ChannelState::Closed
    }

    /// Closes the channel. Idempotent.
    ///
    /// A change being handled when `close` is called finishes first; once
    /// `close` returns, the handler is not called again.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        *lock(&self.open) = false;
        self.control.close();
        self.pump.abort();
        self.state.send_replace(ChannelState::Closed);
        metrics::channel_closed(self.key.namespace());
        debug!(key = %self.key, "channel closed");
    }
}

impl<T: Record> Drop for Subscriber<T> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<T: Record> fmt::Debug for Subscriber<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("key", &self.key)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

fn lock(open: &Mutex<bool>) -> MutexGuard<'_, bool> {
    open.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn pump<T, H>(
    mut handle: ChannelHandle<T>,
    state: Arc<watch::Sender<ChannelState>>,
    open: Arc<Mutex<bool>>,
    mut handler: H,
) where
    T: Record,
    H: FnMut(Change<T>),
{
    while let Some(message) = handle.recv().await {
        match message {
            ChannelMessage::Status(status) => {
                let current = *state.borrow();
                let next = current.on_status(&status);
                match &status {
                    ChannelStatus::ChannelError | ChannelStatus::TimedOut => {
                        warn!(%status, "channel interrupted, waiting for transport retry");
                    }
                    ChannelStatus::Other(_) => {
                        debug!(%status, "ignoring unknown channel status");
                    }
                    _ => {}
                }
                if next != current {
                    debug!(from = current.as_str(), to = next.as_str(), "channel state changed");
                    state.send_replace(next);
                }
                if next == ChannelState::Closed {
                    break;
                }
            }
            ChannelMessage::Change(change) => {
                if !state.borrow().is_connected() {
                    trace!(kind = change.kind(), "dropping change received before subscription");
                    continue;
                }
                let delivering = lock(&open);
                if !*delivering {
                    break;
                }
                metrics::record_push(handle.key().namespace(), change.kind());
                handler(change);
            }
        }
    }
    state.send_replace(ChannelState::Closed);
}
