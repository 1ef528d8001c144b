#![warn(missing_docs)]
//! # livebox
//!
//! Cached realtime resources for async Rust.
//!
//! Livebox keeps a local copy of backend data (a profile, a notification
//! list, an activity feed) fresh without hammering the backend:
//!
//! - snapshots are fetched through a shared TTL cache, and concurrent
//!   fetches of one key share a single loader call ([`ResourceFetcher`]);
//! - each mounted key listens on one realtime channel, reference counted
//!   across owners ([`SubscriptionManager`], [`Subscriber`]);
//! - pushes patch the local copy in place, stale versions are discarded
//!   ([`RecordList`]);
//! - user actions are applied locally first and rolled back if the server
//!   rejects them ([`OptimisticMutator`]);
//! - unmounting releases the channel and silences everything still in
//!   flight ([`LiveResource`], [`Lifecycle`]).
//!
//! ## Quick start
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use livebox::{
//!     Applied, Change, LiveState, LoadError, MemoryBackend, MemoryTransport, Record,
//!     RecordList, ResourceContext, ResourceFetcher, ResourceKey, ResourcePolicy,
//!     SubscriptionManager,
//! };
//!
//! #[derive(Debug, Clone)]
//! struct Message {
//!     id: u64,
//!     body: String,
//! }
//!
//! impl Record for Message {
//!     type Id = u64;
//!     fn id(&self) -> &u64 {
//!         &self.id
//!     }
//! }
//!
//! #[derive(Debug, Clone, Default)]
//! struct Inbox(RecordList<Message>);
//!
//! impl LiveState for Inbox {
//!     type Snapshot = Vec<Message>;
//!     type Item = Message;
//!
//!     fn load(&mut self, snapshot: Vec<Message>) {
//!         self.0.replace_all(snapshot);
//!     }
//!
//!     fn apply(&mut self, change: Change<Message>) -> Applied {
//!         self.0.apply(change)
//!     }
//! }
//!
//! # async fn run() {
//! let transport = MemoryTransport::<Message>::new();
//! let fetcher = ResourceFetcher::new(MemoryBackend::new(Duration::from_secs(30)));
//! let loader = |_key: ResourceKey| async { Ok::<_, LoadError>(Vec::<Message>::new()) };
//! let context = ResourceContext::<Inbox>::new(fetcher, loader, ResourcePolicy::default())
//!     .with_realtime(SubscriptionManager::new(transport.clone()));
//!
//! let mut inbox = context.resource();
//! inbox.mount(Some(ResourceKey::new("inbox", "alice"))).await;
//! # }
//! ```

pub mod collection;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod guard;
pub mod lifecycle;
pub mod manager;
pub mod metrics;
pub mod optimistic;
pub mod policy;
pub mod resource;
pub mod state;
pub mod subscriber;
pub mod transport;

pub use collection::{Placement, RecordList};
pub use config::{Config, RealtimeConfig};
pub use error::{ConfigError, FetchError, MutationError};
pub use fetcher::{FetchOptions, FetchSource, Fetched, ResourceFetcher};
pub use guard::{FetchDecision, FetchGuard, InFlightLease};
pub use lifecycle::{Lifecycle, Ticket};
pub use manager::{Delivery, EventStream, Subscription, SubscriptionLease, SubscriptionManager};
pub use optimistic::{MutationOutcome, OptimisticMutator};
pub use policy::{ResourcePolicy, RollbackPolicy};
pub use resource::{Degraded, LiveResource, LiveState, LoadPhase, ResourceContext, ResourceStatus};
pub use state::StateCell;
pub use subscriber::Subscriber;
pub use transport::MemoryTransport;

pub use livebox_backend::{CacheBackend, DeleteStatus, MemoryBackend};
pub use livebox_core::{
    Applied, BackendLabel, CachedEntry, Change, ChannelState, ChannelStatus, LoadError, Loader,
    RealtimeTransport, Record, RecordVersion, RemoteError, ResourceKey, TransportError,
};
