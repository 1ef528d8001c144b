#![warn(missing_docs)]
//! # livebox-core
//!
//! Core traits and types for livebox cached realtime resources.
//!
//! A *resource* is a piece of backend data scoped by a [`ResourceKey`]: the
//! profile of a user, their notifications, their activity feed. Livebox keeps
//! a local copy of each mounted resource, caches fetched snapshots with a
//! strict TTL, and patches the local copy from realtime pushes.
//!
//! This crate holds the vocabulary shared by every other livebox crate:
//!
//! - **Keys and entries**: [`ResourceKey`], [`CachedEntry`], [`BackendLabel`]
//! - **Records and pushes**: [`Record`], [`RecordVersion`], [`Change`], [`Applied`]
//! - **Collaborators**: [`Loader`] for the fetch round trip,
//!   [`RealtimeTransport`] for server-push channels
//! - **Channel states**: [`ChannelStatus`] as reported, [`ChannelState`] as tracked
//! - **Errors**: [`LoadError`], [`RemoteError`], [`TransportError`]

pub mod change;
pub mod entry;
pub mod error;
pub mod key;
pub mod label;
pub mod loader;
pub mod record;
pub mod status;
pub mod transport;

pub use change::{Applied, Change};
pub use entry::CachedEntry;
pub use error::{LoadError, RemoteError, TransportError};
pub use key::ResourceKey;
pub use label::BackendLabel;
pub use loader::Loader;
pub use record::{Record, RecordVersion};
pub use status::{ChannelState, ChannelStatus};
pub use transport::{ChannelControl, ChannelHandle, ChannelMessage, RealtimeTransport};
#[doc(hidden)]
pub use smol_str::SmolStr;
