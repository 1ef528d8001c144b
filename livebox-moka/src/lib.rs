#![warn(missing_docs)]
//! Bounded in-memory TTL cache backend for livebox, powered by
//! [Moka](https://docs.rs/moka).
//!
//! ```
//! use std::time::Duration;
//! use livebox_moka::MokaBackend;
//!
//! let backend = MokaBackend::<Vec<u8>>::builder(Duration::from_secs(60))
//!     .max_entries(1_000)
//!     .build();
//! ```

mod backend;
mod builder;
pub mod metrics;

pub use backend::MokaBackend;
pub use builder::{EntryCapacity, MokaBackendBuilder, NoCapacity};
pub use moka::policy::EvictionPolicy;
