//! # verlock
//!
//! A FIFO mutual-exclusion lock whose entire state lives in a
//! versioning-enabled object-storage bucket. No lock server: contenders on
//! different machines coordinate purely by writing versions of one object
//! key, and the store's version history is the wait queue.
//!
//! - **Tickets**: each contender enrolls by writing one empty version; the
//!   store-assigned version token identifies its place in line
//! - **FIFO ordering**: the oldest surviving version holds the lock
//! - **Release**: deleting the held version leaves a delete marker and hands
//!   the head to the next-oldest ticket
//!
//! The crate talks to storage through the [`store::VersionedStore`] trait
//! (four primitives: put version, list versions, delete version, read
//! versioning status); credentials, bucket creation, and retries on
//! transient store failures are the caller's concern.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use verlock::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> verlock::Result<()> {
//! let store = Arc::new(MemoryStore::new());
//! let lock = VersionedLock::open(store, LockConfig::new("my_amazing_lock")).await?;
//!
//! let guard = lock.acquire().await?;
//! // ... critical section ...
//! guard.release().await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod lock;
pub mod observability;
pub mod queue;
pub mod store;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use verlock::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::lock::{DEFAULT_POLL_INTERVAL, LockConfig, LockGuard, VersionedLock};
    pub use crate::store::{MemoryStore, VersionEntry, VersionedStore, VersioningStatus};
}

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use lock::{DEFAULT_POLL_INTERVAL, LockConfig, LockGuard, VersionedLock};
pub use observability::{LogFormat, init_logging};
pub use store::{MemoryStore, VersionEntry, VersionedStore, VersioningStatus};
