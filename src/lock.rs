//! FIFO distributed lock over a versioned object-store key.
//!
//! This module provides a mutual-exclusion lock using cloud object storage
//! as the coordination point. There is no lock server: the version history
//! of a single key is the wait queue. It uses:
//! - **Ticket enrollment**: each contender writes one empty version
//! - **FIFO ordering**: the oldest surviving version holds the lock
//! - **Polling**: contenders re-list the history at a fixed interval
//!
//! # How It Works
//!
//! 1. Acquisition writes an empty object version and remembers its
//!    store-assigned version token ("my ticket")
//! 2. The contender polls the key's history, sorted by timestamp with
//!    delete markers dropped; when its ticket is the oldest entry it holds
//!    the lock
//! 3. Release deletes exactly that ticket version, leaving a delete marker;
//!    the next-oldest ticket becomes the head
//!
//! The bucket must have versioning `Enabled`; construction fails otherwise,
//! since overwritten history silently breaks mutual exclusion.
//!
//! # Example
//!
//! ```rust,ignore
//! let lock = VersionedLock::open(store.clone(), LockConfig::new("my_amazing_lock")).await?;
//!
//! let guard = lock.acquire().await?;
//!
//! // Critical section - only one holder at a time
//! // ...
//!
//! // Release lock (or drop guard for best-effort automatic release)
//! guard.release().await?;
//! ```
//!
//! # Operational Hazards
//!
//! A contender killed while enrolled leaves its ticket in the queue forever;
//! there is no TTL or heartbeat. [`VersionedLock::force_break`] is the manual
//! recovery sweep. `acquire` imposes no wait bound; use
//! [`VersionedLock::acquire_timeout`] to opt into a deadline.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::queue;
use crate::store::VersionedStore;

/// Default poll interval between queue inspections (500 ms).
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

fn default_poll_interval() -> Duration {
    DEFAULT_POLL_INTERVAL
}

/// Configuration for a [`VersionedLock`].
///
/// Serde-derived so collaborators can load it from their own configuration
/// layer; credentials and bucket selection stay outside the core, which only
/// ever receives an already-authenticated store handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockConfig {
    /// Object key whose version history is the ticket queue.
    ///
    /// Must be non-empty and constant for the lifetime of the lock instance.
    pub name: String,

    /// Fixed sleep between poll iterations while waiting.
    ///
    /// No backoff is applied; the interval is the sole liveness/load knob.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: Duration,
}

impl LockConfig {
    /// Creates a configuration with the default poll interval.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Overrides the poll interval.
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

/// A FIFO mutual-exclusion lock backed by a versioned object store.
///
/// All state lives in the store; instances on different machines coordinate
/// purely through the version history of the configured key.
pub struct VersionedLock<S: VersionedStore + ?Sized> {
    store: Arc<S>,
    name: String,
    poll_interval: Duration,
}

// Manual Clone implementation to avoid requiring S: Clone
// (Arc<S> can be cloned regardless of whether S is Clone)
impl<S: VersionedStore + ?Sized> Clone for VersionedLock<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            name: self.name.clone(),
            poll_interval: self.poll_interval,
        }
    }
}

impl<S: VersionedStore + ?Sized> VersionedLock<S> {
    /// Opens a lock on the given store.
    ///
    /// Verifies the versioning precondition once, here; no ticket is written.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if the lock name is empty, and
    /// `Error::PreconditionFailed` if the bucket does not have versioning
    /// `Enabled`. Neither is retried.
    pub async fn open(store: Arc<S>, config: LockConfig) -> Result<Self> {
        if config.name.is_empty() {
            return Err(Error::InvalidInput("lock name must not be empty".into()));
        }

        if !queue::versioning_enabled(&*store).await? {
            return Err(Error::PreconditionFailed {
                message: format!(
                    "bucket versioning must be Enabled to host lock '{}'",
                    config.name
                ),
            });
        }

        tracing::debug!(name = %config.name, interval = ?config.poll_interval, "lock opened");

        Ok(Self {
            store,
            name: config.name,
            poll_interval: config.poll_interval,
        })
    }

    /// Returns the lock name (the contended object key).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the configured poll interval.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Acquires the lock, waiting as long as it takes.
    ///
    /// Enrolls one ticket, then polls until that ticket is the oldest live
    /// version. Fairness is strictly time-of-enqueue order; there is no wait
    /// bound (see [`Self::acquire_timeout`] for a deadline).
    ///
    /// # Errors
    ///
    /// Returns an error if a store operation fails; storage errors are
    /// surfaced immediately, not retried.
    pub async fn acquire(&self) -> Result<LockGuard<S>> {
        let ticket = self.enroll().await?;
        self.wait_until_head(&ticket).await?;

        tracing::info!(name = %self.name, ticket = %ticket, "lock acquired");
        Ok(LockGuard {
            store: Arc::clone(&self.store),
            name: self.name.clone(),
            ticket,
            released: false,
        })
    }

    /// Acquires the lock, giving up after `limit`.
    ///
    /// On expiry the enrolled ticket is withdrawn (best effort) so it does
    /// not haunt the queue, and `Error::AcquireTimeout` is returned.
    ///
    /// # Errors
    ///
    /// Returns `Error::AcquireTimeout` on expiry, or a storage error if a
    /// store operation fails first.
    pub async fn acquire_timeout(&self, limit: Duration) -> Result<LockGuard<S>> {
        let ticket = self.enroll().await?;

        match tokio::time::timeout(limit, self.wait_until_head(&ticket)).await {
            Ok(waited) => {
                waited?;
                tracing::info!(name = %self.name, ticket = %ticket, "lock acquired");
                Ok(LockGuard {
                    store: Arc::clone(&self.store),
                    name: self.name.clone(),
                    ticket,
                    released: false,
                })
            }
            Err(_elapsed) => {
                if let Err(e) = self.store.delete_version(&self.name, &ticket).await {
                    tracing::warn!(
                        name = %self.name,
                        ticket = %ticket,
                        error = %e,
                        "failed to withdraw ticket after timeout; it stays enrolled"
                    );
                }
                Err(Error::AcquireTimeout {
                    name: self.name.clone(),
                    waited: limit,
                })
            }
        }
    }

    /// Writes the enrollment ticket: one empty version under the lock name.
    async fn enroll(&self) -> Result<String> {
        let ticket = self.store.put_version(&self.name, Bytes::new()).await?;
        tracing::debug!(name = %self.name, ticket = %ticket, "ticket enrolled");
        Ok(ticket)
    }

    /// Polls the queue until `ticket` is the oldest live version.
    async fn wait_until_head(&self, ticket: &str) -> Result<()> {
        loop {
            let history = queue::ordered_versions(&*self.store, &self.name).await?;

            match queue::live_tickets(&history).next() {
                Some(head) if head.version == ticket => return Ok(()),
                Some(head) => {
                    let depth = queue::live_tickets(&history).count();
                    tracing::debug!(
                        name = %self.name,
                        head = %head.version,
                        depth,
                        "lock busy, sleeping"
                    );
                }
                None => {
                    // Our own write exists but is not visible yet:
                    // read-after-write lag, not an error.
                    tracing::debug!(
                        name = %self.name,
                        ticket = %ticket,
                        "queue empty while enrolled, retrying"
                    );
                }
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Returns the version token of the current holder's ticket, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the version listing fails.
    pub async fn current_holder(&self) -> Result<Option<String>> {
        let history = queue::ordered_versions(&*self.store, &self.name).await?;
        Ok(queue::live_tickets(&history)
            .next()
            .map(|e| e.version.clone()))
    }

    /// Checks whether any contender currently holds or awaits the lock.
    ///
    /// # Errors
    ///
    /// Returns an error if the version listing fails.
    pub async fn is_locked(&self) -> Result<bool> {
        Ok(self.current_holder().await?.is_some())
    }

    /// Forcefully deletes every live ticket (admin operation).
    ///
    /// Returns the number of tickets removed. This is the manual recovery
    /// path for tickets orphaned by crashed contenders; it revokes the
    /// current holder too, so only use it when the queue is known stale.
    ///
    /// # Errors
    ///
    /// Returns an error if listing or any delete fails.
    pub async fn force_break(&self) -> Result<usize> {
        let history = queue::ordered_versions(&*self.store, &self.name).await?;
        let tickets: Vec<&str> = queue::live_tickets(&history)
            .map(|e| e.version.as_str())
            .collect();

        for ticket in &tickets {
            self.store.delete_version(&self.name, ticket).await?;
        }

        tracing::warn!(name = %self.name, removed = tickets.len(), "lock forcefully broken");
        Ok(tickets.len())
    }
}

/// RAII guard for a held lock.
///
/// Dropping an unreleased guard spawns a best-effort release on the current
/// Tokio runtime; prefer calling [`LockGuard::release`] explicitly so
/// failures are observable. Because `release` consumes the guard, a double
/// release cannot be expressed through this API.
pub struct LockGuard<S: VersionedStore + ?Sized> {
    store: Arc<S>,
    name: String,
    ticket: String,
    released: bool,
}

impl<S: VersionedStore + ?Sized> LockGuard<S> {
    /// Returns the lock name this guard protects.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the version token of the held ticket.
    #[must_use]
    pub fn ticket(&self) -> &str {
        &self.ticket
    }

    /// Releases the lock by deleting the held ticket version.
    ///
    /// The delete leaves a marker in the history; within one poll interval
    /// the next-oldest ticket's owner observes itself at the head.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if the ticket version no longer exists
    /// (e.g. after [`VersionedLock::force_break`]); the error is surfaced,
    /// not swallowed, and no second attempt is made.
    pub async fn release(mut self) -> Result<()> {
        // Mark first: whatever the delete outcome, this guard is done and
        // Drop must not issue a second delete.
        self.released = true;
        self.store.delete_version(&self.name, &self.ticket).await?;
        tracing::info!(name = %self.name, ticket = %self.ticket, "lock released");
        Ok(())
    }
}

impl<S: VersionedStore + ?Sized> Drop for LockGuard<S> {
    fn drop(&mut self) {
        if !self.released {
            // Best-effort async release in destructor.
            // In practice, prefer calling release() explicitly.
            //
            // Without a Tokio runtime (e.g. during shutdown) the ticket is
            // orphaned until force_break or external cleanup.
            let Ok(handle) = tokio::runtime::Handle::try_current() else {
                tracing::warn!(
                    name = %self.name,
                    ticket = %self.ticket,
                    "guard dropped outside a runtime; ticket orphaned"
                );
                return;
            };

            let store = Arc::clone(&self.store);
            let name = self.name.clone();
            let ticket = self.ticket.clone();

            handle.spawn(async move {
                match store.delete_version(&name, &ticket).await {
                    Ok(()) => tracing::info!(name = %name, ticket = %ticket, "lock released"),
                    Err(e) => tracing::warn!(
                        name = %name,
                        ticket = %ticket,
                        error = %e,
                        "best-effort release failed; ticket orphaned"
                    ),
                }
            });
        }
    }
}
