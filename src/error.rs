//! Error types and result aliases for verlock.
//!
//! Errors are structured for programmatic handling: precondition failures are
//! fatal and never retried, storage failures surface immediately to the
//! caller (retry-on-transient is a collaborator concern, not handled here).

use std::time::Duration;

/// The result type used throughout verlock.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in lock operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A correctness precondition was not met.
    ///
    /// Raised at lock construction when bucket versioning is not in the
    /// `Enabled` state. Fatal: the lock cannot guarantee mutual exclusion on
    /// a bucket that overwrites history.
    #[error("precondition failed: {message}")]
    PreconditionFailed {
        /// Description of the failed precondition.
        message: String,
    },

    /// A storage operation failed.
    ///
    /// Transient store/network failures during enroll, list, or delete land
    /// here and propagate to the caller unretried.
    #[error("storage error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A key or object version was not found.
    ///
    /// Deleting an already-deleted ticket version returns this; it is the
    /// store-layer outcome of a double release.
    #[error("not found: {0}")]
    NotFound(String),

    /// Lock acquisition exceeded the caller-supplied time limit.
    #[error("acquiring lock '{name}' timed out after {waited:?}")]
    AcquireTimeout {
        /// The lock name that was being acquired.
        name: String,
        /// How long the contender waited before giving up.
        waited: Duration,
    },

    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An internal error occurred that should not happen in normal operation.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl Error {
    /// Creates a new storage error with the given message.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new storage error with a source cause.
    #[must_use]
    pub fn storage_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}
