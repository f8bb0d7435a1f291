//! Versioned-storage abstraction for the lock queue (S3, GCS, local).
//!
//! This module defines the minimal contract the lock protocol needs from a
//! versioning-enabled object store: create a version, list the raw version
//! history (delete markers included), delete one specific version, and read
//! the bucket versioning status.
//!
//! ## Multi-Cloud Compatibility
//!
//! The version token is an opaque `String` to support different backends:
//! - S3: version ID
//! - GCS: numeric generation (stored as string)
//!
//! Some listing APIs expose delete markers under a `name` field rather than a
//! `key` field; backends normalize both into [`VersionEntry::key`] and set
//! [`VersionEntry::is_delete_marker`] accordingly.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use ulid::Ulid;

use crate::error::{Error, Result};

/// Versioning configuration state of a bucket.
///
/// Only `Enabled` satisfies the lock's correctness precondition. `Suspended`
/// buckets keep old versions but overwrite in place for new writes, which
/// breaks the ticket-queue invariant just as badly as no versioning at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VersioningStatus {
    /// Every write is retained as a distinct, addressable version.
    Enabled,
    /// Versioning was enabled once but is currently suspended.
    Suspended,
    /// The bucket has never had versioning enabled.
    #[default]
    Unversioned,
}

/// One entry in a key's raw version history.
///
/// Either a live version or a delete marker; both carry a store-assigned
/// opaque version token and a store-assigned modification timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionEntry {
    /// Object key this entry belongs to.
    pub key: String,
    /// Opaque version token, unique per write.
    pub version: String,
    /// Store-assigned modification timestamp.
    ///
    /// Monotonic per key only to the store's clock resolution; entries may
    /// share a timestamp under high write rates.
    pub last_modified: DateTime<Utc>,
    /// Whether this entry is a delete-marker tombstone.
    pub is_delete_marker: bool,
}

/// Storage contract for versioned object stores.
///
/// All backends (S3, GCS, memory) implement this trait. The lock protocol
/// performs no other store operation.
#[async_trait]
pub trait VersionedStore: Send + Sync + 'static {
    /// Writes a new version of `key` and returns its version token.
    ///
    /// The payload may be empty; lock tickets are never read for content.
    async fn put_version(&self, key: &str, payload: Bytes) -> Result<String>;

    /// Lists every version and delete marker whose key starts with `prefix`.
    ///
    /// Returns an empty vec if nothing matches.
    ///
    /// **Ordering**: entries for one key reflect the store's listing order,
    /// which is not guaranteed to be timestamp-sorted. Callers requiring
    /// queue order should sort (see [`crate::queue::ordered_versions`]).
    async fn list_versions(&self, prefix: &str) -> Result<Vec<VersionEntry>>;

    /// Deletes one specific version of `key`, leaving a delete marker in the
    /// history.
    ///
    /// Returns `Error::NotFound` if no live version with that token exists;
    /// deleting twice is therefore an error, not a silent no-op.
    async fn delete_version(&self, key: &str, version: &str) -> Result<()>;

    /// Reads the bucket's versioning configuration state.
    async fn versioning_status(&self) -> Result<VersioningStatus>;
}

/// In-memory versioned store for testing.
///
/// Thread-safe via `RwLock`. Not suitable for production. Retains the full
/// per-key version history in write order; version tokens are ULIDs to
/// simulate the opaque identifiers real stores assign.
#[derive(Debug)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

#[derive(Debug)]
struct MemoryState {
    versioning: VersioningStatus,
    // per-key history, entries in write order
    history: HashMap<String, Vec<VersionEntry>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Creates an empty store with versioning `Enabled`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_versioning(VersioningStatus::Enabled)
    }

    /// Creates an empty store with the given versioning status.
    ///
    /// Useful for exercising the lock's construction precondition.
    #[must_use]
    pub fn with_versioning(versioning: VersioningStatus) -> Self {
        Self {
            state: Arc::new(RwLock::new(MemoryState {
                versioning,
                history: HashMap::new(),
            })),
        }
    }
}

#[async_trait]
impl VersionedStore for MemoryStore {
    // Payload is accepted for contract parity but never stored: the
    // protocol reads tickets only for identity and position.
    async fn put_version(&self, key: &str, _payload: Bytes) -> Result<String> {
        let mut state = self.state.write().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;

        if state.versioning != VersioningStatus::Enabled {
            // Unversioned/suspended buckets overwrite in place.
            let entries = state.history.entry(key.to_string()).or_default();
            entries.clear();
        }

        let version = Ulid::new().to_string();
        state
            .history
            .entry(key.to_string())
            .or_default()
            .push(VersionEntry {
                key: key.to_string(),
                version: version.clone(),
                last_modified: Utc::now(),
                is_delete_marker: false,
            });

        Ok(version)
    }

    async fn list_versions(&self, prefix: &str) -> Result<Vec<VersionEntry>> {
        let state = self.state.read().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;

        Ok(state
            .history
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .flat_map(|(_, entries)| entries.iter().cloned())
            .collect())
    }

    async fn delete_version(&self, key: &str, version: &str) -> Result<()> {
        let mut state = self.state.write().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;

        let Some(entries) = state.history.get_mut(key) else {
            return Err(Error::NotFound(format!("object not found: {key}")));
        };

        let Some(pos) = entries
            .iter()
            .position(|e| e.version == version && !e.is_delete_marker)
        else {
            return Err(Error::NotFound(format!(
                "version not found: {key}@{version}"
            )));
        };

        entries.remove(pos);
        entries.push(VersionEntry {
            key: key.to_string(),
            version: Ulid::new().to_string(),
            last_modified: Utc::now(),
            is_delete_marker: true,
        });

        Ok(())
    }

    async fn versioning_status(&self) -> Result<VersioningStatus> {
        let state = self.state.read().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;
        Ok(state.versioning)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_version_returns_distinct_tokens() {
        let store = MemoryStore::new();

        let v1 = store
            .put_version("lock", Bytes::new())
            .await
            .expect("put should succeed");
        let v2 = store
            .put_version("lock", Bytes::new())
            .await
            .expect("put should succeed");

        assert_ne!(v1, v2, "every write must get a unique version token");
    }

    #[tokio::test]
    async fn test_history_retains_all_versions() {
        let store = MemoryStore::new();

        store.put_version("lock", Bytes::new()).await.unwrap();
        store.put_version("lock", Bytes::new()).await.unwrap();

        let entries = store.list_versions("lock").await.expect("list");
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| !e.is_delete_marker));
    }

    #[tokio::test]
    async fn test_delete_version_leaves_marker() {
        let store = MemoryStore::new();

        let v1 = store.put_version("lock", Bytes::new()).await.unwrap();
        store
            .delete_version("lock", &v1)
            .await
            .expect("delete should succeed");

        let entries = store.list_versions("lock").await.expect("list");
        assert_eq!(entries.len(), 1);
        assert!(entries[0].is_delete_marker);
        assert_ne!(entries[0].version, v1, "marker gets its own token");
    }

    #[tokio::test]
    async fn test_delete_unknown_version_is_not_found() {
        let store = MemoryStore::new();
        store.put_version("lock", Bytes::new()).await.unwrap();

        let result = store.delete_version("lock", "no-such-version").await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_double_delete_is_not_found() {
        let store = MemoryStore::new();
        let v1 = store.put_version("lock", Bytes::new()).await.unwrap();

        store.delete_version("lock", &v1).await.expect("first");
        let result = store.delete_version("lock", &v1).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_versions_filters_by_prefix() {
        let store = MemoryStore::new();

        store.put_version("a/lock", Bytes::new()).await.unwrap();
        store.put_version("a/lock", Bytes::new()).await.unwrap();
        store.put_version("b/lock", Bytes::new()).await.unwrap();

        let list_a = store.list_versions("a/").await.expect("list");
        assert_eq!(list_a.len(), 2);

        let list_none = store.list_versions("c/").await.expect("list");
        assert!(list_none.is_empty());
    }

    #[tokio::test]
    async fn test_versioning_status_reflects_configuration() {
        let enabled = MemoryStore::new();
        assert_eq!(
            enabled.versioning_status().await.unwrap(),
            VersioningStatus::Enabled
        );

        let suspended = MemoryStore::with_versioning(VersioningStatus::Suspended);
        assert_eq!(
            suspended.versioning_status().await.unwrap(),
            VersioningStatus::Suspended
        );
    }

    #[tokio::test]
    async fn test_unversioned_store_overwrites_history() {
        let store = MemoryStore::with_versioning(VersioningStatus::Unversioned);

        store.put_version("lock", Bytes::new()).await.unwrap();
        store.put_version("lock", Bytes::new()).await.unwrap();

        // Without versioning the second write destroys the first.
        let entries = store.list_versions("lock").await.expect("list");
        assert_eq!(entries.len(), 1);
    }
}
