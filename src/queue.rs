//! Ticket-queue helpers built on the raw version history.
//!
//! The version history of a single key, sorted ascending by modification
//! timestamp with delete markers filtered out, *is* the lock queue: the
//! oldest surviving ticket belongs to the current holder. These helpers are
//! stateless; [`crate::lock::VersionedLock`] calls them every poll.

use crate::error::Result;
use crate::store::{VersionEntry, VersionedStore, VersioningStatus};

/// Returns whether the store's bucket has versioning `Enabled`.
///
/// `Suspended` and `Unversioned` both fail the check: in either state an
/// overwrite destroys history and the queue invariant with it.
///
/// # Errors
///
/// Returns an error if the versioning configuration could not be read.
pub async fn versioning_enabled<S: VersionedStore + ?Sized>(store: &S) -> Result<bool> {
    Ok(store.versioning_status().await? == VersioningStatus::Enabled)
}

/// Fetches the full version history of `key`, queue-ordered.
///
/// Lists by prefix, keeps only entries whose key matches `key` exactly (a
/// sibling key like `{key}-2` must not leak into the queue), then
/// stable-sorts ascending by `last_modified`. Delete markers are retained;
/// apply [`live_tickets`] to drop them.
///
/// An empty history is `Ok(vec![])`, not an error.
///
/// # Errors
///
/// Returns an error if the version listing fails.
pub async fn ordered_versions<S: VersionedStore + ?Sized>(
    store: &S,
    key: &str,
) -> Result<Vec<VersionEntry>> {
    let mut entries: Vec<VersionEntry> = store
        .list_versions(key)
        .await?
        .into_iter()
        .filter(|e| e.key == key)
        .collect();

    sort_by_modified(&mut entries);
    Ok(entries)
}

/// Stable-sorts entries ascending by modification timestamp.
///
/// Stores only guarantee timestamps to their clock resolution, so ties are
/// real under contention. The sort is stable: tied entries keep the order
/// the store returned them in, which means fairness among same-timestamp
/// tickets is store-defined, not decided here.
pub fn sort_by_modified(entries: &mut [VersionEntry]) {
    entries.sort_by_key(|e| e.last_modified);
}

/// Filters an ordered history down to live tickets.
///
/// Lazy, allocation-free, order-preserving; re-filtering an already filtered
/// sequence yields the same sequence.
pub fn live_tickets<'a, I>(entries: I) -> impl Iterator<Item = &'a VersionEntry>
where
    I: IntoIterator<Item = &'a VersionEntry>,
{
    entries.into_iter().filter(|e| !e.is_delete_marker)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use bytes::Bytes;
    use chrono::{TimeZone, Utc};

    fn entry(version: &str, ts_millis: i64, marker: bool) -> VersionEntry {
        VersionEntry {
            key: "my_amazing_lock".into(),
            version: version.into(),
            last_modified: Utc.timestamp_millis_opt(ts_millis).unwrap(),
            is_delete_marker: marker,
        }
    }

    #[test]
    fn test_sort_ascending_by_timestamp() {
        let mut entries = vec![
            entry("v3", 300, false),
            entry("v1", 100, false),
            entry("v2", 200, true),
        ];
        sort_by_modified(&mut entries);

        let order: Vec<&str> = entries.iter().map(|e| e.version.as_str()).collect();
        assert_eq!(order, ["v1", "v2", "v3"]);
    }

    #[test]
    fn test_sort_preserves_store_order_on_ties() {
        // Equal timestamps: the store's listing order must survive the sort.
        let mut entries = vec![
            entry("first", 100, false),
            entry("second", 100, false),
            entry("third", 100, false),
        ];
        sort_by_modified(&mut entries);

        let order: Vec<&str> = entries.iter().map(|e| e.version.as_str()).collect();
        assert_eq!(order, ["first", "second", "third"]);
    }

    #[test]
    fn test_live_tickets_drops_interleaved_markers() {
        let entries = vec![
            entry("dm1", 100, true),
            entry("v1", 200, false),
            entry("dm2", 300, true),
            entry("v2", 400, false),
            entry("dm3", 500, true),
        ];

        let live: Vec<&str> = live_tickets(&entries)
            .map(|e| e.version.as_str())
            .collect();
        assert_eq!(live, ["v1", "v2"]);
    }

    #[test]
    fn test_live_tickets_is_idempotent() {
        let entries = vec![
            entry("v1", 100, false),
            entry("dm1", 200, true),
            entry("v2", 300, false),
        ];

        let once: Vec<VersionEntry> = live_tickets(&entries).cloned().collect();
        let twice: Vec<VersionEntry> = live_tickets(&once).cloned().collect();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_live_tickets_on_empty_input() {
        let entries: Vec<VersionEntry> = vec![];
        assert_eq!(live_tickets(&entries).count(), 0);
    }

    #[tokio::test]
    async fn test_ordered_versions_empty_history() {
        let store = MemoryStore::new();
        let entries = ordered_versions(&store, "absent").await.expect("fetch");
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_ordered_versions_excludes_sibling_keys() {
        let store = MemoryStore::new();
        store
            .put_version("my_amazing_lock", Bytes::new())
            .await
            .unwrap();
        store
            .put_version("my_amazing_lock_2", Bytes::new())
            .await
            .unwrap();

        let entries = ordered_versions(&store, "my_amazing_lock")
            .await
            .expect("fetch");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key, "my_amazing_lock");
    }

    #[tokio::test]
    async fn test_ordered_versions_includes_markers() {
        let store = MemoryStore::new();
        let v1 = store
            .put_version("my_amazing_lock", Bytes::new())
            .await
            .unwrap();
        store
            .put_version("my_amazing_lock", Bytes::new())
            .await
            .unwrap();
        store.delete_version("my_amazing_lock", &v1).await.unwrap();

        let entries = ordered_versions(&store, "my_amazing_lock")
            .await
            .expect("fetch");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries.iter().filter(|e| e.is_delete_marker).count(), 1);
        assert_eq!(live_tickets(&entries).count(), 1);
    }

    #[tokio::test]
    async fn test_versioning_enabled_check() {
        assert!(versioning_enabled(&MemoryStore::new()).await.unwrap());
        assert!(
            !versioning_enabled(&MemoryStore::with_versioning(VersioningStatus::Suspended))
                .await
                .unwrap()
        );
        assert!(
            !versioning_enabled(&MemoryStore::with_versioning(VersioningStatus::Unversioned))
                .await
                .unwrap()
        );
    }
}
