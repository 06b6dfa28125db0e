// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Ordered key-value engine contract for the sampling store.
//
// Defines the `StorageBackend` trait that all engines must satisfy. Every
// method maps to exactly one engine transaction: reads run in a read-only
// transaction (a consistent point-in-time view for the whole call), writes
// run in a read-write transaction that is committed before the call returns.
// Backends are expected to be thread-safe (`Send + Sync`) and asynchronous.

use std::ops::Bound;

use async_trait::async_trait;

use crate::error::StorageError;

/// A (key, value) pair returned by scans.
pub type KeyValue = (Vec<u8>, Vec<u8>);

/// Iteration order for [`StorageBackend::scan_range`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOrder {
    /// Smallest key first.
    Ascending,
    /// Greatest key first.
    Descending,
}

/// A pluggable ordered key-value storage backend.
///
/// All keys and values are opaque byte slices compared lexicographically.
/// Implementations must be safe to share across threads and tokio tasks.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Retrieve the value associated with `key`.
    ///
    /// Returns `Ok(None)` if the key does not exist, rather than an error.
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError>;

    /// Store a key-value pair, overwriting any previous value for `key`.
    async fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StorageError>;

    /// Store a key-value pair only if `key` is not already present.
    ///
    /// The existence check and the write happen in the same transaction.
    /// Returns `Ok(false)` without modifying the store if the key exists.
    async fn put_if_absent(&self, key: &[u8], value: &[u8]) -> Result<bool, StorageError>;

    /// Delete the value associated with `key`.
    ///
    /// Returns `Ok(true)` if the key existed and was removed, `Ok(false)` if
    /// the key was not present.
    async fn delete(&self, key: &[u8]) -> Result<bool, StorageError>;

    /// Check whether `key` exists in the store without retrieving its value.
    async fn exists(&self, key: &[u8]) -> Result<bool, StorageError>;

    /// Iterate the keys between `start` and `end` in the given order,
    /// returning up to `limit` (key, value) pairs.
    ///
    /// An empty or inverted range yields an empty result, never an error.
    async fn scan_range(
        &self,
        start: Bound<Vec<u8>>,
        end: Bound<Vec<u8>>,
        order: ScanOrder,
        limit: usize,
    ) -> Result<Vec<KeyValue>, StorageError>;

    /// Scan all keys that start with `prefix`, returning up to `limit`
    /// (key, value) pairs in lexicographic order.
    async fn scan_prefix(&self, prefix: &[u8], limit: usize) -> Result<Vec<KeyValue>, StorageError> {
        let end = match prefix_upper_bound(prefix) {
            Some(upper) => Bound::Excluded(upper),
            None => Bound::Unbounded,
        };
        self.scan_range(Bound::Included(prefix.to_vec()), end, ScanOrder::Ascending, limit)
            .await
    }

    /// Write multiple key-value pairs atomically.
    ///
    /// Either all entries are written or none are.
    async fn batch_put(&self, entries: &[(&[u8], &[u8])]) -> Result<(), StorageError>;

    /// Flush any buffered writes to durable storage.
    ///
    /// For in-memory backends this is a no-op.
    async fn flush(&self) -> Result<(), StorageError>;

    /// A human-readable name for this backend, used in logging and metrics.
    fn name(&self) -> &str;

    /// Return the approximate total size of stored data in bytes, if known.
    async fn approximate_size(&self) -> Result<Option<u64>, StorageError>;
}

#[async_trait]
impl<B: StorageBackend + ?Sized> StorageBackend for Box<B> {
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        (**self).get(key).await
    }

    async fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        (**self).put(key, value).await
    }

    async fn put_if_absent(&self, key: &[u8], value: &[u8]) -> Result<bool, StorageError> {
        (**self).put_if_absent(key, value).await
    }

    async fn delete(&self, key: &[u8]) -> Result<bool, StorageError> {
        (**self).delete(key).await
    }

    async fn exists(&self, key: &[u8]) -> Result<bool, StorageError> {
        (**self).exists(key).await
    }

    async fn scan_range(
        &self,
        start: Bound<Vec<u8>>,
        end: Bound<Vec<u8>>,
        order: ScanOrder,
        limit: usize,
    ) -> Result<Vec<KeyValue>, StorageError> {
        (**self).scan_range(start, end, order, limit).await
    }

    async fn scan_prefix(&self, prefix: &[u8], limit: usize) -> Result<Vec<KeyValue>, StorageError> {
        (**self).scan_prefix(prefix, limit).await
    }

    async fn batch_put(&self, entries: &[(&[u8], &[u8])]) -> Result<(), StorageError> {
        (**self).batch_put(entries).await
    }

    async fn flush(&self) -> Result<(), StorageError> {
        (**self).flush().await
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    async fn approximate_size(&self) -> Result<Option<u64>, StorageError> {
        (**self).approximate_size().await
    }
}

/// Compute the exclusive upper bound for a prefix scan.
///
/// Given a prefix like `[0x61, 0x62]` ("ab"), returns the next key
/// after all keys starting with that prefix: `[0x61, 0x63]` ("ac").
/// Returns `None` if the prefix is empty or all 0xFF bytes (no upper bound).
pub fn prefix_upper_bound(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut upper = prefix.to_vec();
    while let Some(last) = upper.last_mut() {
        if *last < 0xFF {
            *last += 1;
            return Some(upper);
        }
        upper.pop();
    }
    None
}

/// Return true if no key can satisfy both bounds.
///
/// Ordered maps panic (`BTreeMap::range`) or misbehave when handed an
/// inverted range, so backends check this before iterating.
pub fn is_empty_range(start: &Bound<Vec<u8>>, end: &Bound<Vec<u8>>) -> bool {
    match (start, end) {
        (Bound::Included(s), Bound::Included(e)) => s > e,
        (Bound::Included(s), Bound::Excluded(e))
        | (Bound::Excluded(s), Bound::Included(e))
        | (Bound::Excluded(s), Bound::Excluded(e)) => s >= e,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_upper_bound() {
        assert_eq!(prefix_upper_bound(b"abc"), Some(b"abd".to_vec()));

        // Trailing 0xFF byte
        assert_eq!(prefix_upper_bound(b"ab\xff"), Some(b"ac".to_vec()));

        // All 0xFF bytes — no upper bound
        assert_eq!(prefix_upper_bound(b"\xff\xff"), None);

        assert_eq!(prefix_upper_bound(b""), None);
        assert_eq!(prefix_upper_bound(&[0x08]), Some(vec![0x09]));
    }

    #[test]
    fn test_is_empty_range() {
        let a = b"a".to_vec();
        let b = b"b".to_vec();

        assert!(!is_empty_range(&Bound::Included(a.clone()), &Bound::Included(a.clone())));
        assert!(is_empty_range(&Bound::Included(a.clone()), &Bound::Excluded(a.clone())));
        assert!(is_empty_range(&Bound::Excluded(a.clone()), &Bound::Excluded(a.clone())));
        assert!(is_empty_range(&Bound::Included(b.clone()), &Bound::Included(a.clone())));
        assert!(!is_empty_range(&Bound::Included(a.clone()), &Bound::Excluded(b.clone())));
        assert!(!is_empty_range(&Bound::Unbounded, &Bound::Included(a)));
        assert!(!is_empty_range(&Bound::Excluded(b), &Bound::Unbounded));
    }
}
