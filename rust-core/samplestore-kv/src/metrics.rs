// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Traffic accounting for storage backends.
//
// Wraps any `StorageBackend` and attributes writes and scans to the leading
// key byte they touch. The sampling keyspace is partitioned by that byte
// (one byte per record collection), so a collector can tell throughput
// traffic from snapshot traffic and see how often a "latest" lookup found
// nothing. Point reads, deletes and flushes pass through uncounted.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::backend::{KeyValue, ScanOrder, StorageBackend};
use crate::error::StorageError;

/// Counters for one leading key byte.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefixStats {
    /// Accepted writes.
    pub writes: u64,
    /// Conditional writes rejected because the key already existed.
    pub conflicts: u64,
    /// Value bytes of accepted writes.
    pub bytes_written: u64,
    /// Completed range scans.
    pub scans: u64,
    /// Range scans that matched no entry.
    pub empty_scans: u64,
    /// Entries returned by range scans.
    pub entries_read: u64,
    /// Key and value bytes returned by range scans.
    pub bytes_read: u64,
}

/// Snapshot of the counters held by a [`MetricsBackend`].
#[derive(Debug, Clone, Default)]
pub struct BackendStats {
    /// Traffic per leading key byte.
    pub by_prefix: BTreeMap<u8, PrefixStats>,
    /// Scans whose lower bound carries no leading byte (whole-keyspace scans).
    pub unscoped: PrefixStats,
    /// Calls that returned an error, of any kind.
    pub errors: u64,
    pub write_latency_sum_ms: f64,
    pub scan_latency_sum_ms: f64,
}

impl BackendStats {
    /// Counters for `prefix`, zeroed if it saw no traffic.
    pub fn prefix(&self, prefix: u8) -> PrefixStats {
        self.by_prefix.get(&prefix).cloned().unwrap_or_default()
    }

    pub fn writes(&self) -> u64 {
        self.all().map(|p| p.writes).sum()
    }

    pub fn conflicts(&self) -> u64 {
        self.all().map(|p| p.conflicts).sum()
    }

    pub fn scans(&self) -> u64 {
        self.all().map(|p| p.scans).sum()
    }

    fn all(&self) -> impl Iterator<Item = &PrefixStats> {
        self.by_prefix.values().chain(std::iter::once(&self.unscoped))
    }

    fn slot(&mut self, leading: Option<u8>) -> &mut PrefixStats {
        match leading {
            Some(byte) => self.by_prefix.entry(byte).or_default(),
            None => &mut self.unscoped,
        }
    }
}

fn leading_byte(bound: &Bound<Vec<u8>>) -> Option<u8> {
    match bound {
        Bound::Included(k) | Bound::Excluded(k) => k.first().copied(),
        Bound::Unbounded => None,
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// A backend wrapper that accounts writes and scans per key prefix.
///
/// ```rust
/// use std::ops::Bound;
/// use samplestore_kv::{InMemoryBackend, MetricsBackend, ScanOrder, StorageBackend};
///
/// # tokio_test::block_on(async {
/// let metered = MetricsBackend::new(InMemoryBackend::new());
/// metered.put_if_absent(&[0x08, 1], b"batch").await.unwrap();
///
/// let latest = metered
///     .scan_range(Bound::Included(vec![0x09]), Bound::Excluded(vec![0x0a]), ScanOrder::Descending, 1)
///     .await
///     .unwrap();
/// assert!(latest.is_empty());
///
/// let stats = metered.stats().await;
/// assert_eq!(stats.prefix(0x08).writes, 1);
/// assert_eq!(stats.prefix(0x09).empty_scans, 1);
/// # });
/// ```
pub struct MetricsBackend<B: StorageBackend> {
    inner: B,
    stats: Arc<RwLock<BackendStats>>,
}

impl<B: StorageBackend> MetricsBackend<B> {
    pub fn new(inner: B) -> Self {
        Self {
            inner,
            stats: Arc::new(RwLock::new(BackendStats::default())),
        }
    }

    pub async fn stats(&self) -> BackendStats {
        self.stats.read().await.clone()
    }

    /// Zero every counter; stored data is untouched.
    pub async fn reset_stats(&self) {
        *self.stats.write().await = BackendStats::default();
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }

    /// Account one write of `bytes` under `key`; `accepted` is `None` on error.
    async fn record_write(&self, key: &[u8], bytes: usize, accepted: Option<bool>, started: Instant) {
        let mut s = self.stats.write().await;
        s.write_latency_sum_ms += elapsed_ms(started);
        let Some(accepted) = accepted else {
            s.errors += 1;
            return;
        };
        let slot = s.slot(key.first().copied());
        if accepted {
            slot.writes += 1;
            slot.bytes_written += bytes as u64;
        } else {
            slot.conflicts += 1;
        }
    }
}

#[async_trait]
impl<B: StorageBackend> StorageBackend for MetricsBackend<B> {
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        let started = Instant::now();
        let result = self.inner.put(key, value).await;
        self.record_write(key, value.len(), result.as_ref().ok().map(|_| true), started)
            .await;
        result
    }

    async fn put_if_absent(&self, key: &[u8], value: &[u8]) -> Result<bool, StorageError> {
        let started = Instant::now();
        let result = self.inner.put_if_absent(key, value).await;
        self.record_write(key, value.len(), result.as_ref().ok().copied(), started)
            .await;
        result
    }

    async fn delete(&self, key: &[u8]) -> Result<bool, StorageError> {
        self.inner.delete(key).await
    }

    async fn exists(&self, key: &[u8]) -> Result<bool, StorageError> {
        self.inner.exists(key).await
    }

    async fn scan_range(
        &self,
        start: Bound<Vec<u8>>,
        end: Bound<Vec<u8>>,
        order: ScanOrder,
        limit: usize,
    ) -> Result<Vec<KeyValue>, StorageError> {
        let leading = leading_byte(&start);
        let started = Instant::now();
        let result = self.inner.scan_range(start, end, order, limit).await;

        let mut s = self.stats.write().await;
        s.scan_latency_sum_ms += elapsed_ms(started);
        match &result {
            Ok(entries) => {
                let slot = s.slot(leading);
                slot.scans += 1;
                if entries.is_empty() {
                    slot.empty_scans += 1;
                }
                slot.entries_read += entries.len() as u64;
                slot.bytes_read += entries.iter().map(|(k, v)| (k.len() + v.len()) as u64).sum::<u64>();
            }
            Err(_) => s.errors += 1,
        }
        drop(s);

        result
    }

    async fn batch_put(&self, entries: &[(&[u8], &[u8])]) -> Result<(), StorageError> {
        let started = Instant::now();
        let result = self.inner.batch_put(entries).await;

        let mut s = self.stats.write().await;
        s.write_latency_sum_ms += elapsed_ms(started);
        if result.is_err() {
            s.errors += 1;
        } else {
            for (key, value) in entries {
                let slot = s.slot(key.first().copied());
                slot.writes += 1;
                slot.bytes_written += value.len() as u64;
            }
        }
        drop(s);

        result
    }

    async fn flush(&self) -> Result<(), StorageError> {
        self.inner.flush().await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn approximate_size(&self) -> Result<Option<u64>, StorageError> {
        self.inner.approximate_size().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryBackend;

    /// Refuses every write and scan with an I/O error.
    struct BrokenDisk;

    #[async_trait]
    impl StorageBackend for BrokenDisk {
        async fn get(&self, _key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
            Ok(None)
        }
        async fn put(&self, _key: &[u8], _value: &[u8]) -> Result<(), StorageError> {
            Err(std::io::Error::other("disk full").into())
        }
        async fn put_if_absent(&self, _key: &[u8], _value: &[u8]) -> Result<bool, StorageError> {
            Err(std::io::Error::other("disk full").into())
        }
        async fn delete(&self, _key: &[u8]) -> Result<bool, StorageError> {
            Ok(false)
        }
        async fn exists(&self, _key: &[u8]) -> Result<bool, StorageError> {
            Ok(false)
        }
        async fn scan_range(
            &self,
            _start: Bound<Vec<u8>>,
            _end: Bound<Vec<u8>>,
            _order: ScanOrder,
            _limit: usize,
        ) -> Result<Vec<KeyValue>, StorageError> {
            Err(std::io::Error::other("read failed").into())
        }
        async fn batch_put(&self, _entries: &[(&[u8], &[u8])]) -> Result<(), StorageError> {
            Err(std::io::Error::other("disk full").into())
        }
        async fn flush(&self) -> Result<(), StorageError> {
            Ok(())
        }
        fn name(&self) -> &str {
            "broken"
        }
        async fn approximate_size(&self) -> Result<Option<u64>, StorageError> {
            Ok(None)
        }
    }

    fn collection(prefix: u8) -> (Bound<Vec<u8>>, Bound<Vec<u8>>) {
        (Bound::Included(vec![prefix]), Bound::Excluded(vec![prefix + 1]))
    }

    #[tokio::test]
    async fn test_writes_are_attributed_to_their_prefix() {
        let metered = MetricsBackend::new(InMemoryBackend::new());

        metered.put_if_absent(&[0x08, 1], b"batch-1").await.unwrap();
        metered.put_if_absent(&[0x08, 2], b"batch-2").await.unwrap();
        metered.put_if_absent(&[0x09, 1], b"snap").await.unwrap();

        let stats = metered.stats().await;
        assert_eq!(stats.prefix(0x08).writes, 2);
        assert_eq!(stats.prefix(0x08).bytes_written, 14);
        assert_eq!(stats.prefix(0x09).writes, 1);
        assert_eq!(stats.writes(), 3);
        assert_eq!(stats.prefix(0x0a), PrefixStats::default());
    }

    #[tokio::test]
    async fn test_conflicts_count_without_bytes() {
        let metered = MetricsBackend::new(InMemoryBackend::new());

        assert!(metered.put_if_absent(&[0x09, 7], b"abc").await.unwrap());
        assert!(!metered.put_if_absent(&[0x09, 7], b"zzzz").await.unwrap());

        let snap = metered.stats().await.prefix(0x09);
        assert_eq!(snap.writes, 1);
        assert_eq!(snap.conflicts, 1);
        assert_eq!(snap.bytes_written, 3);
    }

    #[tokio::test]
    async fn test_latest_lookup_hits_and_misses() {
        let metered = MetricsBackend::new(InMemoryBackend::new());
        let (start, end) = collection(0x09);

        let miss = metered
            .scan_range(start.clone(), end.clone(), ScanOrder::Descending, 1)
            .await
            .unwrap();
        assert!(miss.is_empty());

        metered.put_if_absent(&[0x09, 1], b"old").await.unwrap();
        metered.put_if_absent(&[0x09, 2], b"new").await.unwrap();
        let hit = metered
            .scan_range(start, end, ScanOrder::Descending, 1)
            .await
            .unwrap();
        assert_eq!(hit, vec![(vec![0x09, 2], b"new".to_vec())]);

        let snap = metered.stats().await.prefix(0x09);
        assert_eq!(snap.scans, 2);
        assert_eq!(snap.empty_scans, 1);
        assert_eq!(snap.entries_read, 1);
        assert_eq!(snap.bytes_read, 5);
    }

    #[tokio::test]
    async fn test_window_scan_counts_entries() {
        let metered = MetricsBackend::new(InMemoryBackend::new());
        metered
            .batch_put(&[
                (&[0x08u8, 1][..], &b"a"[..]),
                (&[0x08u8, 2][..], &b"b"[..]),
                (&[0x09u8, 1][..], &b"p"[..]),
            ])
            .await
            .unwrap();

        let (start, end) = collection(0x08);
        let window = metered
            .scan_range(start, end, ScanOrder::Ascending, usize::MAX)
            .await
            .unwrap();
        assert_eq!(window.len(), 2);

        let stats = metered.stats().await;
        assert_eq!(stats.prefix(0x08).writes, 2);
        assert_eq!(stats.prefix(0x08).entries_read, 2);
        assert_eq!(stats.prefix(0x09).scans, 0);
        assert_eq!(stats.scans(), 1);
    }

    #[tokio::test]
    async fn test_unbounded_scan_is_unscoped() {
        let metered = MetricsBackend::new(InMemoryBackend::new());
        metered
            .scan_range(Bound::Unbounded, Bound::Unbounded, ScanOrder::Ascending, 10)
            .await
            .unwrap();

        let stats = metered.stats().await;
        assert_eq!(stats.unscoped.scans, 1);
        assert_eq!(stats.unscoped.empty_scans, 1);
        assert!(stats.by_prefix.is_empty());
    }

    #[tokio::test]
    async fn test_errors_are_counted_and_passed_through() {
        let metered = MetricsBackend::new(BrokenDisk);

        let err = metered.put_if_absent(&[0x08, 1], b"x").await.unwrap_err();
        assert!(matches!(err, StorageError::Io(_)));
        let (start, end) = collection(0x09);
        let err = metered
            .scan_range(start, end, ScanOrder::Descending, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Io(_)));

        let stats = metered.stats().await;
        assert_eq!(stats.errors, 2);
        assert_eq!(stats.writes(), 0);
        assert_eq!(stats.scans(), 0);
    }

    #[tokio::test]
    async fn test_reset_keeps_data() {
        let metered = MetricsBackend::new(InMemoryBackend::new());
        metered.put(&[0x08, 1], b"1").await.unwrap();
        assert_eq!(metered.stats().await.writes(), 1);

        metered.reset_stats().await;

        assert_eq!(metered.stats().await.writes(), 0);
        assert_eq!(metered.inner().len().await, 1);
        assert_eq!(metered.name(), "in-memory");
    }
}
