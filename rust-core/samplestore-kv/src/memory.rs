// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory ordered storage backend.
//
// Uses a `BTreeMap` wrapped in a tokio `RwLock`. A read holds the read guard
// for its whole iteration, which gives every scan the same point-in-time view
// a read-only engine transaction would. Intended for tests and ephemeral
// collectors that do not need sampling state to survive a restart.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::backend::{is_empty_range, KeyValue, ScanOrder, StorageBackend};
use crate::error::StorageError;

/// An in-memory storage backend backed by a sorted `BTreeMap`.
///
/// All data lives in process memory and is lost on drop. Clones share the
/// same map.
///
/// # Example
///
/// ```rust
/// use samplestore_kv::memory::InMemoryBackend;
/// use samplestore_kv::backend::StorageBackend;
///
/// # tokio_test::block_on(async {
/// let store = InMemoryBackend::new();
/// store.put(b"hello", b"world").await.unwrap();
/// let val = store.get(b"hello").await.unwrap();
/// assert_eq!(val, Some(b"world".to_vec()));
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct InMemoryBackend {
    data: Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>,
}

impl InMemoryBackend {
    /// Create a new, empty in-memory backend.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Return the number of keys currently stored.
    pub async fn len(&self) -> usize {
        self.data.read().await.len()
    }

    /// Return true if the store contains no keys.
    pub async fn is_empty(&self) -> bool {
        self.data.read().await.is_empty()
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageBackend for InMemoryBackend {
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        let map = self.data.read().await;
        Ok(map.get(key).cloned())
    }

    async fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        let mut map = self.data.write().await;
        map.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    async fn put_if_absent(&self, key: &[u8], value: &[u8]) -> Result<bool, StorageError> {
        let mut map = self.data.write().await;
        if map.contains_key(key) {
            return Ok(false);
        }
        map.insert(key.to_vec(), value.to_vec());
        Ok(true)
    }

    async fn delete(&self, key: &[u8]) -> Result<bool, StorageError> {
        let mut map = self.data.write().await;
        Ok(map.remove(key).is_some())
    }

    async fn exists(&self, key: &[u8]) -> Result<bool, StorageError> {
        let map = self.data.read().await;
        Ok(map.contains_key(key))
    }

    async fn scan_range(
        &self,
        start: Bound<Vec<u8>>,
        end: Bound<Vec<u8>>,
        order: ScanOrder,
        limit: usize,
    ) -> Result<Vec<KeyValue>, StorageError> {
        if limit == 0 || is_empty_range(&start, &end) {
            return Ok(Vec::new());
        }

        let map = self.data.read().await;
        let range = map.range((start, end));
        let pairs = |(k, v): (&Vec<u8>, &Vec<u8>)| (k.clone(), v.clone());
        let results = match order {
            ScanOrder::Ascending => range.take(limit).map(pairs).collect(),
            ScanOrder::Descending => range.rev().take(limit).map(pairs).collect(),
        };
        Ok(results)
    }

    async fn batch_put(&self, entries: &[(&[u8], &[u8])]) -> Result<(), StorageError> {
        let mut map = self.data.write().await;
        for (key, value) in entries {
            map.insert(key.to_vec(), value.to_vec());
        }
        Ok(())
    }

    async fn flush(&self) -> Result<(), StorageError> {
        // All writes are immediately visible.
        Ok(())
    }

    fn name(&self) -> &str {
        "in-memory"
    }

    async fn approximate_size(&self) -> Result<Option<u64>, StorageError> {
        let map = self.data.read().await;
        let size: u64 = map.iter().map(|(k, v)| (k.len() + v.len()) as u64).sum();
        Ok(Some(size))
    }
}
