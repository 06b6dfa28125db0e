// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// redb-backed persistent storage backend.
//
// Uses redb (pure Rust, B-tree, ACID, single-file database) to provide
// durable ordered key-value storage for sampling state.
//
// # Design
//
// - Single redb `Database` file containing one table holding the whole
//   flat keyspace.
// - Read transactions for all read operations (concurrent, MVCC snapshot).
// - Write transactions for put/delete/batch (serialised by redb internally);
//   commits are durable when the call returns.
// - `scan_range` iterates redb's double-ended `range()` forwards or in
//   reverse inside a single read transaction.
// - All blocking engine work runs on `tokio::task::spawn_blocking`.

use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use redb::{AccessGuard, Database, ReadableDatabase, ReadableTable, TableDefinition, TableError};
use tracing::debug;

use crate::backend::{is_empty_range, KeyValue, ScanOrder, StorageBackend};
use crate::error::StorageError;

/// The single table holding the flat keyspace.
const MAIN_TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("samples");

/// A persistent storage backend powered by redb.
///
/// Thread-safe: `Database` is `Send + Sync` and handles internal locking.
///
/// # Example
///
/// ```rust,no_run
/// use samplestore_kv::redb_backend::RedbBackend;
/// use samplestore_kv::backend::StorageBackend;
///
/// # tokio_test::block_on(async {
/// let store = RedbBackend::open("/tmp/samplestore-test.redb").unwrap();
/// store.put(b"hello", b"world").await.unwrap();
/// let val = store.get(b"hello").await.unwrap();
/// assert_eq!(val, Some(b"world".to_vec()));
/// # });
/// ```
pub struct RedbBackend {
    db: Arc<Database>,
    /// Path to the database file (for diagnostics and approximate_size).
    path: PathBuf,
}

impl RedbBackend {
    /// Open or create a redb database at the given path.
    ///
    /// Creates the file and parent directories if they don't exist. The
    /// table is created on first write.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(StorageError::Io)?;
        }

        let db = Database::create(&path)
            .map_err(|e| engine_err(&format!("open {}", path.display()), e))?;

        debug!(path = %path.display(), "opened redb backend");

        Ok(Self {
            db: Arc::new(db),
            path,
        })
    }

    /// Return the filesystem path of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run a blocking closure against the database on the blocking pool.
    async fn blocking<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> Result<T, StorageError> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| StorageError::BackendUnavailable(format!("task join: {e}")))?
    }
}

impl std::fmt::Debug for RedbBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbBackend").field("path", &self.path).finish()
    }
}

/// Map an engine error onto the backend contract, keeping the I/O kind and
/// engine-detected corruption apart from every other failure.
fn engine_err(context: &str, e: impl Into<redb::Error>) -> StorageError {
    match e.into() {
        redb::Error::Io(io) => {
            StorageError::Io(std::io::Error::new(io.kind(), format!("{context}: {io}")))
        }
        redb::Error::Corrupted(msg) => StorageError::CorruptedData(format!("{context}: {msg}")),
        other => StorageError::BackendUnavailable(format!("{context}: {other}")),
    }
}

fn borrow_bound(bound: &Bound<Vec<u8>>) -> Bound<&[u8]> {
    match bound {
        Bound::Included(k) => Bound::Included(k.as_slice()),
        Bound::Excluded(k) => Bound::Excluded(k.as_slice()),
        Bound::Unbounded => Bound::Unbounded,
    }
}

type RangeEntry<'a> = Result<(AccessGuard<'a, &'static [u8]>, AccessGuard<'a, &'static [u8]>), redb::StorageError>;

/// Copy up to `limit` entries out of a redb range iterator.
fn collect_entries<'a>(
    entries: impl Iterator<Item = RangeEntry<'a>>,
    limit: usize,
) -> Result<Vec<KeyValue>, StorageError> {
    let mut results = Vec::new();
    for entry in entries.take(limit) {
        let (k, v) = entry.map_err(|e| engine_err("scan entry", e))?;
        results.push((k.value().to_vec(), v.value().to_vec()));
    }
    Ok(results)
}

#[async_trait]
impl StorageBackend for RedbBackend {
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        let key = key.to_vec();

        self.blocking(move |db| {
            let txn = db.begin_read().map_err(|e| engine_err("read txn", e))?;
            let table = match txn.open_table(MAIN_TABLE) {
                Ok(t) => t,
                // Nothing has been written yet.
                Err(TableError::TableDoesNotExist(_)) => return Ok(None),
                Err(e) => return Err(engine_err("open table", e)),
            };

            match table.get(key.as_slice()) {
                Ok(Some(value)) => Ok(Some(value.value().to_vec())),
                Ok(None) => Ok(None),
                Err(e) => Err(engine_err("get", e)),
            }
        })
        .await
    }

    async fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        let key = key.to_vec();
        let value = value.to_vec();

        self.blocking(move |db| {
            let txn = db.begin_write().map_err(|e| engine_err("write txn", e))?;
            {
                let mut table = txn.open_table(MAIN_TABLE).map_err(|e| engine_err("open table", e))?;
                table
                    .insert(key.as_slice(), value.as_slice())
                    .map_err(|e| engine_err("insert", e))?;
            }
            txn.commit()
                .map_err(|e| engine_err("commit", e))?;
            Ok(())
        })
        .await
    }

    async fn put_if_absent(&self, key: &[u8], value: &[u8]) -> Result<bool, StorageError> {
        let key = key.to_vec();
        let value = value.to_vec();

        self.blocking(move |db| {
            let txn = db.begin_write().map_err(|e| engine_err("write txn", e))?;
            let inserted = {
                let mut table = txn.open_table(MAIN_TABLE).map_err(|e| engine_err("open table", e))?;
                let present = table
                    .get(key.as_slice())
                    .map_err(|e| engine_err("get", e))?
                    .is_some();
                if !present {
                    table
                        .insert(key.as_slice(), value.as_slice())
                        .map_err(|e| engine_err("insert", e))?;
                }
                !present
            };
            if inserted {
                txn.commit()
                    .map_err(|e| engine_err("commit", e))?;
            } else {
                txn.abort()
                    .map_err(|e| engine_err("abort", e))?;
            }
            Ok(inserted)
        })
        .await
    }

    async fn delete(&self, key: &[u8]) -> Result<bool, StorageError> {
        let key = key.to_vec();

        self.blocking(move |db| {
            let txn = db.begin_write().map_err(|e| engine_err("write txn", e))?;
            let existed;
            {
                let mut table = txn.open_table(MAIN_TABLE).map_err(|e| engine_err("open table", e))?;
                existed = table
                    .remove(key.as_slice())
                    .map_err(|e| engine_err("remove", e))?
                    .is_some();
            }
            txn.commit()
                .map_err(|e| engine_err("commit", e))?;
            Ok(existed)
        })
        .await
    }

    async fn exists(&self, key: &[u8]) -> Result<bool, StorageError> {
        Ok(self.get(key).await?.is_some())
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

        self.blocking(move |db| {
            let txn = db.begin_read().map_err(|e| engine_err("read txn", e))?;
            let table = match txn.open_table(MAIN_TABLE) {
                Ok(t) => t,
                Err(TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
                Err(e) => return Err(engine_err("open table", e)),
            };

            let range = table
                .range::<&[u8]>((borrow_bound(&start), borrow_bound(&end)))
                .map_err(|e| engine_err("range scan", e))?;

            match order {
                ScanOrder::Ascending => collect_entries(range, limit),
                ScanOrder::Descending => collect_entries(range.rev(), limit),
            }
        })
        .await
    }

    async fn batch_put(&self, entries: &[(&[u8], &[u8])]) -> Result<(), StorageError> {
        let owned: Vec<KeyValue> = entries.iter().map(|(k, v)| (k.to_vec(), v.to_vec())).collect();

        self.blocking(move |db| {
            let txn = db.begin_write().map_err(|e| engine_err("write txn", e))?;
            {
                let mut table = txn.open_table(MAIN_TABLE).map_err(|e| engine_err("open table", e))?;
                for (k, v) in &owned {
                    table
                        .insert(k.as_slice(), v.as_slice())
                        .map_err(|e| engine_err("batch insert", e))?;
                }
            }
            txn.commit()
                .map_err(|e| engine_err("batch commit", e))?;
            Ok(())
        })
        .await
    }

    async fn flush(&self) -> Result<(), StorageError> {
        // Each write transaction is fsynced on commit.
        Ok(())
    }

    fn name(&self) -> &str {
        "redb"
    }

    async fn approximate_size(&self) -> Result<Option<u64>, StorageError> {
        let meta = tokio::fs::metadata(&self.path).await?;
        Ok(Some(meta.len()))
    }
}
