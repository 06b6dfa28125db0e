// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Ordered key-value engine abstraction for the sampling store.
//
// The sampling store only needs a small slice of an embedded engine: begin a
// read or read-write transaction, get/set/delete by key, iterate a key range
// in ascending or descending order, and commit. The `StorageBackend` trait
// captures exactly that, one transaction per call, so the store can run on
// redb in production and on a `BTreeMap` in tests.
//
// # Modules
//
// - [`backend`] -- The `StorageBackend` trait, `ScanOrder` and range helpers.
// - [`error`] -- The `StorageError` enum covering all backend failure modes.
// - [`memory`] -- An in-memory `BTreeMap`-based backend for testing and
//   ephemeral workloads.
// - [`metrics`] -- A transparent wrapper that accounts writes and scans per
//   key prefix.
// - `redb_backend` -- Persistent redb backend (feature `redb-backend`).
//
// # Example
//
// ```rust
// use std::ops::Bound;
// use samplestore_kv::{InMemoryBackend, MetricsBackend, ScanOrder, StorageBackend};
//
// # tokio_test::block_on(async {
// let metered = MetricsBackend::new(InMemoryBackend::new());
// metered.put(b"\x09a", b"older").await.unwrap();
// metered.put(b"\x09b", b"newer").await.unwrap();
//
// let latest = metered
//     .scan_range(Bound::Included(vec![0x09]), Bound::Unbounded, ScanOrder::Descending, 1)
//     .await
//     .unwrap();
// assert_eq!(latest[0].1, b"newer".to_vec());
// assert_eq!(metered.stats().await.prefix(0x09).scans, 1);
// # });
// ```

pub mod backend;
pub mod error;
pub mod memory;
pub mod metrics;

#[cfg(feature = "redb-backend")]
pub mod redb_backend;

pub use backend::{prefix_upper_bound, KeyValue, ScanOrder, StorageBackend};
pub use error::{hex_key, StorageError};
pub use memory::InMemoryBackend;
pub use metrics::{BackendStats, MetricsBackend, PrefixStats};

#[cfg(feature = "redb-backend")]
pub use redb_backend::RedbBackend;
