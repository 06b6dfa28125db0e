// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The sampling store: throughput batches and probability/QPS snapshots in one
// ordered keyspace.
//
// Every public operation is exactly one backend call, and every backend call
// is exactly one engine transaction. The store holds no locks of its own;
// its only shared mutable state lives in the `KeyGenerator` atomics.

use std::ops::Bound;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use samplestore_kv::{hex_key, ScanOrder, StorageBackend, StorageError};
use tracing::{debug, instrument};

use crate::clock::{Clock, SystemClock};
use crate::codec::{
    decode_probabilities_value, decode_throughput_value, encode_probabilities_value,
    encode_throughput_value,
};
use crate::config::DEFAULT_MAX_VALUE_BYTES;
use crate::error::{DecodeError, SamplingResult, SamplingStoreError};
use crate::keys::{window_end, window_start, KeyGenerator, Namespace, SampleKey};
use crate::model::{
    ProbabilitiesAndQPS, ServiceOperationProbabilities, ServiceOperationQPS, Throughput,
    ThroughputBatch,
};

/// Persists adaptive-sampling state on an ordered key-value backend.
///
/// # Example
///
/// ```rust
/// use chrono::{Duration, Utc};
/// use samplestore::{SamplingStore, Throughput};
/// use samplestore_kv::InMemoryBackend;
///
/// # tokio_test::block_on(async {
/// let store = SamplingStore::new(InMemoryBackend::new());
/// let start = Utc::now();
///
/// store
///     .insert_throughput(&[Throughput::new("my-svc", "op")])
///     .await
///     .unwrap();
///
/// let found = store.get_throughput(start, start + Duration::seconds(10)).await.unwrap();
/// assert_eq!(found, vec![Throughput::new("my-svc", "op")]);
///
/// assert_eq!(store.get_latest_probabilities().await.unwrap(), None);
/// # });
/// ```
#[derive(Debug)]
pub struct SamplingStore<B: StorageBackend> {
    backend: B,
    keys: KeyGenerator,
    clock: Arc<dyn Clock>,
    max_value_bytes: usize,
}

impl<B: StorageBackend> SamplingStore<B> {
    /// A store on `backend` using the system clock and a random writer id.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            keys: KeyGenerator::new(),
            clock: Arc::new(SystemClock),
            max_value_bytes: DEFAULT_MAX_VALUE_BYTES,
        }
    }

    /// Replace the time source used for key timestamps.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Use a fixed writer id, e.g. one derived from the host identity.
    pub fn with_writer_id(mut self, writer_id: u32) -> Self {
        self.keys = KeyGenerator::with_writer_id(writer_id);
        self
    }

    /// Reject encoded values larger than `max` bytes before writing.
    pub fn with_max_value_bytes(mut self, max: usize) -> Self {
        self.max_value_bytes = max;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn writer_id(&self) -> u32 {
        self.keys.writer_id()
    }

    /// Store one measurement cycle's throughput as a single atomic value.
    #[instrument(skip_all, fields(records = batch.len()))]
    pub async fn insert_throughput(&self, batch: &[Throughput]) -> SamplingResult<()> {
        if batch.is_empty() {
            return Err(SamplingStoreError::InvalidInput(
                "throughput batch is empty".to_string(),
            ));
        }

        let value = encode_throughput_value(batch)?;
        let key = self.write(Namespace::Throughput, &value).await?;
        debug!(
            inserted_at = %key.timestamp(),
            sequence = key.sequence,
            bytes = value.len(),
            "stored throughput batch"
        );
        Ok(())
    }

    /// All throughput records inserted between `start` and `end`, both
    /// inclusive, in insertion order.
    ///
    /// An inverted window (`start > end`) is empty rather than an error.
    pub async fn get_throughput(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> SamplingResult<Vec<Throughput>> {
        let batches = self.get_throughput_batches(start, end).await?;
        Ok(batches.into_iter().flat_map(|batch| batch.throughput).collect())
    }

    /// Like [`SamplingStore::get_throughput`], but keeps each stored batch
    /// separate together with its insertion time.
    #[instrument(skip(self))]
    pub async fn get_throughput_batches(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> SamplingResult<Vec<ThroughputBatch>> {
        if start > end {
            return Ok(Vec::new());
        }

        let entries = self
            .backend
            .scan_range(
                Bound::Included(window_start(Namespace::Throughput, start)),
                Bound::Included(window_end(Namespace::Throughput, end)),
                ScanOrder::Ascending,
                usize::MAX,
            )
            .await?;
        debug!(matched = entries.len(), "scanned throughput window");

        entries
            .into_iter()
            .map(|(raw_key, value)| {
                let key = decode_key(Namespace::Throughput, &raw_key)?;
                Ok(ThroughputBatch {
                    inserted_at: key.timestamp(),
                    throughput: decode_throughput_value(&value)?,
                })
            })
            .collect()
    }

    /// Record one host's probabilities and QPS as a new snapshot.
    ///
    /// Earlier snapshots, from this host or any other, are kept.
    #[instrument(skip(self, probabilities, qps))]
    pub async fn insert_probabilities_and_qps(
        &self,
        hostname: &str,
        probabilities: ServiceOperationProbabilities,
        qps: ServiceOperationQPS,
    ) -> SamplingResult<()> {
        let snapshot = ProbabilitiesAndQPS::new(hostname, probabilities, qps);
        let value = encode_probabilities_value(&snapshot)?;
        let key = self.write(Namespace::Probabilities, &value).await?;
        debug!(
            inserted_at = %key.timestamp(),
            services = snapshot.probabilities.len(),
            "stored probabilities snapshot"
        );
        Ok(())
    }

    /// Probabilities of the most recently inserted snapshot, from any host.
    ///
    /// Returns `Ok(None)` when no snapshot has ever been written, which
    /// callers typically answer by falling back to default probabilities.
    pub async fn get_latest_probabilities(
        &self,
    ) -> SamplingResult<Option<ServiceOperationProbabilities>> {
        let latest = self.get_latest_probabilities_and_qps().await?;
        Ok(latest.map(|snapshot| snapshot.probabilities))
    }

    /// The most recently inserted snapshot in full (hostname and QPS
    /// included).
    #[instrument(skip(self))]
    pub async fn get_latest_probabilities_and_qps(
        &self,
    ) -> SamplingResult<Option<ProbabilitiesAndQPS>> {
        let (start, end) = Namespace::Probabilities.bounds();
        let mut entries = self
            .backend
            .scan_range(start, end, ScanOrder::Descending, 1)
            .await?;

        let Some((raw_key, value)) = entries.pop() else {
            debug!("no probabilities snapshot stored");
            return Ok(None);
        };

        let key = decode_key(Namespace::Probabilities, &raw_key)?;
        let snapshot = decode_probabilities_value(&value)?;
        debug!(
            inserted_at = %key.timestamp(),
            hostname = %snapshot.hostname,
            "loaded latest probabilities snapshot"
        );
        Ok(Some(snapshot))
    }

    /// Write `value` under a fresh key; never overwrites an existing entry.
    async fn write(&self, namespace: Namespace, value: &[u8]) -> SamplingResult<SampleKey> {
        if value.len() > self.max_value_bytes {
            return Err(StorageError::ValueTooLarge {
                size: value.len(),
                max: self.max_value_bytes,
            }
            .into());
        }

        let key = self.keys.next_key(namespace, self.clock.now());
        let encoded = key.encode();
        if !self.backend.put_if_absent(&encoded, value).await? {
            return Err(StorageError::conflict(&encoded).into());
        }
        Ok(key)
    }
}

/// Decode a key read back from a scan of `namespace`.
fn decode_key(namespace: Namespace, raw: &[u8]) -> Result<SampleKey, DecodeError> {
    let key = SampleKey::decode(raw)?;
    if key.namespace != namespace {
        return Err(DecodeError::MalformedKey(format!(
            "{} found while scanning {namespace:?}",
            hex_key(raw)
        )));
    }
    Ok(key)
}
