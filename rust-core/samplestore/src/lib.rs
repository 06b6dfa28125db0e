// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Sampling Store
//
// Durable storage for an adaptive-sampling subsystem: per service/operation
// throughput batches, fetched by time window, and per-host probability/QPS
// snapshots, of which the most recent one is read back on startup.
//
// Both record types share one ordered keyspace (see `keys`); values are
// self-describing text envelopes (see `codec`) that fail closed on any
// corruption.

pub mod clock;
pub mod codec;
pub mod config;
pub mod error;
pub mod keys;
pub mod model;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::{
    decode_probabilities_value, decode_throughput_value, encode_probabilities_value,
    encode_throughput_value, PayloadKind,
};
pub use config::{BackendKind, SamplingStoreConfig};
pub use error::{DecodeError, SamplingResult, SamplingStoreError};
pub use keys::{Namespace, SampleKey};
pub use model::{
    service_operation_map, ProbabilitiesAndQPS, ServiceOperationProbabilities, ServiceOperationQPS,
    Throughput, ThroughputBatch,
};
pub use store::SamplingStore;
