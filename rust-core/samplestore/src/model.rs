// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Records persisted by the sampling store.
//
// Maps use `BTreeMap` so a serialized value is byte-for-byte stable for the
// same logical content, which keeps stored data diffable.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sampling probability in [0, 1] per service, per operation.
pub type ServiceOperationProbabilities = BTreeMap<String, BTreeMap<String, f64>>;

/// Observed or target queries-per-second per service, per operation.
pub type ServiceOperationQPS = BTreeMap<String, BTreeMap<String, f64>>;

/// Span volume for one (service, operation) pair over a measurement interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Throughput {
    pub service: String,
    pub operation: String,
    /// Number of spans observed in the interval.
    pub count: u64,
    /// Sampling probabilities that were in effect while the spans were
    /// observed, as reported by the clients (stringified, e.g. `"0.001"`).
    pub probabilities: BTreeSet<String>,
}

impl Throughput {
    /// A zero-count observation for `service`/`operation`.
    pub fn new(service: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            operation: operation.into(),
            count: 0,
            probabilities: BTreeSet::new(),
        }
    }

    pub fn with_count(mut self, count: u64) -> Self {
        self.count = count;
        self
    }

    pub fn with_probabilities<I, S>(mut self, probabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.probabilities = probabilities.into_iter().map(Into::into).collect();
        self
    }
}

/// One host's probabilities and QPS captured at the same instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProbabilitiesAndQPS {
    pub hostname: String,
    pub probabilities: ServiceOperationProbabilities,
    pub qps: ServiceOperationQPS,
}

impl ProbabilitiesAndQPS {
    pub fn new(
        hostname: impl Into<String>,
        probabilities: ServiceOperationProbabilities,
        qps: ServiceOperationQPS,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            probabilities,
            qps,
        }
    }
}

/// A stored throughput batch together with the time it was inserted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThroughputBatch {
    /// Insertion timestamp recovered from the batch's key.
    pub inserted_at: DateTime<Utc>,
    pub throughput: Vec<Throughput>,
}

/// Build a two-level service/operation map from flat triples.
///
/// Later triples for the same pair overwrite earlier ones.
pub fn service_operation_map<I, S, O>(entries: I) -> BTreeMap<String, BTreeMap<String, f64>>
where
    I: IntoIterator<Item = (S, O, f64)>,
    S: Into<String>,
    O: Into<String>,
{
    let mut map: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();
    for (service, operation, value) in entries {
        map.entry(service.into()).or_default().insert(operation.into(), value);
    }
    map
}
