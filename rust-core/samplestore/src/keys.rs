// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Key layout for the flat, lexicographically ordered sampling keyspace.
//
// Key format (17 bytes, all integers big-endian):
//   [1 byte:  namespace prefix]   -- 0x08 throughput, 0x09 probabilities
//   [8 bytes: timestamp]          -- i64 Unix nanoseconds, sign bit flipped
//   [4 bytes: writer id]          -- random per store instance
//   [4 bytes: sequence]           -- wrapping per store instance
//
// Flipping the sign bit maps i64 onto u64 monotonically, so byte order of the
// encoded key equals chronological order, pre-epoch instants included.

use std::ops::Bound;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};

use chrono::{DateTime, TimeZone, Utc};
use tracing::warn;

use crate::error::DecodeError;

/// Prefix byte of throughput batch keys.
pub const THROUGHPUT_KEY_PREFIX: u8 = 0x08;

/// Prefix byte of probability/QPS snapshot keys.
pub const PROBABILITIES_KEY_PREFIX: u8 = 0x09;

/// Length of a full key.
pub const KEY_LEN: usize = 1 + 8 + 4 + 4;

const SIGN_BIT: u64 = 1 << 63;

/// The two logical collections sharing the keyspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Namespace {
    Throughput,
    Probabilities,
}

impl Namespace {
    pub fn prefix(self) -> u8 {
        match self {
            Namespace::Throughput => THROUGHPUT_KEY_PREFIX,
            Namespace::Probabilities => PROBABILITIES_KEY_PREFIX,
        }
    }

    pub fn from_prefix(byte: u8) -> Option<Self> {
        match byte {
            THROUGHPUT_KEY_PREFIX => Some(Namespace::Throughput),
            PROBABILITIES_KEY_PREFIX => Some(Namespace::Probabilities),
            _ => None,
        }
    }

    /// Bounds covering every key of this namespace.
    pub fn bounds(self) -> (Bound<Vec<u8>>, Bound<Vec<u8>>) {
        let prefix = [self.prefix()];
        let end = match samplestore_kv::prefix_upper_bound(&prefix) {
            Some(upper) => Bound::Excluded(upper),
            None => Bound::Unbounded,
        };
        (Bound::Included(prefix.to_vec()), end)
    }
}

/// Nanoseconds since the Unix epoch, clamped to the `i64` range.
pub fn timestamp_nanos(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_nanos_opt().unwrap_or(if ts.timestamp() < 0 {
        i64::MIN
    } else {
        i64::MAX
    })
}

/// Order-preserving big-endian encoding of a nanosecond timestamp.
pub fn encode_timestamp(nanos: i64) -> [u8; 8] {
    ((nanos as u64) ^ SIGN_BIT).to_be_bytes()
}

pub fn decode_timestamp(bytes: [u8; 8]) -> i64 {
    (u64::from_be_bytes(bytes) ^ SIGN_BIT) as i64
}

/// A fully decoded key.
///
/// The derived `Ord` matches the byte order of [`SampleKey::encode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SampleKey {
    pub namespace: Namespace,
    pub timestamp_nanos: i64,
    pub writer_id: u32,
    pub sequence: u32,
}

impl SampleKey {
    pub fn encode(&self) -> Vec<u8> {
        let mut key = Vec::with_capacity(KEY_LEN);
        key.push(self.namespace.prefix());
        key.extend_from_slice(&encode_timestamp(self.timestamp_nanos));
        key.extend_from_slice(&self.writer_id.to_be_bytes());
        key.extend_from_slice(&self.sequence.to_be_bytes());
        key
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() != KEY_LEN {
            return Err(DecodeError::MalformedKey(format!(
                "expected {KEY_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let namespace = Namespace::from_prefix(bytes[0])
            .ok_or_else(|| DecodeError::MalformedKey(format!("unknown prefix {:#04x}", bytes[0])))?;

        let mut timestamp = [0u8; 8];
        timestamp.copy_from_slice(&bytes[1..9]);
        let mut writer_id = [0u8; 4];
        writer_id.copy_from_slice(&bytes[9..13]);
        let mut sequence = [0u8; 4];
        sequence.copy_from_slice(&bytes[13..17]);

        Ok(Self {
            namespace,
            timestamp_nanos: decode_timestamp(timestamp),
            writer_id: u32::from_be_bytes(writer_id),
            sequence: u32::from_be_bytes(sequence),
        })
    }

    /// Insertion time carried by the key.
    pub fn timestamp(&self) -> DateTime<Utc> {
        Utc.timestamp_nanos(self.timestamp_nanos)
    }
}

/// Inclusive lower bound of a time window: prefix plus timestamp only, which
/// sorts before every full key carrying that timestamp.
pub fn window_start(namespace: Namespace, start: DateTime<Utc>) -> Vec<u8> {
    let mut key = Vec::with_capacity(9);
    key.push(namespace.prefix());
    key.extend_from_slice(&encode_timestamp(timestamp_nanos(start)));
    key
}

/// Inclusive upper bound of a time window: the greatest possible full key
/// carrying the `end` timestamp.
pub fn window_end(namespace: Namespace, end: DateTime<Utc>) -> Vec<u8> {
    let mut key = window_start(namespace, end);
    key.extend_from_slice(&[0xFF; 8]);
    key
}

/// Issues unique, non-decreasing keys for one store instance.
///
/// Uniqueness within an instance comes from the sequence counter; across
/// processes sharing a database it comes from the random writer id.
#[derive(Debug)]
pub struct KeyGenerator {
    writer_id: u32,
    sequence: AtomicU32,
    last_nanos: AtomicI64,
}

impl KeyGenerator {
    /// A generator with a writer id drawn from a v4 UUID.
    pub fn new() -> Self {
        Self::with_writer_id(uuid::Uuid::new_v4().as_u128() as u32)
    }

    pub fn with_writer_id(writer_id: u32) -> Self {
        Self {
            writer_id,
            sequence: AtomicU32::new(0),
            last_nanos: AtomicI64::new(i64::MIN),
        }
    }

    pub fn writer_id(&self) -> u32 {
        self.writer_id
    }

    /// Key for a write observed at `now`.
    ///
    /// A clock that moved backwards is clamped to the last issued timestamp.
    pub fn next_key(&self, namespace: Namespace, now: DateTime<Utc>) -> SampleKey {
        let nanos = timestamp_nanos(now);
        let previous = self.last_nanos.fetch_max(nanos, Ordering::SeqCst);
        if previous > nanos {
            warn!(
                regression_ns = previous.saturating_sub(nanos),
                "clock moved backwards; reusing last key timestamp"
            );
        }

        SampleKey {
            namespace,
            timestamp_nanos: previous.max(nanos),
            writer_id: self.writer_id,
            // fetch_add wraps on overflow.
            sequence: self.sequence.fetch_add(1, Ordering::Relaxed),
        }
    }
}

impl Default for KeyGenerator {
    fn default() -> Self {
        Self::new()
    }
}
