// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Value encoding for stored sampling records.
//
// A stored value is UTF-8 text: one header line followed by a compact JSON
// body.
//
//   samplestore/1 <kind> <crc32>\n
//   <json body>
//
// - `samplestore/1` -- format magic and schema version
// - `<kind>`        -- `throughput` or `probabilities`
// - `<crc32>`       -- CRC32 of the body bytes, 8 lowercase hex digits
//
// Compact JSON never contains a raw newline, so the first `\n` always ends the
// header. Decoding fails closed: anything that is not exactly this shape, for
// the kind the caller expects, is a `DecodeError`.

use std::fmt;

use crc32fast::Hasher as Crc32Hasher;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{DecodeError, SamplingStoreError};
use crate::model::{ProbabilitiesAndQPS, ServiceOperationProbabilities, Throughput};

/// Format magic written at the start of every value.
pub const FORMAT_MAGIC: &str = "samplestore";

/// Schema version written after the magic.
pub const FORMAT_VERSION: u32 = 1;

/// Which record type a stored value holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Throughput,
    Probabilities,
}

impl PayloadKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PayloadKind::Throughput => "throughput",
            PayloadKind::Probabilities => "probabilities",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "throughput" => Some(PayloadKind::Throughput),
            "probabilities" => Some(PayloadKind::Probabilities),
            _ => None,
        }
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn crc32(bytes: &[u8]) -> u32 {
    let mut hasher = Crc32Hasher::new();
    hasher.update(bytes);
    hasher.finalize()
}

fn encode_value<T: Serialize>(kind: PayloadKind, payload: &T) -> Result<Vec<u8>, SamplingStoreError> {
    let body = serde_json::to_vec(payload)
        .map_err(|e| SamplingStoreError::Serialization(format!("{kind} payload: {e}")))?;

    let mut value = format!("{FORMAT_MAGIC}/{FORMAT_VERSION} {kind} {:08x}\n", crc32(&body)).into_bytes();
    value.extend_from_slice(&body);
    Ok(value)
}

fn decode_value<T: DeserializeOwned>(expected: PayloadKind, bytes: &[u8]) -> Result<T, DecodeError> {
    let newline = bytes
        .iter()
        .position(|&b| b == b'\n')
        .ok_or(DecodeError::MissingHeader)?;
    let (header, body) = (&bytes[..newline], &bytes[newline + 1..]);

    let header = std::str::from_utf8(header)
        .map_err(|_| DecodeError::MalformedHeader("header is not UTF-8".to_string()))?;
    let fields: Vec<&str> = header.split(' ').collect();
    let [format, kind, checksum] = fields.as_slice() else {
        return Err(DecodeError::MalformedHeader(header.to_string()));
    };

    match format.split_once('/') {
        Some((FORMAT_MAGIC, version)) if version.parse::<u32>() == Ok(FORMAT_VERSION) => {}
        _ => return Err(DecodeError::UnsupportedFormat(format.to_string())),
    }

    let found = PayloadKind::parse(kind)
        .ok_or_else(|| DecodeError::MalformedHeader(format!("unknown payload kind '{kind}'")))?;
    if found != expected {
        return Err(DecodeError::KindMismatch { expected, found });
    }

    if checksum.len() != 8 || !checksum.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(DecodeError::MalformedHeader(format!("bad checksum field '{checksum}'")));
    }
    let stored = u32::from_str_radix(checksum, 16)
        .map_err(|_| DecodeError::MalformedHeader(format!("bad checksum field '{checksum}'")))?;
    let actual = crc32(body);
    if stored != actual {
        return Err(DecodeError::ChecksumMismatch {
            expected: stored,
            actual,
        });
    }

    Ok(serde_json::from_slice(body)?)
}

/// Serialize a throughput batch into a stored value.
pub fn encode_throughput_value(batch: &[Throughput]) -> Result<Vec<u8>, SamplingStoreError> {
    encode_value(PayloadKind::Throughput, &batch)
}

/// Parse a stored throughput value.
pub fn decode_throughput_value(bytes: &[u8]) -> Result<Vec<Throughput>, DecodeError> {
    decode_value(PayloadKind::Throughput, bytes)
}

/// Serialize a probability/QPS snapshot into a stored value.
///
/// JSON has no representation for NaN or infinities (serde_json would
/// silently write `null`), so non-finite numbers are rejected here.
pub fn encode_probabilities_value(snapshot: &ProbabilitiesAndQPS) -> Result<Vec<u8>, SamplingStoreError> {
    ensure_finite("probabilities", &snapshot.probabilities)?;
    ensure_finite("qps", &snapshot.qps)?;
    encode_value(PayloadKind::Probabilities, snapshot)
}

/// Parse a stored probability/QPS value.
pub fn decode_probabilities_value(bytes: &[u8]) -> Result<ProbabilitiesAndQPS, DecodeError> {
    decode_value(PayloadKind::Probabilities, bytes)
}

fn ensure_finite(field: &str, map: &ServiceOperationProbabilities) -> Result<(), SamplingStoreError> {
    for (service, operations) in map {
        for (operation, value) in operations {
            if !value.is_finite() {
                return Err(SamplingStoreError::Serialization(format!(
                    "{field} for {service}/{operation} is not a finite number: {value}"
                )));
            }
        }
    }
    Ok(())
}
