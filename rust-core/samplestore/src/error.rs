// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Error taxonomy for the sampling store.
//
// Decode failures are kept in their own enum so the two decode helpers can be
// used (and fuzzed) without a store. Backend errors are wrapped unchanged.
// Empty results are never errors: they surface as `Ok(vec![])` / `Ok(None)`.

use samplestore_kv::StorageError;
use thiserror::Error;

use crate::codec::PayloadKind;

/// A stored key or value failed structured parsing.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The value has no header line at all (truncated or foreign bytes).
    #[error("missing value header")]
    MissingHeader,

    /// The header line exists but does not have the expected shape.
    #[error("malformed value header: {0}")]
    MalformedHeader(String),

    /// The header names a format or version this build does not understand.
    #[error("unsupported value format: {0}")]
    UnsupportedFormat(String),

    /// The value holds a different record type than the caller asked for.
    #[error("payload kind mismatch: expected {expected}, found {found}")]
    KindMismatch {
        /// Kind requested by the decode helper.
        expected: PayloadKind,
        /// Kind recorded in the header.
        found: PayloadKind,
    },

    /// CRC32 of the body does not match the header.
    #[error("checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch {
        /// The CRC32 value stored in the header.
        expected: u32,
        /// The CRC32 value computed over the body.
        actual: u32,
    },

    /// The body is not valid JSON for the expected record type.
    #[error("malformed payload: {0}")]
    Json(#[from] serde_json::Error),

    /// A key read back from the engine has the wrong length or prefix.
    #[error("malformed key: {0}")]
    MalformedKey(String),
}

/// Errors returned by [`crate::SamplingStore`] operations.
#[derive(Debug, Error)]
pub enum SamplingStoreError {
    /// The caller passed something the store refuses to persist.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A configuration value could not be parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// A record could not be encoded; nothing was written.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Stored bytes failed to decode.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// The key-value engine failed; propagated as-is.
    #[error("storage backend error: {0}")]
    Backend(#[from] StorageError),
}

/// Convenience type alias for sampling store results.
pub type SamplingResult<T> = Result<T, SamplingStoreError>;
