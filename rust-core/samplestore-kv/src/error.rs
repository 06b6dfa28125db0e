// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Storage error types for the ordered key-value engine contract.
//
// Failure modes of the engine itself: I/O errors, missing keys, data
// corruption reported by the engine, unavailability, write conflicts and
// value size violations. "Key not found" is kept distinct from I/O failure.

use thiserror::Error;

/// Errors that can occur when interacting with a storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred in the underlying storage layer.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The requested key was not found.
    #[error("key not found: {0}")]
    NotFound(String),

    /// The engine reported corrupted pages or an unreadable entry.
    #[error("corrupted data: {0}")]
    CorruptedData(String),

    /// The storage backend is not available (e.g., file locked, not compiled in).
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// A conditional write found the key already present.
    #[error("write conflict: key already exists: {0}")]
    Conflict(String),

    /// The value exceeds the maximum allowed size.
    #[error("value too large: {size} bytes (max: {max})")]
    ValueTooLarge {
        /// Actual value size in bytes.
        size: usize,
        /// Maximum allowed value size in bytes.
        max: usize,
    },
}

impl StorageError {
    /// Build a [`StorageError::Conflict`] naming `key` in hex.
    pub fn conflict(key: &[u8]) -> Self {
        Self::Conflict(hex_key(key))
    }
}

/// Render a binary key as `0x`-prefixed lowercase hex for error messages
/// and log fields.
pub fn hex_key(key: &[u8]) -> String {
    let mut out = String::with_capacity(2 + key.len() * 2);
    out.push_str("0x");
    for byte in key {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_display() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file gone");
        let err = StorageError::Io(io_err);
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn test_not_found_display() {
        let err = StorageError::NotFound("my-key".to_string());
        assert_eq!(err.to_string(), "key not found: my-key");
    }

    #[test]
    fn test_corrupted_data_display() {
        let err = StorageError::CorruptedData("page checksum".to_string());
        assert!(err.to_string().contains("corrupted data"));
    }

    #[test]
    fn test_backend_unavailable_display() {
        let err = StorageError::BackendUnavailable("database already open".to_string());
        assert!(err.to_string().contains("backend unavailable"));
    }

    #[test]
    fn test_conflict_names_key_in_hex() {
        let err = StorageError::conflict(&[0x08, 0xff, 0x00]);
        assert_eq!(err.to_string(), "write conflict: key already exists: 0x08ff00");
    }

    #[test]
    fn test_value_too_large_display() {
        let err = StorageError::ValueTooLarge { size: 4096, max: 2048 };
        assert!(err.to_string().contains("value too large"));
        assert!(err.to_string().contains("4096"));
        assert!(err.to_string().contains("2048"));
    }

    #[test]
    fn test_hex_key_empty() {
        assert_eq!(hex_key(&[]), "0x");
    }
}
