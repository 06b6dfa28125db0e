// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Store configuration.
//
// Defaults:
// - backend: redb
// - path: ./data/sampling.redb
// - max_value_bytes: 4 MiB
//
// Environment overrides: `SAMPLESTORE_BACKEND`, `SAMPLESTORE_PATH`,
// `SAMPLESTORE_MAX_VALUE_BYTES`.

use std::path::PathBuf;
use std::str::FromStr;

use samplestore_kv::{InMemoryBackend, StorageBackend, StorageError};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{SamplingResult, SamplingStoreError};
use crate::store::SamplingStore;

/// Default upper bound on one encoded value.
pub const DEFAULT_MAX_VALUE_BYTES: usize = 4 * 1024 * 1024;

/// Which key-value engine backs the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Process memory; state is lost on restart.
    Memory,
    /// Single-file redb database at `path`.
    Redb,
}

impl FromStr for BackendKind {
    type Err = SamplingStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(BackendKind::Memory),
            "redb" => Ok(BackendKind::Redb),
            other => Err(SamplingStoreError::Config(format!(
                "unknown backend '{other}' (expected 'memory' or 'redb')"
            ))),
        }
    }
}

/// Configuration for opening a [`SamplingStore`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingStoreConfig {
    pub backend: BackendKind,
    /// Database file used by the redb backend.
    pub path: PathBuf,
    /// Encoded values above this size are rejected before writing.
    pub max_value_bytes: usize,
}

impl Default for SamplingStoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Redb,
            path: PathBuf::from("./data/sampling.redb"),
            max_value_bytes: DEFAULT_MAX_VALUE_BYTES,
        }
    }
}

impl SamplingStoreConfig {
    /// Defaults overridden by `SAMPLESTORE_*` environment variables.
    pub fn from_env() -> SamplingResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    pub fn from_lookup<F>(lookup: F) -> SamplingResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(backend) = lookup("SAMPLESTORE_BACKEND") {
            config.backend = backend.parse()?;
        }
        if let Some(path) = lookup("SAMPLESTORE_PATH") {
            config.path = PathBuf::from(path);
        }
        if let Some(max) = lookup("SAMPLESTORE_MAX_VALUE_BYTES") {
            config.max_value_bytes = max.trim().parse().map_err(|e| {
                SamplingStoreError::Config(format!("SAMPLESTORE_MAX_VALUE_BYTES='{max}': {e}"))
            })?;
        }
        Ok(config)
    }

    /// Open the configured backend.
    pub fn open_backend(&self) -> Result<Box<dyn StorageBackend>, StorageError> {
        match self.backend {
            BackendKind::Memory => Ok(Box::new(InMemoryBackend::new())),
            BackendKind::Redb => open_redb(self),
        }
    }

    /// Open the configured backend and wrap it in a store.
    pub fn open_store(&self) -> SamplingResult<SamplingStore<Box<dyn StorageBackend>>> {
        let backend = self.open_backend()?;
        let store = SamplingStore::new(backend).with_max_value_bytes(self.max_value_bytes);
        info!(
            backend = ?self.backend,
            path = %self.path.display(),
            writer_id = store.writer_id(),
            "opened sampling store"
        );
        Ok(store)
    }
}

#[cfg(feature = "redb-backend")]
fn open_redb(config: &SamplingStoreConfig) -> Result<Box<dyn StorageBackend>, StorageError> {
    Ok(Box::new(samplestore_kv::RedbBackend::open(&config.path)?))
}

#[cfg(not(feature = "redb-backend"))]
fn open_redb(_config: &SamplingStoreConfig) -> Result<Box<dyn StorageBackend>, StorageError> {
    Err(StorageError::BackendUnavailable(
        "built without the redb-backend feature".to_string(),
    ))
}
