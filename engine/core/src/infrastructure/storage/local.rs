// Copyright (c) 2026 antbox.io
// SPDX-License-Identifier: AGPL-3.0

//! Local Filesystem Storage Provider
//!
//! Stores blobs as files under a base directory, one file per key. Suitable
//! for single-node deployments and development; multi-node setups need a
//! shared backend behind the same trait.
//!
//! Keys are opaque but must not escape the base directory; anything with a
//! path separator or traversal component is rejected.

use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;

use crate::domain::storage::{StorageError, StorageProvider};

pub struct LocalStorageProvider {
    base_path: PathBuf,
}

impl LocalStorageProvider {
    /// Create a provider rooted at `base_path`, creating the directory and
    /// probing it for writability.
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let base_path = base_path.into();

        std::fs::create_dir_all(&base_path).map_err(|e| {
            StorageError::Io(format!(
                "Failed to create base directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        let probe = base_path.join(".antbox-storage-probe");
        std::fs::write(&probe, b"probe").map_err(|e| {
            StorageError::Io(format!(
                "Base directory {} is not writable: {}",
                base_path.display(),
                e
            ))
        })?;
        std::fs::remove_file(&probe)
            .map_err(|e| StorageError::Io(format!("Failed to remove probe file: {}", e)))?;

        Ok(Self { base_path })
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, StorageError> {
        if key.is_empty()
            || key.contains('/')
            || key.contains('\\')
            || key.contains("..")
        {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.base_path.join(key))
    }
}

#[async_trait]
impl StorageProvider for LocalStorageProvider {
    async fn put(&self, key: &str, content: Bytes) -> Result<(), StorageError> {
        let path = self.resolve(key)?;
        tokio::fs::write(&path, &content).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, StorageError> {
        let path = self.resolve(key)?;
        match tokio::fs::read(&path).await {
            Ok(content) => Ok(Bytes::from(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.resolve(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}
