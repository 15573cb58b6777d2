// Copyright (c) 2026 antbox.io
// SPDX-License-Identifier: AGPL-3.0

//! Storage Provider Trait - Anti-Corruption Layer for Binary Bodies
//!
//! Opaque blob store keyed by strings chosen by the node service (the node
//! uuid in practice). Implementations must treat keys as opaque; the
//! in-memory and local-filesystem providers live in the infrastructure
//! layer.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::domain::error::AntboxError;

#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Store a blob under the key, replacing any previous content.
    async fn put(&self, key: &str, content: Bytes) -> Result<(), StorageError>;

    /// Fetch the blob stored under the key.
    async fn get(&self, key: &str) -> Result<Bytes, StorageError>;

    /// Remove the blob stored under the key.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Unknown storage error: {0}")]
    Unknown(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

impl From<StorageError> for AntboxError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => AntboxError::NodeNotFound(key),
            other => AntboxError::Unknown(other.to_string()),
        }
    }
}
