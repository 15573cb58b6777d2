// Copyright (c) 2026 antbox.io
// SPDX-License-Identifier: AGPL-3.0

//! In-Memory Storage Provider
//!
//! Blob store backed by a hash map. Bodies are lost on restart; intended
//! for tests and single-node development.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::Bytes;

use crate::domain::storage::{StorageError, StorageProvider};

#[derive(Clone, Default)]
pub struct InMemoryStorageProvider {
    blobs: Arc<RwLock<HashMap<String, Bytes>>>,
}

impl InMemoryStorageProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageProvider for InMemoryStorageProvider {
    async fn put(&self, key: &str, content: Bytes) -> Result<(), StorageError> {
        let mut blobs = self.blobs.write().unwrap();
        blobs.insert(key.to_string(), content);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, StorageError> {
        let blobs = self.blobs.read().unwrap();
        blobs
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let mut blobs = self.blobs.write().unwrap();
        blobs
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_delete() {
        let provider = InMemoryStorageProvider::new();

        provider.put("k1", Bytes::from_static(b"hello")).await.unwrap();
        assert_eq!(provider.get("k1").await.unwrap(), Bytes::from_static(b"hello"));

        // Put replaces previous content.
        provider.put("k1", Bytes::from_static(b"world")).await.unwrap();
        assert_eq!(provider.get("k1").await.unwrap(), Bytes::from_static(b"world"));

        provider.delete("k1").await.unwrap();
        assert!(matches!(
            provider.get("k1").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_missing_blob() {
        let provider = InMemoryStorageProvider::new();
        assert!(matches!(
            provider.delete("missing").await,
            Err(StorageError::NotFound(_))
        ));
    }
}
