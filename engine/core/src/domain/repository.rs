// Copyright (c) 2026 antbox.io
// SPDX-License-Identifier: AGPL-3.0

// Repository Pattern - Storage Backend Abstraction
//
// Domain-owned traits for node metadata, typed configuration collections,
// and audit streams. Infrastructure provides the in-memory implementations;
// persistent adapters are external collaborators behind the same traits.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::audit::{AuditRecord, AuditStreamKey};
use crate::domain::error::AntboxError;
use crate::domain::filter::{FilterError, NodeFilters};
use crate::domain::node::Node;

/// Result page of a filtered node query. Page tokens are opaque positive
/// integers, monotonically increasing; `None` means the listing is
/// exhausted.
#[derive(Debug, Clone, Default)]
pub struct NodeFilterResult {
    pub nodes: Vec<Node>,
    pub next_page_token: Option<u64>,
}

/// Metadata CRUD plus filter-based query. Implementations enforce
/// per-tenant uniqueness of `uuid` and `fid`.
#[async_trait]
pub trait NodeRepository: Send + Sync {
    async fn add(&self, node: &Node) -> Result<(), RepositoryError>;

    async fn update(&self, node: &Node) -> Result<(), RepositoryError>;

    async fn delete(&self, uuid: &str) -> Result<(), RepositoryError>;

    async fn get_by_id(&self, uuid: &str) -> Result<Option<Node>, RepositoryError>;

    async fn get_by_fid(&self, fid: &str) -> Result<Option<Node>, RepositoryError>;

    async fn filter(
        &self,
        filters: &NodeFilters,
        page_size: usize,
        page_token: u64,
    ) -> Result<NodeFilterResult, RepositoryError>;
}

/// Anything storable in a typed configuration collection.
pub trait ConfigEntity: Clone + Send + Sync + 'static {
    fn id(&self) -> &str;
}

/// Typed collection CRUD for the configuration repository: groups, users,
/// api keys, agents, features, aspects. One collection per entity type.
#[async_trait]
pub trait ConfigCollection<T: ConfigEntity>: Send + Sync {
    /// Insert or replace by id.
    async fn save(&self, entity: &T) -> Result<(), RepositoryError>;

    async fn get(&self, id: &str) -> Result<Option<T>, RepositoryError>;

    async fn list(&self) -> Result<Vec<T>, RepositoryError>;

    async fn delete(&self, id: &str) -> Result<(), RepositoryError>;
}

/// Append-only audit streams. Appends are serialized per stream and assign
/// the monotonically increasing sequence number.
#[async_trait]
pub trait AuditRepository: Send + Sync {
    async fn append(
        &self,
        stream: &AuditStreamKey,
        record: AuditRecord,
    ) -> Result<AuditRecord, RepositoryError>;

    /// Full history of one stream, in sequence order.
    async fn read_stream(&self, stream_uuid: &str) -> Result<Vec<AuditRecord>, RepositoryError>;

    /// All streams whose key carries the given mimetype.
    async fn streams_with_mimetype(
        &self,
        mimetype: &str,
    ) -> Result<Vec<(AuditStreamKey, Vec<AuditRecord>)>, RepositoryError>;
}

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Duplicate identifier: {0}")]
    Duplicate(String),

    #[error("Filter evaluation failed: {0}")]
    Filter(#[from] FilterError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}

impl From<RepositoryError> for AntboxError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(id) => AntboxError::NodeNotFound(id),
            RepositoryError::Duplicate(id) => AntboxError::Conflict(id),
            RepositoryError::Filter(e) => AntboxError::BadRequest(e.to_string()),
            other => AntboxError::Unknown(other.to_string()),
        }
    }
}
