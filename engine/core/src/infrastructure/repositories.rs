// Copyright (c) 2026 antbox.io
// SPDX-License-Identifier: AGPL-3.0

//! Repository Implementations
//!
//! Thread-safe in-memory implementations of the domain repository traits,
//! used for development, testing, and single-node deployments. One set of
//! repositories per tenant; the uuid/fid uniqueness the traits require is
//! therefore per-tenant by construction.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::domain::audit::{AuditRecord, AuditStreamKey};
use crate::domain::filter::NodeFilters;
use crate::domain::node::Node;
use crate::domain::repository::{
    AuditRepository, ConfigCollection, ConfigEntity, NodeFilterResult, NodeRepository,
    RepositoryError,
};

#[derive(Clone, Default)]
pub struct InMemoryNodeRepository {
    nodes: Arc<RwLock<HashMap<String, Node>>>,
}

impl InMemoryNodeRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn fid_taken(nodes: &HashMap<String, Node>, fid: &str, except_uuid: &str) -> bool {
        nodes
            .values()
            .any(|n| n.uuid != except_uuid && n.fid.as_deref() == Some(fid))
    }
}

#[async_trait]
impl NodeRepository for InMemoryNodeRepository {
    async fn add(&self, node: &Node) -> Result<(), RepositoryError> {
        let mut nodes = self.nodes.write().unwrap();
        if nodes.contains_key(&node.uuid) {
            return Err(RepositoryError::Duplicate(node.uuid.clone()));
        }
        if let Some(fid) = &node.fid {
            if Self::fid_taken(&nodes, fid, &node.uuid) {
                return Err(RepositoryError::Duplicate(fid.clone()));
            }
        }
        nodes.insert(node.uuid.clone(), node.clone());
        Ok(())
    }

    async fn update(&self, node: &Node) -> Result<(), RepositoryError> {
        let mut nodes = self.nodes.write().unwrap();
        if !nodes.contains_key(&node.uuid) {
            return Err(RepositoryError::NotFound(node.uuid.clone()));
        }
        if let Some(fid) = &node.fid {
            if Self::fid_taken(&nodes, fid, &node.uuid) {
                return Err(RepositoryError::Duplicate(fid.clone()));
            }
        }
        nodes.insert(node.uuid.clone(), node.clone());
        Ok(())
    }

    async fn delete(&self, uuid: &str) -> Result<(), RepositoryError> {
        let mut nodes = self.nodes.write().unwrap();
        nodes
            .remove(uuid)
            .map(|_| ())
            .ok_or_else(|| RepositoryError::NotFound(uuid.to_string()))
    }

    async fn get_by_id(&self, uuid: &str) -> Result<Option<Node>, RepositoryError> {
        let nodes = self.nodes.read().unwrap();
        Ok(nodes.get(uuid).cloned())
    }

    async fn get_by_fid(&self, fid: &str) -> Result<Option<Node>, RepositoryError> {
        let nodes = self.nodes.read().unwrap();
        Ok(nodes.values().find(|n| n.fid.as_deref() == Some(fid)).cloned())
    }

    async fn filter(
        &self,
        filters: &NodeFilters,
        page_size: usize,
        page_token: u64,
    ) -> Result<NodeFilterResult, RepositoryError> {
        let nodes = self.nodes.read().unwrap();
        let mut matching: Vec<Node> = Vec::new();
        for node in nodes.values() {
            if filters.matches(node)? {
                matching.push(node.clone());
            }
        }
        // Stable listing order across pages.
        matching.sort_by(|a, b| {
            a.created_time
                .cmp(&b.created_time)
                .then_with(|| a.uuid.cmp(&b.uuid))
        });

        let page_size = page_size.max(1);
        let page = page_token.max(1);
        let offset = (page as usize - 1) * page_size;
        let has_more = matching.len() > offset + page_size;
        let nodes = matching.into_iter().skip(offset).take(page_size).collect();

        Ok(NodeFilterResult {
            nodes,
            next_page_token: has_more.then_some(page + 1),
        })
    }
}

/// Generic in-memory typed collection of the configuration repository.
#[derive(Clone)]
pub struct InMemoryConfigCollection<T: ConfigEntity> {
    entities: Arc<RwLock<HashMap<String, T>>>,
}

impl<T: ConfigEntity> InMemoryConfigCollection<T> {
    pub fn new() -> Self {
        Self {
            entities: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl<T: ConfigEntity> Default for InMemoryConfigCollection<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: ConfigEntity> ConfigCollection<T> for InMemoryConfigCollection<T> {
    async fn save(&self, entity: &T) -> Result<(), RepositoryError> {
        let mut entities = self.entities.write().unwrap();
        entities.insert(entity.id().to_string(), entity.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<T>, RepositoryError> {
        let entities = self.entities.read().unwrap();
        Ok(entities.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<T>, RepositoryError> {
        let entities = self.entities.read().unwrap();
        let mut list: Vec<T> = entities.values().cloned().collect();
        list.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(list)
    }

    async fn delete(&self, id: &str) -> Result<(), RepositoryError> {
        let mut entities = self.entities.write().unwrap();
        entities
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }
}

/// In-memory audit streams. Appends hold the write lock for the whole
/// operation, which serializes sequence assignment per stream.
#[derive(Clone, Default)]
pub struct InMemoryAuditRepository {
    streams: Arc<RwLock<HashMap<AuditStreamKey, Vec<AuditRecord>>>>,
}

impl InMemoryAuditRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditRepository for InMemoryAuditRepository {
    async fn append(
        &self,
        stream: &AuditStreamKey,
        mut record: AuditRecord,
    ) -> Result<AuditRecord, RepositoryError> {
        let mut streams = self.streams.write().unwrap();
        let records = streams.entry(stream.clone()).or_default();
        record.sequence = records.len() as u64 + 1;
        records.push(record.clone());
        Ok(record)
    }

    async fn read_stream(&self, stream_uuid: &str) -> Result<Vec<AuditRecord>, RepositoryError> {
        let streams = self.streams.read().unwrap();
        let mut records: Vec<AuditRecord> = streams
            .iter()
            .filter(|(key, _)| key.uuid == stream_uuid)
            .flat_map(|(_, records)| records.iter().cloned())
            .collect();
        records.sort_by_key(|r| r.sequence);
        Ok(records)
    }

    async fn streams_with_mimetype(
        &self,
        mimetype: &str,
    ) -> Result<Vec<(AuditStreamKey, Vec<AuditRecord>)>, RepositoryError> {
        let streams = self.streams.read().unwrap();
        Ok(streams
            .iter()
            .filter(|(key, _)| key.mimetype == mimetype)
            .map(|(key, records)| (key.clone(), records.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::filter::{Filter, FilterOperator};
    use chrono::Utc;
    use serde_json::json;

    fn node(uuid: &str, title: &str, mimetype: &str) -> Node {
        Node::new(uuid, title, mimetype, "o@antbox.io", "default", Utc::now())
    }

    #[tokio::test]
    async fn test_uuid_uniqueness() {
        let repo = InMemoryNodeRepository::new();
        repo.add(&node("11111111-a", "one", "text/plain")).await.unwrap();

        let result = repo.add(&node("11111111-a", "again", "text/plain")).await;
        assert!(matches!(result, Err(RepositoryError::Duplicate(_))));
    }

    #[tokio::test]
    async fn test_fid_uniqueness() {
        let repo = InMemoryNodeRepository::new();
        let mut first = node("11111111-a", "one", "text/plain");
        first.fid = Some("docs".to_string());
        repo.add(&first).await.unwrap();

        let mut second = node("22222222-b", "two", "text/plain");
        second.fid = Some("docs".to_string());
        assert!(matches!(
            repo.add(&second).await,
            Err(RepositoryError::Duplicate(_))
        ));

        let found = repo.get_by_fid("docs").await.unwrap().unwrap();
        assert_eq!(found.uuid, "11111111-a");
    }

    #[tokio::test]
    async fn test_filter_pagination() {
        let repo = InMemoryNodeRepository::new();
        for i in 0..5 {
            let mut n = node(&format!("0000000{}-x", i), &format!("n{}", i), "text/plain");
            n.created_time = Utc::now() + chrono::Duration::seconds(i);
            n.modified_time = n.created_time;
            repo.add(&n).await.unwrap();
        }

        let filters = NodeFilters::And(vec![Filter::new(
            "mimetype",
            FilterOperator::Equal,
            json!("text/plain"),
        )]);

        let page1 = repo.filter(&filters, 2, 1).await.unwrap();
        assert_eq!(page1.nodes.len(), 2);
        assert_eq!(page1.next_page_token, Some(2));

        let page2 = repo.filter(&filters, 2, 2).await.unwrap();
        assert_eq!(page2.nodes.len(), 2);
        assert_eq!(page2.next_page_token, Some(3));

        let page3 = repo.filter(&filters, 2, 3).await.unwrap();
        assert_eq!(page3.nodes.len(), 1);
        assert_eq!(page3.next_page_token, None);

        // Tokens walk the listing without overlap.
        let all: Vec<String> = [page1.nodes, page2.nodes, page3.nodes]
            .concat()
            .iter()
            .map(|n| n.title.clone())
            .collect();
        assert_eq!(all, vec!["n0", "n1", "n2", "n3", "n4"]);
    }

    #[tokio::test]
    async fn test_audit_sequence_per_stream() {
        let repo = InMemoryAuditRepository::new();
        let stream_a = AuditStreamKey::new("node-a", "text/plain");
        let stream_b = AuditStreamKey::new("node-b", "text/plain");

        let record = |event_type: &str| AuditRecord {
            event_id: uuid::Uuid::new_v4().to_string(),
            event_type: event_type.to_string(),
            occurred_on: Utc::now(),
            user_email: "o@antbox.io".to_string(),
            tenant: "default".to_string(),
            payload: json!({}),
            sequence: 0,
        };

        let first = repo.append(&stream_a, record("NodeCreated")).await.unwrap();
        let second = repo.append(&stream_a, record("NodeUpdated")).await.unwrap();
        let other = repo.append(&stream_b, record("NodeCreated")).await.unwrap();

        assert_eq!(first.sequence, 1);
        assert_eq!(second.sequence, 2);
        assert_eq!(other.sequence, 1);

        let history = repo.read_stream("node-a").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].event_type, "NodeUpdated");
    }
}
