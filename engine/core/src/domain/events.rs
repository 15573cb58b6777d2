// Copyright (c) 2026 antbox.io
// SPDX-License-Identifier: AGPL-3.0

// Node Domain Events
//
// Every successful lifecycle transition emits one of these on the tenant's
// event bus. Each event carries the acting principal's email, the tenant,
// and the occurrence time; updates additionally carry the changed fields as
// {oldValues, newValues}.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::domain::node::Node;

pub const NODE_CREATED: &str = "NodeCreated";
pub const NODE_UPDATED: &str = "NodeUpdated";
pub const NODE_DELETED: &str = "NodeDeleted";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeEventKind {
    Created,
    Updated,
    Deleted,
}

impl NodeEventKind {
    pub fn event_id(self) -> &'static str {
        match self {
            NodeEventKind::Created => NODE_CREATED,
            NodeEventKind::Updated => NODE_UPDATED,
            NodeEventKind::Deleted => NODE_DELETED,
        }
    }
}

/// Changed fields of an update, keyed by attribute name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeChanges {
    pub old_values: Map<String, Value>,
    pub new_values: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeEvent {
    pub kind: NodeEventKind,
    pub occurred_on: DateTime<Utc>,
    pub user_email: String,
    pub tenant: String,
    /// Snapshot of the node after the transition; for deletions, the node
    /// as it was when removed.
    pub node: Node,
    /// Present on updates only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changes: Option<NodeChanges>,
}

impl NodeEvent {
    pub fn created(node: Node, user_email: &str, at: DateTime<Utc>) -> Self {
        Self {
            kind: NodeEventKind::Created,
            occurred_on: at,
            user_email: user_email.to_string(),
            tenant: node.tenant.clone(),
            node,
            changes: None,
        }
    }

    pub fn updated(node: Node, changes: NodeChanges, user_email: &str, at: DateTime<Utc>) -> Self {
        Self {
            kind: NodeEventKind::Updated,
            occurred_on: at,
            user_email: user_email.to_string(),
            tenant: node.tenant.clone(),
            node,
            changes: Some(changes),
        }
    }

    pub fn deleted(node: Node, user_email: &str, at: DateTime<Utc>) -> Self {
        Self {
            kind: NodeEventKind::Deleted,
            occurred_on: at,
            user_email: user_email.to_string(),
            tenant: node.tenant.clone(),
            node,
            changes: None,
        }
    }

    pub fn event_id(&self) -> &'static str {
        self.kind.event_id()
    }

    /// Payload recorded in the audit stream. Updates keep the
    /// `{uuid, oldValues, newValues}` shape; creations and deletions record
    /// the node snapshot.
    pub fn audit_payload(&self) -> Value {
        match (&self.kind, &self.changes) {
            (NodeEventKind::Updated, Some(changes)) => json!({
                "uuid": self.node.uuid,
                "oldValues": changes.old_values,
                "newValues": changes.new_values,
            }),
            _ => serde_json::to_value(&self.node).unwrap_or(Value::Null),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node() -> Node {
        Node::new(
            "11111111-aaaa-bbbb-cccc-000000000001",
            "doc",
            "text/plain",
            "o@antbox.io",
            "default",
            Utc::now(),
        )
    }

    #[test]
    fn test_event_ids() {
        let event = NodeEvent::created(node(), "o@antbox.io", Utc::now());
        assert_eq!(event.event_id(), NODE_CREATED);
        assert_eq!(event.tenant, "default");
    }

    #[test]
    fn test_update_audit_payload_shape() {
        let mut old_values = Map::new();
        old_values.insert("title".to_string(), json!("doc"));
        let mut new_values = Map::new();
        new_values.insert("title".to_string(), json!("report"));

        let event = NodeEvent::updated(
            node(),
            NodeChanges {
                old_values,
                new_values,
            },
            "o@antbox.io",
            Utc::now(),
        );
        let payload = event.audit_payload();
        assert_eq!(payload["oldValues"]["title"], "doc");
        assert_eq!(payload["newValues"]["title"], "report");
        assert_eq!(payload["uuid"], event.node.uuid);
    }
}
