// Copyright (c) 2026 antbox.io
// SPDX-License-Identifier: AGPL-3.0

//! Audit Stream Records
//!
//! Append-only per-node history. Streams are keyed by
//! `(node uuid, mimetype)`; the sequence number increases monotonically
//! within a stream and is assigned by the repository under its per-stream
//! serialization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditStreamKey {
    /// streamId = node uuid.
    pub uuid: String,
    pub mimetype: String,
}

impl AuditStreamKey {
    pub fn new(uuid: impl Into<String>, mimetype: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            mimetype: mimetype.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    /// Unique id of this event instance.
    pub event_id: String,
    /// Stable event type name, e.g. `NodeCreated`.
    pub event_type: String,
    pub occurred_on: DateTime<Utc>,
    pub user_email: String,
    pub tenant: String,
    pub payload: Value,
    /// Assigned by the repository on append; 1-based per stream.
    #[serde(default)]
    pub sequence: u64,
}

/// Aggregated view of a deletion, derived from the audit streams.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedNodeSummary {
    pub uuid: String,
    pub title: String,
    pub deleted_at: DateTime<Utc>,
    pub deleted_by: String,
}
