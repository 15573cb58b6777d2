// Copyright (c) 2026 antbox.io
// SPDX-License-Identifier: AGPL-3.0

//! Audit Logging Service
//!
//! Weak consumer of the node event stream: subscribes to the three node
//! events and appends one record per event to the stream keyed by
//! `(node uuid, mimetype)`. Reading history requires admin. Append
//! failures are logged and discarded; they never reach the publisher.

use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use crate::domain::audit::{AuditRecord, AuditStreamKey, DeletedNodeSummary};
use crate::domain::auth::AuthenticationContext;
use crate::domain::error::{AntboxError, AntboxResult};
use crate::domain::events::{NodeEvent, NODE_DELETED};
use crate::domain::repository::AuditRepository;
use crate::infrastructure::event_bus::{EventBus, SubscriptionToken};

pub struct AuditLogService {
    repository: Arc<dyn AuditRepository>,
}

impl AuditLogService {
    pub fn new(repository: Arc<dyn AuditRepository>) -> Self {
        Self { repository }
    }

    /// Attach to a bus; every node event becomes one appended record.
    pub fn subscribe(self: Arc<Self>, bus: &EventBus) -> SubscriptionToken {
        let service = self;
        bus.subscribe_handler(None, move |event| {
            let service = Arc::clone(&service);
            async move {
                if let Err(e) = service.append(&event).await {
                    warn!(node = %event.node.uuid, error = %e, "audit append failed");
                }
            }
        })
    }

    async fn append(&self, event: &NodeEvent) -> AntboxResult<()> {
        let stream = AuditStreamKey::new(&event.node.uuid, &event.node.mimetype);
        let record = AuditRecord {
            event_id: Uuid::new_v4().to_string(),
            event_type: event.event_id().to_string(),
            occurred_on: event.occurred_on,
            user_email: event.user_email.clone(),
            tenant: event.tenant.clone(),
            payload: event.audit_payload(),
            sequence: 0,
        };
        self.repository.append(&stream, record).await?;
        Ok(())
    }

    /// Full history of one node's stream.
    pub async fn get_stream(
        &self,
        ctx: &AuthenticationContext,
        uuid: &str,
    ) -> AntboxResult<Vec<AuditRecord>> {
        if !ctx.is_admin() {
            return Err(AntboxError::Forbidden(
                "Only admins read audit streams".to_string(),
            ));
        }
        Ok(self.repository.read_stream(uuid).await?)
    }

    /// Aggregate the deletion events of every stream with the given
    /// mimetype.
    pub async fn get_deleted(
        &self,
        ctx: &AuthenticationContext,
        mimetype: &str,
    ) -> AntboxResult<Vec<DeletedNodeSummary>> {
        if !ctx.is_admin() {
            return Err(AntboxError::Forbidden(
                "Only admins read audit streams".to_string(),
            ));
        }

        let streams = self.repository.streams_with_mimetype(mimetype).await?;
        let mut summaries = Vec::new();
        for (key, records) in streams {
            let Some(deletion) = records
                .iter()
                .rev()
                .find(|r| r.event_type == NODE_DELETED)
            else {
                continue;
            };
            summaries.push(DeletedNodeSummary {
                uuid: key.uuid,
                title: deletion
                    .payload
                    .get("title")
                    .and_then(|t| t.as_str())
                    .unwrap_or_default()
                    .to_string(),
                deleted_at: deletion.occurred_on,
                deleted_by: deletion.user_email.clone(),
            });
        }
        summaries.sort_by(|a, b| b.deleted_at.cmp(&a.deleted_at));
        Ok(summaries)
    }
}
