// Copyright (c) 2026 antbox.io
// SPDX-License-Identifier: AGPL-3.0

//! Node Service Proxy
//!
//! Per-invocation wrapper around [`NodeService`] with the authentication
//! context already bound. A fresh proxy is created for every feature
//! invocation; the snapshot means feature code cannot substitute another
//! principal, and mutating the context it was handed has no effect here.

use std::sync::Arc;

use bytes::Bytes;
use serde_json::{Map, Value};

use crate::application::node_service::{Breadcrumb, CreateNodeInput, ExportBundle, NodeService};
use crate::domain::auth::AuthenticationContext;
use crate::domain::error::AntboxResult;
use crate::domain::filter::NodeFilters;
use crate::domain::node::Node;
use crate::domain::repository::NodeFilterResult;

#[derive(Clone)]
pub struct NodeServiceProxy {
    service: Arc<NodeService>,
    ctx: AuthenticationContext,
}

impl NodeServiceProxy {
    pub fn new(service: Arc<NodeService>, ctx: AuthenticationContext) -> Self {
        Self { service, ctx }
    }

    /// The context this proxy is bound to.
    pub fn context(&self) -> &AuthenticationContext {
        &self.ctx
    }

    pub async fn get(&self, key: &str) -> AntboxResult<Node> {
        self.service.get(&self.ctx, key).await
    }

    pub async fn list(&self, parent: Option<&str>) -> AntboxResult<Vec<Node>> {
        self.service.list(&self.ctx, parent).await
    }

    pub async fn find(
        &self,
        filters: &NodeFilters,
        page_size: usize,
        page_token: u64,
    ) -> AntboxResult<NodeFilterResult> {
        self.service.find(&self.ctx, filters, page_size, page_token).await
    }

    pub async fn create(&self, input: CreateNodeInput) -> AntboxResult<Node> {
        self.service.create(&self.ctx, input).await
    }

    pub async fn create_file(&self, content: Bytes, input: CreateNodeInput) -> AntboxResult<Node> {
        self.service.create_file(&self.ctx, content, input).await
    }

    pub async fn update(&self, key: &str, patch: Map<String, Value>) -> AntboxResult<Node> {
        self.service.update(&self.ctx, key, patch).await
    }

    pub async fn update_file(&self, key: &str, content: Bytes) -> AntboxResult<Node> {
        self.service.update_file(&self.ctx, key, content).await
    }

    pub async fn delete(&self, key: &str) -> AntboxResult<()> {
        self.service.delete(&self.ctx, key).await
    }

    pub async fn copy(&self, key: &str, parent: &str) -> AntboxResult<Node> {
        self.service.copy(&self.ctx, key, parent).await
    }

    pub async fn duplicate(&self, key: &str) -> AntboxResult<Node> {
        self.service.duplicate(&self.ctx, key).await
    }

    pub async fn export(&self, key: &str) -> AntboxResult<ExportBundle> {
        self.service.export(&self.ctx, key).await
    }

    pub async fn breadcrumbs(&self, key: &str) -> AntboxResult<Vec<Breadcrumb>> {
        self.service.breadcrumbs(&self.ctx, key).await
    }

    pub async fn evaluate(&self, key: &str) -> AntboxResult<Vec<Node>> {
        self.service.evaluate(&self.ctx, key).await
    }

    pub async fn lock(&self, key: &str, unlock_authorized_groups: Vec<String>) -> AntboxResult<Node> {
        self.service.lock(&self.ctx, key, unlock_authorized_groups).await
    }

    pub async fn unlock(&self, key: &str) -> AntboxResult<Node> {
        self.service.unlock(&self.ctx, key).await
    }
}
