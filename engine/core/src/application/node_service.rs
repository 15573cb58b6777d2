// Copyright (c) 2026 antbox.io
// SPDX-License-Identifier: AGPL-3.0

//! Node Service
//!
//! Composes the node repository, the storage provider, and the event bus
//! for one tenant, and owns every invariant of the content graph: parent
//! resolution, kind boundaries, permission enforcement, lock semantics,
//! aspect property validation, and event emission.
//!
//! All operations take an [`AuthenticationContext`] and return
//! [`AntboxResult`]; nothing throws across this surface.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::aspect::Aspect;
use crate::domain::auth::AuthenticationContext;
use crate::domain::builtins::ROOT_FOLDER_UUID;
use crate::domain::error::{AntboxError, AntboxResult, ValidationErrors};
use crate::domain::events::{NodeChanges, NodeEvent};
use crate::domain::filter::{Filter, FilterOperator, NodeFilters};
use crate::domain::node::{
    kind_of, looks_like_uuid, mimetypes, Node, NodeKind, Permission, Permissions,
};
use crate::domain::permission;
use crate::domain::repository::{ConfigCollection, NodeFilterResult, NodeRepository};
use crate::domain::storage::StorageProvider;
use crate::infrastructure::event_bus::EventBus;

/// Metadata accepted by `create` and `create_file`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateNodeInput {
    pub title: String,
    pub mimetype: String,
    pub parent: Option<String>,
    pub fid: Option<String>,
    pub description: Option<String>,
    pub tags: std::collections::BTreeSet<String>,
    pub aspects: std::collections::BTreeSet<String>,
    pub properties: Map<String, Value>,
    pub group: Option<String>,
    pub permissions: Option<Permissions>,
    pub filters: Option<NodeFilters>,
    pub on_create: Vec<String>,
    pub on_update: Vec<String>,
    pub on_delete: Vec<String>,
    pub groups_allowed: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Breadcrumb {
    pub uuid: String,
    pub title: String,
}

/// Stored body plus the name/type pair `export` returns.
#[derive(Debug, Clone)]
pub struct ExportBundle {
    pub name: String,
    pub mimetype: String,
    pub content: Bytes,
}

/// Attributes `update` refuses to touch. The mimetype is handled apart:
/// changes are allowed within the same kind only.
const IMMUTABLE_FIELDS: &[&str] = &["uuid", "fid", "createdTime", "tenant", "size"];

pub struct NodeService {
    repository: Arc<dyn NodeRepository>,
    storage: Arc<dyn StorageProvider>,
    aspects: Arc<dyn ConfigCollection<Aspect>>,
    bus: EventBus,
}

impl NodeService {
    pub fn new(
        repository: Arc<dyn NodeRepository>,
        storage: Arc<dyn StorageProvider>,
        aspects: Arc<dyn ConfigCollection<Aspect>>,
        bus: EventBus,
    ) -> Self {
        Self {
            repository,
            storage,
            aspects,
            bus,
        }
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Resolve a node by uuid or friendly id and enforce Read permission.
    pub async fn get(&self, ctx: &AuthenticationContext, key: &str) -> AntboxResult<Node> {
        let node = self.resolve(key).await?;
        self.require(ctx, &node, Permission::Read).await?;
        Ok(node)
    }

    /// Direct children of a folder (default root), filtered by read
    /// permission.
    pub async fn list(
        &self,
        ctx: &AuthenticationContext,
        parent: Option<&str>,
    ) -> AntboxResult<Vec<Node>> {
        let parent = self.resolve(parent.unwrap_or(ROOT_FOLDER_UUID)).await?;
        if !parent.is_folder() {
            return Err(AntboxError::FolderNotFound(parent.uuid));
        }
        self.require(ctx, &parent, Permission::Read).await?;

        let children = self.children_of(&parent.uuid).await?;
        let mut visible = Vec::with_capacity(children.len());
        for child in children {
            let enclosing = if child.is_folder() { &child } else { &parent };
            if permission::can(ctx, enclosing, Permission::Read) {
                visible.push(child.clone());
            }
        }
        Ok(visible)
    }

    /// Filtered query delegated to the repository, post-filtered by read
    /// permission.
    pub async fn find(
        &self,
        ctx: &AuthenticationContext,
        filters: &NodeFilters,
        page_size: usize,
        page_token: u64,
    ) -> AntboxResult<NodeFilterResult> {
        let mut result = self.repository.filter(filters, page_size, page_token).await?;
        let mut folders: HashMap<String, Node> = HashMap::new();
        let mut visible = Vec::with_capacity(result.nodes.len());
        for node in result.nodes {
            if self.readable(ctx, &node, &mut folders).await? {
                visible.push(node);
            }
        }
        result.nodes = visible;
        Ok(result)
    }

    /// Ordered ancestor chain root→node.
    pub async fn breadcrumbs(
        &self,
        ctx: &AuthenticationContext,
        key: &str,
    ) -> AntboxResult<Vec<Breadcrumb>> {
        let node = self.get(ctx, key).await?;
        let mut chain = vec![Breadcrumb {
            uuid: node.uuid.clone(),
            title: node.title.clone(),
        }];
        let mut cursor = node;
        while !cursor.is_root() {
            let parent = self
                .repository
                .get_by_id(&cursor.parent)
                .await?
                .ok_or_else(|| AntboxError::FolderNotFound(cursor.parent.clone()))?;
            chain.push(Breadcrumb {
                uuid: parent.uuid.clone(),
                title: parent.title.clone(),
            });
            cursor = parent;
        }
        chain.reverse();
        Ok(chain)
    }

    /// Stored body of a file-like node, with Export permission.
    pub async fn export(
        &self,
        ctx: &AuthenticationContext,
        key: &str,
    ) -> AntboxResult<ExportBundle> {
        let node = self.resolve(key).await?;
        self.require(ctx, &node, Permission::Export).await?;
        if !node.is_file_like() {
            return Err(AntboxError::BadRequest(format!(
                "Node {} has no binary body",
                node.uuid
            )));
        }
        let content = self.storage.get(&node.uuid).await?;
        Ok(ExportBundle {
            name: node.title,
            mimetype: node.mimetype,
            content,
        })
    }

    /// Execute a smart folder's stored query.
    pub async fn evaluate(
        &self,
        ctx: &AuthenticationContext,
        key: &str,
    ) -> AntboxResult<Vec<Node>> {
        let node = self.get(ctx, key).await?;
        if !node.is_smart_folder() {
            return Err(AntboxError::BadRequest(format!(
                "Node {} is not a smart folder",
                node.uuid
            )));
        }
        let filters = node
            .filters
            .ok_or_else(|| AntboxError::BadRequest("Smart folder has no filters".to_string()))?;

        let mut matches = Vec::new();
        let mut page_token = 1;
        loop {
            let page = self.repository.filter(&filters, 250, page_token).await?;
            matches.extend(page.nodes);
            match page.next_page_token {
                Some(next) => page_token = next,
                None => break,
            }
        }

        let mut folders = HashMap::new();
        let mut visible = Vec::with_capacity(matches.len());
        for node in matches {
            if self.readable(ctx, &node, &mut folders).await? {
                visible.push(node);
            }
        }
        Ok(visible)
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Create a metadata-only node: folder, smart folder, or metanode.
    pub async fn create(
        &self,
        ctx: &AuthenticationContext,
        input: CreateNodeInput,
    ) -> AntboxResult<Node> {
        match kind_of(&input.mimetype) {
            NodeKind::Folder | NodeKind::SmartFolder | NodeKind::MetaNode => {}
            NodeKind::File => {
                return Err(AntboxError::BadRequest(
                    "Nodes with a binary body are created through createFile".to_string(),
                ))
            }
        }
        let node = self.materialize(ctx, input).await?;
        self.repository.add(&node).await?;
        info!(uuid = %node.uuid, mimetype = %node.mimetype, "node created");
        self.bus
            .publish(NodeEvent::created(node.clone(), &ctx.principal.email, node.modified_time));
        Ok(node)
    }

    /// Create a file-like node with its binary body.
    pub async fn create_file(
        &self,
        ctx: &AuthenticationContext,
        content: Bytes,
        input: CreateNodeInput,
    ) -> AntboxResult<Node> {
        if kind_of(&input.mimetype) != NodeKind::File {
            return Err(AntboxError::BadRequest(format!(
                "Mimetype {} is not file-like",
                input.mimetype
            )));
        }
        let mut node = self.materialize(ctx, input).await?;
        node.size = content.len() as u64;
        self.storage.put(&node.uuid, content).await?;
        self.repository.add(&node).await?;
        info!(uuid = %node.uuid, size = node.size, "file node created");
        self.bus
            .publish(NodeEvent::created(node.clone(), &ctx.principal.email, node.modified_time));
        Ok(node)
    }

    /// Partial metadata update. `uuid`, `fid`, `createdTime`, and the node
    /// kind are immutable; a `parent` change is a move and is checked for
    /// cycles.
    pub async fn update(
        &self,
        ctx: &AuthenticationContext,
        key: &str,
        patch: Map<String, Value>,
    ) -> AntboxResult<Node> {
        let node = self.resolve(key).await?;
        if node.is_root() {
            return Err(AntboxError::BadRequest("The root folder is immutable".to_string()));
        }
        self.ensure_unlocked_for(ctx, &node)?;
        self.require(ctx, &node, Permission::Write).await?;

        let before = serde_json::to_value(&node)
            .map_err(|e| AntboxError::Unknown(e.to_string()))?;
        let Value::Object(mut object) = before.clone() else {
            return Err(AntboxError::Unknown("node serialization".to_string()));
        };

        for (field, value) in &patch {
            if IMMUTABLE_FIELDS.contains(&field.as_str())
                && object.get(field).unwrap_or(&Value::Null) != value
            {
                return Err(AntboxError::BadRequest(format!(
                    "Field {} is immutable",
                    field
                )));
            }
            if field == "mimetype" {
                let new_mimetype = value.as_str().unwrap_or_default();
                if kind_of(new_mimetype) != node.kind() {
                    return Err(AntboxError::BadRequest(
                        "Mimetype changes cannot cross kind boundaries".to_string(),
                    ));
                }
            }
            object.insert(field.clone(), value.clone());
        }

        let mut updated: Node = serde_json::from_value(Value::Object(object))
            .map_err(|e| AntboxError::BadRequest(format!("Invalid patch: {}", e)))?;
        updated.uuid = node.uuid.clone();
        updated.created_time = node.created_time;
        updated.tenant = node.tenant.clone();
        updated.modified_time = Utc::now();

        if updated.parent != node.parent {
            self.check_move(&node, &updated.parent, ctx).await?;
        }
        self.validate_aspects(&updated).await?;

        let changes = diff(&before, &updated, &patch)?;
        self.repository.update(&updated).await?;
        debug!(uuid = %updated.uuid, fields = ?patch.keys().collect::<Vec<_>>(), "node updated");
        self.bus.publish(NodeEvent::updated(
            updated.clone(),
            changes,
            &ctx.principal.email,
            updated.modified_time,
        ));
        Ok(updated)
    }

    /// Replace the stored body of a file-like node.
    pub async fn update_file(
        &self,
        ctx: &AuthenticationContext,
        key: &str,
        content: Bytes,
    ) -> AntboxResult<Node> {
        let node = self.resolve(key).await?;
        self.ensure_unlocked_for(ctx, &node)?;
        self.require(ctx, &node, Permission::Write).await?;
        if !node.is_file_like() {
            return Err(AntboxError::BadRequest(format!(
                "Node {} has no binary body",
                node.uuid
            )));
        }

        let old_size = node.size;
        let mut updated = node;
        updated.size = content.len() as u64;
        updated.modified_time = Utc::now();
        self.storage.put(&updated.uuid, content).await?;
        self.repository.update(&updated).await?;

        let mut old_values = Map::new();
        old_values.insert("size".to_string(), Value::from(old_size));
        let mut new_values = Map::new();
        new_values.insert("size".to_string(), Value::from(updated.size));
        self.bus.publish(NodeEvent::updated(
            updated.clone(),
            NodeChanges {
                old_values,
                new_values,
            },
            &ctx.principal.email,
            updated.modified_time,
        ));
        Ok(updated)
    }

    /// Delete a node; folders delete their descendants depth-first under
    /// the same context. One `NodeDeleted` event per removed node.
    pub async fn delete(&self, ctx: &AuthenticationContext, key: &str) -> AntboxResult<()> {
        let node = self.resolve(key).await?;
        if node.is_root() {
            return Err(AntboxError::BadRequest("The root folder is immutable".to_string()));
        }
        self.ensure_unlocked_for(ctx, &node)?;
        self.require(ctx, &node, Permission::Delete).await?;
        self.delete_recursive(ctx, node).await
    }

    /// Deep copy of a node (and descendants) into another folder. New
    /// uuids, metadata preserved, timestamps reset.
    pub async fn copy(
        &self,
        ctx: &AuthenticationContext,
        key: &str,
        parent: &str,
    ) -> AntboxResult<Node> {
        let source = self.get(ctx, key).await?;
        let target = self.resolve(parent).await?;
        if !target.is_folder() {
            return Err(AntboxError::FolderNotFound(target.uuid));
        }
        self.require(ctx, &target, Permission::Write).await?;
        if target.is_root() && !source.is_folder() {
            return Err(AntboxError::BadRequest(
                "Only folders may live under the root".to_string(),
            ));
        }
        self.copy_recursive(ctx, source, target.uuid.clone(), None).await
    }

    /// Copy a node next to itself.
    pub async fn duplicate(&self, ctx: &AuthenticationContext, key: &str) -> AntboxResult<Node> {
        let source = self.get(ctx, key).await?;
        let parent = source.parent.clone();
        let title = format!("{} (copy)", source.title);
        let target = self.resolve(&parent).await?;
        self.require(ctx, &target, Permission::Write).await?;
        self.copy_recursive(ctx, source, parent, Some(title)).await
    }

    /// Lock a node against mutations by anyone but admins, the locker, and
    /// the authorized groups.
    pub async fn lock(
        &self,
        ctx: &AuthenticationContext,
        key: &str,
        unlock_authorized_groups: Vec<String>,
    ) -> AntboxResult<Node> {
        let node = self.resolve(key).await?;
        self.ensure_unlocked_for(ctx, &node)?;
        self.require(ctx, &node, Permission::Write).await?;

        let mut patch = Map::new();
        patch.insert("locked".to_string(), Value::Bool(true));
        patch.insert(
            "lockedBy".to_string(),
            Value::String(ctx.principal.email.clone()),
        );
        patch.insert(
            "unlockAuthorizedGroups".to_string(),
            serde_json::to_value(&unlock_authorized_groups)
                .map_err(|e| AntboxError::Unknown(e.to_string()))?,
        );
        self.apply_lock_patch(ctx, node, patch).await
    }

    /// Release a lock. Allowed for admins, the original locker, and
    /// members of the authorized groups.
    pub async fn unlock(&self, ctx: &AuthenticationContext, key: &str) -> AntboxResult<Node> {
        let node = self.resolve(key).await?;
        if !node.locked {
            return Err(AntboxError::BadRequest(format!(
                "Node {} is not locked",
                node.uuid
            )));
        }
        if !self.lock_bypass(ctx, &node) {
            return Err(AntboxError::Forbidden(format!(
                "Not authorized to unlock node {}",
                node.uuid
            )));
        }

        let mut patch = Map::new();
        patch.insert("locked".to_string(), Value::Bool(false));
        patch.insert("lockedBy".to_string(), Value::Null);
        patch.insert("unlockAuthorizedGroups".to_string(), Value::Array(vec![]));
        self.apply_lock_patch(ctx, node, patch).await
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    async fn resolve(&self, key: &str) -> AntboxResult<Node> {
        if looks_like_uuid(key) {
            if let Some(node) = self.repository.get_by_id(key).await? {
                return Ok(node);
            }
        }
        self.repository
            .get_by_fid(key)
            .await?
            .ok_or_else(|| AntboxError::NodeNotFound(key.to_string()))
    }

    /// The enclosing folder: the node itself when it is a folder, its
    /// parent otherwise.
    async fn enclosing_folder(&self, node: &Node) -> AntboxResult<Node> {
        if node.is_folder() {
            return Ok(node.clone());
        }
        self.repository
            .get_by_id(&node.parent)
            .await?
            .ok_or_else(|| AntboxError::FolderNotFound(node.parent.clone()))
    }

    async fn require(
        &self,
        ctx: &AuthenticationContext,
        node: &Node,
        wanted: Permission,
    ) -> AntboxResult<Node> {
        let folder = self.enclosing_folder(node).await?;
        if permission::can(ctx, &folder, wanted) {
            Ok(folder)
        } else {
            Err(AntboxError::Forbidden(format!(
                "{:?} denied on node {}",
                wanted, node.uuid
            )))
        }
    }

    async fn readable(
        &self,
        ctx: &AuthenticationContext,
        node: &Node,
        folders: &mut HashMap<String, Node>,
    ) -> AntboxResult<bool> {
        if node.is_folder() {
            return Ok(permission::can(ctx, node, Permission::Read));
        }
        if !folders.contains_key(&node.parent) {
            match self.repository.get_by_id(&node.parent).await? {
                Some(folder) => {
                    folders.insert(node.parent.clone(), folder);
                }
                None => return Ok(false),
            }
        }
        Ok(permission::can(ctx, &folders[&node.parent], Permission::Read))
    }

    fn ensure_unlocked_for(
        &self,
        ctx: &AuthenticationContext,
        node: &Node,
    ) -> AntboxResult<()> {
        if node.locked && !self.lock_bypass(ctx, node) {
            return Err(AntboxError::Locked(node.uuid.clone()));
        }
        Ok(())
    }

    fn lock_bypass(&self, ctx: &AuthenticationContext, node: &Node) -> bool {
        ctx.is_admin()
            || node.locked_by.as_deref() == Some(ctx.principal.email.as_str())
            || node
                .unlock_authorized_groups
                .iter()
                .any(|g| ctx.principal.is_member_of(g))
    }

    /// Validate metadata and build the node, without persisting it.
    async fn materialize(
        &self,
        ctx: &AuthenticationContext,
        input: CreateNodeInput,
    ) -> AntboxResult<Node> {
        let mut errors = ValidationErrors::new();
        if input.title.trim().is_empty() {
            errors.push("title", "title is required");
        }
        if input.mimetype.trim().is_empty() {
            errors.push("mimetype", "mimetype is required");
        }
        let kind = kind_of(&input.mimetype);
        if kind == NodeKind::SmartFolder && input.filters.is_none() {
            errors.push("filters", "smart folders require filters");
        }
        errors.into_result()?;

        let parent_key = input.parent.as_deref().unwrap_or(ROOT_FOLDER_UUID);
        let parent = self.resolve(parent_key).await.map_err(|_| {
            AntboxError::FolderNotFound(parent_key.to_string())
        })?;
        if !parent.is_folder() {
            return Err(AntboxError::FolderNotFound(parent.uuid));
        }
        if !permission::can(ctx, &parent, Permission::Write) {
            return Err(AntboxError::Forbidden(format!(
                "Write denied on folder {}",
                parent.uuid
            )));
        }
        if parent.is_root() && kind != NodeKind::Folder {
            return Err(AntboxError::BadRequest(
                "Only folders may live under the root".to_string(),
            ));
        }

        let now = Utc::now();
        let mut node = Node::new(
            Uuid::new_v4().to_string(),
            input.title,
            input.mimetype,
            ctx.principal.email.clone(),
            ctx.tenant.clone(),
            now,
        );
        node.parent = parent.uuid.clone();
        node.fid = input.fid;
        node.description = input.description;
        node.tags = input.tags;
        node.aspects = input.aspects;
        node.properties = input.properties;
        node.on_create = input.on_create;
        node.on_update = input.on_update;
        node.on_delete = input.on_delete;
        node.groups_allowed = input.groups_allowed;
        node.filters = input.filters;

        if kind == NodeKind::Folder {
            node.permissions = Some(input.permissions.unwrap_or_default());
            node.group = input
                .group
                .or_else(|| ctx.principal.groups.first().cloned());
        }

        self.validate_aspects(&node).await?;
        Ok(node)
    }

    /// Invariant 7: property values satisfy the validations of every
    /// attached aspect.
    async fn validate_aspects(&self, node: &Node) -> AntboxResult<()> {
        let mut errors = ValidationErrors::new();
        for aspect_uuid in &node.aspects {
            let Some(aspect) = self.aspects.get(aspect_uuid).await? else {
                errors.push("aspects", format!("aspect {} does not exist", aspect_uuid));
                continue;
            };
            match aspect.applies_to(node) {
                Ok(true) => aspect.validate_properties(&node.properties, &mut errors),
                Ok(false) => errors.push(
                    "aspects",
                    format!("aspect {} does not apply to this node", aspect_uuid),
                ),
                Err(e) => errors.push("aspects", e.to_string()),
            }
        }
        errors.into_result()
    }

    /// A folder cannot become a descendant of itself, and the target must
    /// accept the node's kind.
    async fn check_move(
        &self,
        node: &Node,
        new_parent: &str,
        ctx: &AuthenticationContext,
    ) -> AntboxResult<()> {
        let target = self
            .repository
            .get_by_id(new_parent)
            .await?
            .ok_or_else(|| AntboxError::FolderNotFound(new_parent.to_string()))?;
        if !target.is_folder() {
            return Err(AntboxError::FolderNotFound(target.uuid));
        }
        if !permission::can(ctx, &target, Permission::Write) {
            return Err(AntboxError::Forbidden(format!(
                "Write denied on folder {}",
                target.uuid
            )));
        }
        if target.is_root() && !node.is_folder() {
            return Err(AntboxError::BadRequest(
                "Only folders may live under the root".to_string(),
            ));
        }

        if node.is_folder() {
            let mut cursor = target;
            loop {
                if cursor.uuid == node.uuid {
                    return Err(AntboxError::BadRequest(
                        "A folder cannot be moved into its own descendants".to_string(),
                    ));
                }
                if cursor.is_root() {
                    break;
                }
                cursor = self
                    .repository
                    .get_by_id(&cursor.parent)
                    .await?
                    .ok_or_else(|| AntboxError::FolderNotFound(cursor.parent.clone()))?;
            }
        }
        Ok(())
    }

    async fn children_of(&self, parent_uuid: &str) -> AntboxResult<Vec<Node>> {
        let filters = NodeFilters::And(vec![Filter::new(
            "parent",
            FilterOperator::Equal,
            Value::String(parent_uuid.to_string()),
        )]);
        let mut children = Vec::new();
        let mut page_token = 1;
        loop {
            let page = self.repository.filter(&filters, 250, page_token).await?;
            children.extend(page.nodes);
            match page.next_page_token {
                Some(next) => page_token = next,
                None => break,
            }
        }
        Ok(children)
    }

    fn delete_recursive<'a>(
        &'a self,
        ctx: &'a AuthenticationContext,
        node: Node,
    ) -> BoxFuture<'a, AntboxResult<()>> {
        async move {
            if node.is_folder() {
                for child in self.children_of(&node.uuid).await? {
                    self.ensure_unlocked_for(ctx, &child)?;
                    self.delete_recursive(ctx, child).await?;
                }
            }
            if node.is_file_like() {
                // A missing blob must not block metadata removal.
                if let Err(e) = self.storage.delete(&node.uuid).await {
                    debug!(uuid = %node.uuid, error = %e, "blob delete failed");
                }
            }
            self.repository.delete(&node.uuid).await?;
            info!(uuid = %node.uuid, "node deleted");
            self.bus
                .publish(NodeEvent::deleted(node, &ctx.principal.email, Utc::now()));
            Ok(())
        }
        .boxed()
    }

    fn copy_recursive<'a>(
        &'a self,
        ctx: &'a AuthenticationContext,
        source: Node,
        parent: String,
        title: Option<String>,
    ) -> BoxFuture<'a, AntboxResult<Node>> {
        async move {
            let now = Utc::now();
            let mut copy = source.clone();
            copy.uuid = Uuid::new_v4().to_string();
            copy.fid = None;
            copy.parent = parent;
            copy.owner = ctx.principal.email.clone();
            copy.created_time = now;
            copy.modified_time = now;
            copy.locked = false;
            copy.locked_by = None;
            copy.unlock_authorized_groups = Vec::new();
            if let Some(title) = title {
                copy.title = title;
            }

            if source.is_file_like() {
                let content = self.storage.get(&source.uuid).await?;
                copy.size = content.len() as u64;
                self.storage.put(&copy.uuid, content).await?;
            }
            self.repository.add(&copy).await?;
            self.bus
                .publish(NodeEvent::created(copy.clone(), &ctx.principal.email, now));

            if source.is_folder() {
                for child in self.children_of(&source.uuid).await? {
                    self.copy_recursive(ctx, child, copy.uuid.clone(), None)
                        .await?;
                }
            }
            Ok(copy)
        }
        .boxed()
    }

    async fn apply_lock_patch(
        &self,
        ctx: &AuthenticationContext,
        node: Node,
        patch: Map<String, Value>,
    ) -> AntboxResult<Node> {
        let before = serde_json::to_value(&node)
            .map_err(|e| AntboxError::Unknown(e.to_string()))?;
        let Value::Object(mut object) = before.clone() else {
            return Err(AntboxError::Unknown("node serialization".to_string()));
        };
        for (field, value) in &patch {
            object.insert(field.clone(), value.clone());
        }
        let mut updated: Node = serde_json::from_value(Value::Object(object))
            .map_err(|e| AntboxError::Unknown(e.to_string()))?;
        updated.modified_time = Utc::now();

        let changes = diff(&before, &updated, &patch)?;
        self.repository.update(&updated).await?;
        self.bus.publish(NodeEvent::updated(
            updated.clone(),
            changes,
            &ctx.principal.email,
            updated.modified_time,
        ));
        Ok(updated)
    }
}

/// Old/new values for the fields a patch actually changed.
fn diff(
    before: &Value,
    after: &Node,
    patch: &Map<String, Value>,
) -> AntboxResult<NodeChanges> {
    let after = serde_json::to_value(after).map_err(|e| AntboxError::Unknown(e.to_string()))?;
    let mut old_values = Map::new();
    let mut new_values = Map::new();
    for field in patch.keys() {
        let old = before.get(field).cloned().unwrap_or(Value::Null);
        let new = after.get(field).cloned().unwrap_or(Value::Null);
        if old != new {
            old_values.insert(field.clone(), old);
            new_values.insert(field.clone(), new);
        }
    }
    Ok(NodeChanges {
        old_values,
        new_values,
    })
}
