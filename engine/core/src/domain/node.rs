// Copyright (c) 2026 antbox.io
// SPDX-License-Identifier: AGPL-3.0

//! Node Aggregate
//!
//! The universal content unit of the engine. A node is metadata plus an
//! optional binary body held by the storage provider. Folders carry the
//! permission sets and the automation hooks; smart folders carry a stored
//! query; file-like nodes carry `size`.
//!
//! Wire shape is camelCase JSON; timestamps are ISO-8601 via chrono.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::filter::NodeFilters;

/// Closed set of internal node kinds. Anything outside this set is treated
/// as a standard MIME type, i.e. a file-like node.
pub mod mimetypes {
    pub const FOLDER: &str = "application/vnd.antbox.folder";
    pub const SMART_FOLDER: &str = "application/vnd.antbox.smartfolder";
    pub const META_NODE: &str = "application/vnd.antbox.metanode";
    pub const FEATURE: &str = "application/vnd.antbox.feature";
    pub const ASPECT: &str = "application/vnd.antbox.aspect";

    pub const ALL_INTERNAL: &[&str] = &[FOLDER, SMART_FOLDER, META_NODE, FEATURE, ASPECT];
}

/// Coarse classification of a node's mimetype. Kind boundaries are frozen at
/// creation: `update` refuses mimetype changes that cross them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Folder,
    SmartFolder,
    MetaNode,
    File,
}

/// One grantable action on a node.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Permission {
    Read,
    Write,
    Delete,
    Export,
}

/// Per-folder permission record: what anonymous, authenticated, the folder's
/// primary group, and advanced group-keyed sets may do.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Permissions {
    pub anonymous: BTreeSet<Permission>,
    pub authenticated: BTreeSet<Permission>,
    pub group: BTreeSet<Permission>,
    pub advanced: BTreeMap<String, BTreeSet<Permission>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub uuid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fid: Option<String>,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub mimetype: String,
    /// Uuid of the enclosing folder. Empty only for the root folder.
    pub parent: String,
    pub owner: String,
    pub tenant: String,
    pub created_time: DateTime<Utc>,
    pub modified_time: DateTime<Utc>,

    /// Byte length of the stored body. Meaningful for file-like nodes only.
    #[serde(default)]
    pub size: u64,

    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub aspects: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub properties: Map<String, Value>,

    /// Primary group, carried on folders.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Permissions>,

    /// Smart-folder stored query.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<NodeFilters>,

    // Folder automation hooks: ordered action-invocation strings.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub on_create: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub on_update: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub on_delete: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups_allowed: Vec<String>,

    #[serde(default)]
    pub locked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked_by: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unlock_authorized_groups: Vec<String>,
}

impl Node {
    pub fn new(
        uuid: impl Into<String>,
        title: impl Into<String>,
        mimetype: impl Into<String>,
        owner: impl Into<String>,
        tenant: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            uuid: uuid.into(),
            fid: None,
            title: title.into(),
            description: None,
            mimetype: mimetype.into(),
            parent: crate::domain::builtins::ROOT_FOLDER_UUID.to_string(),
            owner: owner.into(),
            tenant: tenant.into(),
            created_time: at,
            modified_time: at,
            size: 0,
            tags: BTreeSet::new(),
            aspects: BTreeSet::new(),
            properties: Map::new(),
            group: None,
            permissions: None,
            filters: None,
            on_create: Vec::new(),
            on_update: Vec::new(),
            on_delete: Vec::new(),
            groups_allowed: Vec::new(),
            locked: false,
            locked_by: None,
            unlock_authorized_groups: Vec::new(),
        }
    }

    pub fn new_folder(
        uuid: impl Into<String>,
        title: impl Into<String>,
        owner: impl Into<String>,
        tenant: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        let mut node = Self::new(uuid, title, mimetypes::FOLDER, owner, tenant, at);
        node.permissions = Some(Permissions::default());
        node
    }

    pub fn kind(&self) -> NodeKind {
        kind_of(&self.mimetype)
    }

    pub fn is_folder(&self) -> bool {
        self.mimetype == mimetypes::FOLDER
    }

    pub fn is_smart_folder(&self) -> bool {
        self.mimetype == mimetypes::SMART_FOLDER
    }

    pub fn is_root(&self) -> bool {
        self.uuid == crate::domain::builtins::ROOT_FOLDER_UUID
    }

    /// File-like nodes carry a binary body and a size.
    pub fn is_file_like(&self) -> bool {
        self.kind() == NodeKind::File
    }

    /// Node as a flat JSON object for filter evaluation: top-level fields in
    /// camelCase, with `properties` kept nested for fallback lookup.
    pub fn to_filter_object(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

pub fn kind_of(mimetype: &str) -> NodeKind {
    match mimetype {
        mimetypes::FOLDER => NodeKind::Folder,
        mimetypes::SMART_FOLDER => NodeKind::SmartFolder,
        mimetypes::META_NODE => NodeKind::MetaNode,
        _ => NodeKind::File,
    }
}

/// Whether an input string has the shape of a node uuid: a generated id
/// matching `[A-Za-z0-9_-]{8,}` or the reserved builtin form `--name--`.
/// Everything else resolves as a friendly id.
pub fn looks_like_uuid(input: &str) -> bool {
    if input.starts_with("--") && input.ends_with("--") && input.len() > 4 {
        return true;
    }
    input.len() >= 8
        && input
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
