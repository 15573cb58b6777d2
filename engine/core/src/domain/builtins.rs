// Copyright (c) 2026 antbox.io
// SPDX-License-Identifier: AGPL-3.0

//! Builtin Seed Data
//!
//! Compile-time constants for the reserved principals, groups, and the root
//! folder. These exist in every tenant and are immutable: the identity
//! services refuse to update or delete them, and the node service refuses to
//! mutate the root folder.
//!
//! Reserved uuids use the `--name--` form, which is disjoint from generated
//! v4 uuids.

use chrono::{DateTime, Utc};

use crate::domain::group::Group;
use crate::domain::node::{mimetypes, Node, Permission, Permissions};
use crate::domain::user::User;

/// Reserved uuid of the root folder. The root has no parent.
pub const ROOT_FOLDER_UUID: &str = "--root--";

/// Reserved uuid of the administrators group.
pub const ADMINS_GROUP_UUID: &str = "--admins--";

/// Reserved uuid of the anonymous group.
pub const ANONYMOUS_GROUP_UUID: &str = "--anonymous--";

/// Reserved uuid of the builtin RAG agent.
pub const RAG_AGENT_UUID: &str = "--rag--";

pub const ROOT_USER_EMAIL: &str = "root@antbox.io";
pub const ANONYMOUS_USER_EMAIL: &str = "anonymous@antbox.io";
pub const LOCK_SYSTEM_USER_EMAIL: &str = "lock-system@antbox.io";
pub const WORKFLOW_INSTANCE_USER_EMAIL: &str = "workflow-instance@antbox.io";

pub fn is_builtin_user(email: &str) -> bool {
    matches!(
        email,
        ROOT_USER_EMAIL | ANONYMOUS_USER_EMAIL | LOCK_SYSTEM_USER_EMAIL
            | WORKFLOW_INSTANCE_USER_EMAIL
    )
}

pub fn is_builtin_group(uuid: &str) -> bool {
    matches!(uuid, ADMINS_GROUP_UUID | ANONYMOUS_GROUP_UUID)
}

/// The root folder for a tenant. Readable by any authenticated principal,
/// writable only through the owner/admin path of the permission evaluator.
pub fn root_folder(tenant: &str, at: DateTime<Utc>) -> Node {
    let mut node = Node::new_folder(ROOT_FOLDER_UUID, "Root", ROOT_USER_EMAIL, tenant, at);
    node.parent = String::new();
    node.group = Some(ADMINS_GROUP_UUID.to_string());
    node.permissions = Some(Permissions {
        authenticated: [Permission::Read].into(),
        ..Permissions::default()
    });
    node
}

pub fn builtin_groups() -> Vec<Group> {
    vec![
        Group::builtin(ADMINS_GROUP_UUID, "Admins"),
        Group::builtin(ANONYMOUS_GROUP_UUID, "Anonymous"),
    ]
}

pub fn builtin_users() -> Vec<User> {
    vec![
        User::builtin(ROOT_USER_EMAIL, "root", ADMINS_GROUP_UUID),
        User::builtin(ANONYMOUS_USER_EMAIL, "anonymous", ANONYMOUS_GROUP_UUID),
        User::builtin(LOCK_SYSTEM_USER_EMAIL, "lock-system", ADMINS_GROUP_UUID),
        User::builtin(
            WORKFLOW_INSTANCE_USER_EMAIL,
            "workflow-instance",
            ADMINS_GROUP_UUID,
        ),
    ]
}
