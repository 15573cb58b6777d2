// Copyright (c) 2026 antbox.io
// SPDX-License-Identifier: AGPL-3.0

//! Permission Evaluator
//!
//! Boolean decision for (principal, folder, action). The node service
//! resolves the enclosing folder first — the node itself when it is a
//! folder, its parent otherwise — and asks this evaluator.
//!
//! Grant order: folder owner, root or admin group member, then the
//! anonymous / authenticated / group / advanced sets. Unauthenticated
//! principals evaluate only the anonymous set. A folder with empty sets is
//! accessible only to its owner and admins.

use crate::domain::auth::AuthenticationContext;
use crate::domain::builtins::{ADMINS_GROUP_UUID, ROOT_USER_EMAIL};
use crate::domain::node::{Node, Permission};

pub fn can(ctx: &AuthenticationContext, folder: &Node, wanted: Permission) -> bool {
    let principal = &ctx.principal;

    if principal.email == folder.owner {
        return true;
    }
    if principal.email == ROOT_USER_EMAIL || principal.is_member_of(ADMINS_GROUP_UUID) {
        return true;
    }

    let Some(permissions) = &folder.permissions else {
        return false;
    };

    if permissions.anonymous.contains(&wanted) {
        return true;
    }
    if ctx.is_anonymous() {
        return false;
    }

    if permissions.authenticated.contains(&wanted) {
        return true;
    }

    if let Some(group) = &folder.group {
        if principal.is_member_of(group) && permissions.group.contains(&wanted) {
            return true;
        }
    }

    permissions
        .advanced
        .iter()
        .any(|(group, granted)| principal.is_member_of(group) && granted.contains(&wanted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::auth::{AccessMode, Principal};
    use crate::domain::node::Permissions;
    use chrono::Utc;
    use std::collections::{BTreeMap, BTreeSet};

    fn folder(permissions: Option<Permissions>) -> Node {
        let mut node = Node::new_folder(
            "11111111-aaaa-bbbb-cccc-000000000001",
            "Docs",
            "owner@antbox.io",
            "default",
            Utc::now(),
        );
        node.group = Some("writers".to_string());
        node.permissions = permissions;
        node
    }

    fn ctx(email: &str, groups: &[&str]) -> AuthenticationContext {
        AuthenticationContext::new(
            "default",
            Principal::new(email, groups.iter().map(|g| g.to_string()).collect()),
            AccessMode::Direct,
        )
    }

    #[test]
    fn test_owner_and_admin_always_granted() {
        let node = folder(None);
        assert!(can(&ctx("owner@antbox.io", &[]), &node, Permission::Delete));
        assert!(can(&ctx(ROOT_USER_EMAIL, &[]), &node, Permission::Write));
        assert!(can(
            &ctx("ops@example.com", &[ADMINS_GROUP_UUID]),
            &node,
            Permission::Delete
        ));
    }

    #[test]
    fn test_empty_permission_sets_deny_everyone_else() {
        let node = folder(Some(Permissions::default()));
        assert!(!can(&ctx("user@example.com", &["writers"]), &node, Permission::Read));
    }

    #[test]
    fn test_authenticated_set() {
        let node = folder(Some(Permissions {
            authenticated: BTreeSet::from([Permission::Read]),
            ..Permissions::default()
        }));
        assert!(can(&ctx("user@example.com", &[]), &node, Permission::Read));
        assert!(!can(&ctx("user@example.com", &[]), &node, Permission::Write));
        // Anonymous principals never evaluate the authenticated set.
        let anon = AuthenticationContext::anonymous("default");
        assert!(!can(&anon, &node, Permission::Read));
    }

    #[test]
    fn test_anonymous_set_applies_to_everyone() {
        let node = folder(Some(Permissions {
            anonymous: BTreeSet::from([Permission::Read]),
            ..Permissions::default()
        }));
        let anon = AuthenticationContext::anonymous("default");
        assert!(can(&anon, &node, Permission::Read));
        assert!(!can(&anon, &node, Permission::Write));
    }

    #[test]
    fn test_primary_group_set() {
        let node = folder(Some(Permissions {
            group: BTreeSet::from([Permission::Read, Permission::Write]),
            ..Permissions::default()
        }));
        assert!(can(&ctx("w@example.com", &["writers"]), &node, Permission::Write));
        assert!(!can(&ctx("r@example.com", &["readers"]), &node, Permission::Write));
    }

    #[test]
    fn test_advanced_group_sets() {
        let node = folder(Some(Permissions {
            advanced: BTreeMap::from([(
                "auditors".to_string(),
                BTreeSet::from([Permission::Read, Permission::Export]),
            )]),
            ..Permissions::default()
        }));
        assert!(can(&ctx("a@example.com", &["auditors"]), &node, Permission::Export));
        assert!(!can(&ctx("a@example.com", &["auditors"]), &node, Permission::Delete));
        assert!(!can(&ctx("x@example.com", &["others"]), &node, Permission::Read));
    }
}
