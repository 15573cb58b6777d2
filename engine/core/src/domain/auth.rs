// Copyright (c) 2026 antbox.io
// SPDX-License-Identifier: AGPL-3.0

// Authentication Context - Principal + Tenant + Access Mode
//
// Every core operation takes a context identifying who is calling, for which
// tenant, and through which channel. The context is a plain value: services
// never mutate it, and the node service proxy snapshots it so feature code
// cannot forge a different principal.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::builtins::{ADMINS_GROUP_UUID, ANONYMOUS_USER_EMAIL, ROOT_USER_EMAIL};

/// Channel through which an operation entered the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessMode {
    /// A direct API call by an end user.
    Direct,
    /// An action run, either manual or event-triggered.
    Action,
    /// An AI agent tool call.
    Ai,
}

/// The authenticated actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub email: String,
    #[serde(default)]
    pub groups: Vec<String>,
}

impl Principal {
    pub fn new(email: impl Into<String>, groups: Vec<String>) -> Self {
        Self {
            email: email.into(),
            groups,
        }
    }

    pub fn anonymous() -> Self {
        Self::new(ANONYMOUS_USER_EMAIL, vec![])
    }

    pub fn is_member_of(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g == group)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticationContext {
    pub tenant: String,
    pub principal: Principal,
    pub mode: AccessMode,
}

impl AuthenticationContext {
    pub fn new(tenant: impl Into<String>, principal: Principal, mode: AccessMode) -> Self {
        Self {
            tenant: tenant.into(),
            principal,
            mode,
        }
    }

    pub fn anonymous(tenant: impl Into<String>) -> Self {
        Self::new(tenant, Principal::anonymous(), AccessMode::Direct)
    }

    /// Context used by internal subscribers: root principal, admin group,
    /// action mode.
    pub fn elevated(tenant: impl Into<String>) -> Self {
        Self::new(
            tenant,
            Principal::new(ROOT_USER_EMAIL, vec![ADMINS_GROUP_UUID.to_string()]),
            AccessMode::Action,
        )
    }

    pub fn is_root(&self) -> bool {
        self.principal.email == ROOT_USER_EMAIL
    }

    pub fn is_admin(&self) -> bool {
        self.is_root() || self.principal.is_member_of(ADMINS_GROUP_UUID)
    }

    pub fn is_anonymous(&self) -> bool {
        self.principal.email == ANONYMOUS_USER_EMAIL
    }

    /// Derive a context with one extra group appended, used by `runAs`
    /// principal elevation.
    pub fn with_group(&self, group: &str) -> Self {
        let mut derived = self.clone();
        if !derived.principal.is_member_of(group) {
            derived.principal.groups.push(group.to_string());
        }
        derived
    }
}

/// External collaborator: verifies a bearer token against tenant keys and
/// yields the principal it asserts. Implementations live outside the core.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, tenant: &str, token: &str) -> Option<Principal>;
}

/// Verifier that rejects every token; the authentication layer then falls
/// back to the anonymous principal.
pub struct RejectAllTokenVerifier;

#[async_trait]
impl TokenVerifier for RejectAllTokenVerifier {
    async fn verify(&self, _tenant: &str, _token: &str) -> Option<Principal> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_detection() {
        let root = AuthenticationContext::elevated("default");
        assert!(root.is_admin());
        assert!(root.is_root());

        let admin = AuthenticationContext::new(
            "default",
            Principal::new("ops@example.com", vec![ADMINS_GROUP_UUID.to_string()]),
            AccessMode::Direct,
        );
        assert!(admin.is_admin());
        assert!(!admin.is_root());

        let editor = AuthenticationContext::new(
            "default",
            Principal::new("editor@example.com", vec!["editors".to_string()]),
            AccessMode::Direct,
        );
        assert!(!editor.is_admin());
    }

    #[test]
    fn test_with_group_appends_once() {
        let ctx = AuthenticationContext::anonymous("default");
        let derived = ctx.with_group("reviewers");
        assert!(derived.principal.is_member_of("reviewers"));
        let again = derived.with_group("reviewers");
        assert_eq!(
            again
                .principal
                .groups
                .iter()
                .filter(|g| *g == "reviewers")
                .count(),
            1
        );
        // The original context is untouched.
        assert!(!ctx.principal.is_member_of("reviewers"));
    }
}
