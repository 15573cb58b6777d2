// Copyright (c) 2026 antbox.io
// SPDX-License-Identifier: AGPL-3.0

//! API Keys Service
//!
//! Secret-based principals. Admin-only create/delete; the authentication
//! layer resolves secrets through `get_by_secret`, which is deliberately
//! not permission-gated.

use std::sync::Arc;

use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::info;
use uuid::Uuid;

use crate::domain::api_key::{ApiKey, SECRET_MIN_LEN};
use crate::domain::auth::AuthenticationContext;
use crate::domain::error::{AntboxError, AntboxResult};
use crate::domain::group::Group;
use crate::domain::repository::ConfigCollection;

/// Generated secrets are twice the required minimum.
const SECRET_LEN: usize = SECRET_MIN_LEN * 2;

pub struct ApiKeysService {
    keys: Arc<dyn ConfigCollection<ApiKey>>,
    groups: Arc<dyn ConfigCollection<Group>>,
}

impl ApiKeysService {
    pub fn new(
        keys: Arc<dyn ConfigCollection<ApiKey>>,
        groups: Arc<dyn ConfigCollection<Group>>,
    ) -> Self {
        Self { keys, groups }
    }

    pub async fn create(
        &self,
        ctx: &AuthenticationContext,
        group: &str,
        description: Option<String>,
    ) -> AntboxResult<ApiKey> {
        if !ctx.is_admin() {
            return Err(AntboxError::Forbidden(
                "Only admins create api keys".to_string(),
            ));
        }
        if self.groups.get(group).await?.is_none() {
            return Err(AntboxError::BadRequest(format!(
                "Group {} does not exist",
                group
            )));
        }

        let key = ApiKey {
            uuid: Uuid::new_v4().to_string(),
            secret: generate_secret(),
            group: group.to_string(),
            active: true,
            description,
        };
        self.keys.save(&key).await?;
        info!(uuid = %key.uuid, group = %group, "api key created");
        Ok(key)
    }

    pub async fn get(&self, ctx: &AuthenticationContext, uuid: &str) -> AntboxResult<ApiKey> {
        if !ctx.is_admin() {
            return Err(AntboxError::Forbidden(
                "Only admins read api keys".to_string(),
            ));
        }
        self.keys
            .get(uuid)
            .await?
            .ok_or_else(|| AntboxError::NodeNotFound(uuid.to_string()))
    }

    /// Secrets are redacted in listings.
    pub async fn list(&self, ctx: &AuthenticationContext) -> AntboxResult<Vec<ApiKey>> {
        if !ctx.is_admin() {
            return Err(AntboxError::Forbidden(
                "Only admins list api keys".to_string(),
            ));
        }
        let keys = self.keys.list().await?;
        Ok(keys.iter().map(ApiKey::redacted).collect())
    }

    pub async fn delete(&self, ctx: &AuthenticationContext, uuid: &str) -> AntboxResult<()> {
        if !ctx.is_admin() {
            return Err(AntboxError::Forbidden(
                "Only admins delete api keys".to_string(),
            ));
        }
        self.keys.delete(uuid).await?;
        Ok(())
    }

    /// Resolve an active key by its secret. Called by the authentication
    /// layer before any principal exists.
    pub async fn get_by_secret(&self, secret: &str) -> AntboxResult<Option<ApiKey>> {
        let keys = self.keys.list().await?;
        Ok(keys.into_iter().find(|k| k.active && k.secret == secret))
    }
}

fn generate_secret() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SECRET_LEN)
        .map(char::from)
        .collect()
}
