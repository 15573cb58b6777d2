// Copyright (c) 2026 antbox.io
// SPDX-License-Identifier: AGPL-3.0

//! Users & Groups Service
//!
//! Identity CRUD atop the configuration repository. Builtin users and
//! groups are always present and immutable; create and delete require
//! admin, a user may update their own record, and email is never mutable.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::domain::auth::AuthenticationContext;
use crate::domain::builtins::{self, is_builtin_group, is_builtin_user};
use crate::domain::error::{AntboxError, AntboxResult};
use crate::domain::group::Group;
use crate::domain::repository::ConfigCollection;
use crate::domain::user::User;

pub struct UsersGroupsService {
    users: Arc<dyn ConfigCollection<User>>,
    groups: Arc<dyn ConfigCollection<Group>>,
}

impl UsersGroupsService {
    pub fn new(
        users: Arc<dyn ConfigCollection<User>>,
        groups: Arc<dyn ConfigCollection<Group>>,
    ) -> Self {
        Self { users, groups }
    }

    /// Seed the builtin identities. Idempotent; called once per tenant.
    pub async fn seed_builtins(&self) -> AntboxResult<()> {
        for group in builtins::builtin_groups() {
            self.groups.save(&group).await?;
        }
        for user in builtins::builtin_users() {
            self.users.save(&user).await?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    pub async fn create_user(
        &self,
        ctx: &AuthenticationContext,
        user: User,
    ) -> AntboxResult<User> {
        if !ctx.is_admin() {
            return Err(AntboxError::Forbidden("Only admins create users".to_string()));
        }
        if is_builtin_user(&user.email) {
            return Err(AntboxError::BadRequest(format!(
                "{} is a builtin user",
                user.email
            )));
        }
        if self.users.get(&user.email).await?.is_some() {
            return Err(AntboxError::Conflict(user.email.clone()));
        }
        if self.groups.get(&user.group).await?.is_none() {
            return Err(AntboxError::BadRequest(format!(
                "Primary group {} does not exist",
                user.group
            )));
        }
        let user = User {
            builtin: false,
            ..user
        };
        self.users.save(&user).await?;
        info!(email = %user.email, "user created");
        Ok(user)
    }

    /// Admins update anyone; a user may update their own record. Email and
    /// the builtin flag never change.
    pub async fn update_user(
        &self,
        ctx: &AuthenticationContext,
        email: &str,
        update: User,
    ) -> AntboxResult<User> {
        if !ctx.is_admin() && ctx.principal.email != email {
            return Err(AntboxError::Forbidden(
                "Users may only update their own record".to_string(),
            ));
        }
        let existing = self.get_user_record(email).await?;
        if existing.builtin {
            return Err(AntboxError::BadRequest(format!(
                "{} is a builtin user",
                email
            )));
        }
        if update.email != email {
            return Err(AntboxError::BadRequest("Email is not mutable".to_string()));
        }
        let updated = User {
            email: existing.email,
            builtin: false,
            ..update
        };
        self.users.save(&updated).await?;
        Ok(updated)
    }

    pub async fn delete_user(&self, ctx: &AuthenticationContext, email: &str) -> AntboxResult<()> {
        if !ctx.is_admin() {
            return Err(AntboxError::Forbidden("Only admins delete users".to_string()));
        }
        let user = self.get_user_record(email).await?;
        if user.builtin {
            return Err(AntboxError::BadRequest(format!(
                "{} is a builtin user",
                email
            )));
        }
        self.users.delete(email).await?;
        info!(email = %email, "user deleted");
        Ok(())
    }

    /// A user's own record is readable by its owner; everything else needs
    /// admin.
    pub async fn get_user(&self, ctx: &AuthenticationContext, email: &str) -> AntboxResult<User> {
        if !ctx.is_admin() && ctx.principal.email != email {
            return Err(AntboxError::Forbidden(
                "Not authorized to read this user".to_string(),
            ));
        }
        self.get_user_record(email).await
    }

    pub async fn list_users(&self, ctx: &AuthenticationContext) -> AntboxResult<Vec<User>> {
        if !ctx.is_admin() {
            return Err(AntboxError::Forbidden("Only admins list users".to_string()));
        }
        Ok(self.users.list().await?)
    }

    async fn get_user_record(&self, email: &str) -> AntboxResult<User> {
        self.users
            .get(email)
            .await?
            .ok_or_else(|| AntboxError::NodeNotFound(email.to_string()))
    }

    // ------------------------------------------------------------------
    // Groups
    // ------------------------------------------------------------------

    pub async fn create_group(
        &self,
        ctx: &AuthenticationContext,
        mut group: Group,
    ) -> AntboxResult<Group> {
        if !ctx.is_admin() {
            return Err(AntboxError::Forbidden("Only admins create groups".to_string()));
        }
        if group.uuid.is_empty() {
            group.uuid = Uuid::new_v4().to_string();
        }
        if is_builtin_group(&group.uuid) {
            return Err(AntboxError::BadRequest(format!(
                "{} is a builtin group",
                group.uuid
            )));
        }
        if self.groups.get(&group.uuid).await?.is_some() {
            return Err(AntboxError::Conflict(group.uuid.clone()));
        }
        group.builtin = false;
        self.groups.save(&group).await?;
        info!(uuid = %group.uuid, "group created");
        Ok(group)
    }

    pub async fn update_group(
        &self,
        ctx: &AuthenticationContext,
        uuid: &str,
        update: Group,
    ) -> AntboxResult<Group> {
        if !ctx.is_admin() {
            return Err(AntboxError::Forbidden("Only admins update groups".to_string()));
        }
        let existing = self.get_group(ctx, uuid).await?;
        if existing.builtin {
            return Err(AntboxError::BadRequest(format!(
                "{} is a builtin group",
                uuid
            )));
        }
        let updated = Group {
            uuid: existing.uuid,
            builtin: false,
            ..update
        };
        self.groups.save(&updated).await?;
        Ok(updated)
    }

    pub async fn delete_group(&self, ctx: &AuthenticationContext, uuid: &str) -> AntboxResult<()> {
        if !ctx.is_admin() {
            return Err(AntboxError::Forbidden("Only admins delete groups".to_string()));
        }
        let group = self.get_group(ctx, uuid).await?;
        if group.builtin {
            return Err(AntboxError::BadRequest(format!(
                "{} is a builtin group",
                uuid
            )));
        }
        self.groups.delete(uuid).await?;
        Ok(())
    }

    pub async fn get_group(&self, _ctx: &AuthenticationContext, uuid: &str) -> AntboxResult<Group> {
        self.groups
            .get(uuid)
            .await?
            .ok_or_else(|| AntboxError::NodeNotFound(uuid.to_string()))
    }

    pub async fn list_groups(&self, _ctx: &AuthenticationContext) -> AntboxResult<Vec<Group>> {
        Ok(self.groups.list().await?)
    }
}
