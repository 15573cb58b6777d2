// Copyright (c) 2026 antbox.io
// SPDX-License-Identifier: AGPL-3.0

//! Tenant Container
//!
//! Wires one tenant's services around its own adapters and event bus, seeds
//! the builtin data, and attaches the internal subscribers (feature
//! reactions and audit logging). The bus is a per-tenant dependency: tests
//! substitute deterministic adapters freely.

use std::sync::Arc;

use chrono::Utc;

use crate::application::agents_service::AgentsService;
use crate::application::api_keys_service::ApiKeysService;
use crate::application::aspects_service::AspectsService;
use crate::application::audit_service::AuditLogService;
use crate::application::feature_service::FeatureService;
use crate::application::node_service::NodeService;
use crate::application::rate_limiter::FeatureRateLimiter;
use crate::application::users_groups_service::UsersGroupsService;
use crate::domain::agent::Agent;
use crate::domain::ai::AiModel;
use crate::domain::api_key::ApiKey;
use crate::domain::aspect::Aspect;
use crate::domain::auth::AuthenticationContext;
use crate::domain::builtins;
use crate::domain::error::{AntboxError, AntboxResult};
use crate::domain::feature::Feature;
use crate::domain::group::Group;
use crate::domain::repository::{AuditRepository, ConfigCollection, NodeRepository};
use crate::domain::storage::StorageProvider;
use crate::domain::user::User;
use crate::infrastructure::event_bus::{EventBus, SubscriptionToken};
use crate::infrastructure::repositories::{
    InMemoryAuditRepository, InMemoryConfigCollection, InMemoryNodeRepository,
};
use crate::infrastructure::storage::InMemoryStorageProvider;

/// Adapters one tenant runs on.
pub struct TenantAdapters {
    pub nodes: Arc<dyn NodeRepository>,
    pub storage: Arc<dyn StorageProvider>,
    pub audit: Arc<dyn AuditRepository>,
    pub aspects: Arc<dyn ConfigCollection<Aspect>>,
    pub features: Arc<dyn ConfigCollection<Feature>>,
    pub users: Arc<dyn ConfigCollection<User>>,
    pub groups: Arc<dyn ConfigCollection<Group>>,
    pub api_keys: Arc<dyn ConfigCollection<ApiKey>>,
    pub agents: Arc<dyn ConfigCollection<Agent>>,
}

impl TenantAdapters {
    pub fn in_memory() -> Self {
        Self {
            nodes: Arc::new(InMemoryNodeRepository::new()),
            storage: Arc::new(InMemoryStorageProvider::new()),
            audit: Arc::new(InMemoryAuditRepository::new()),
            aspects: Arc::new(InMemoryConfigCollection::<Aspect>::new()),
            features: Arc::new(InMemoryConfigCollection::<Feature>::new()),
            users: Arc::new(InMemoryConfigCollection::<User>::new()),
            groups: Arc::new(InMemoryConfigCollection::<Group>::new()),
            api_keys: Arc::new(InMemoryConfigCollection::<ApiKey>::new()),
            agents: Arc::new(InMemoryConfigCollection::<Agent>::new()),
        }
    }
}

pub struct Tenant {
    pub name: String,
    pub bus: EventBus,
    pub node_service: Arc<NodeService>,
    pub feature_service: Arc<FeatureService>,
    pub aspects: Arc<AspectsService>,
    pub users_groups: Arc<UsersGroupsService>,
    pub api_keys: Arc<ApiKeysService>,
    pub audit: Arc<AuditLogService>,
    pub agents: Arc<AgentsService>,
    subscriptions: Vec<SubscriptionToken>,
}

impl Tenant {
    /// Build a tenant on the given adapters, seed builtins, and attach the
    /// internal subscribers. The rate limiter is process-wide and shared
    /// across tenants.
    pub async fn new(
        name: &str,
        adapters: TenantAdapters,
        limiter: FeatureRateLimiter,
        model: Arc<dyn AiModel>,
    ) -> AntboxResult<Arc<Tenant>> {
        let bus = EventBus::with_default_capacity();

        let node_service = Arc::new(NodeService::new(
            adapters.nodes.clone(),
            adapters.storage.clone(),
            adapters.aspects.clone(),
            bus.clone(),
        ));
        let feature_service = Arc::new(FeatureService::new(
            adapters.features.clone(),
            adapters.groups.clone(),
            node_service.clone(),
            limiter,
        ));
        let aspects = Arc::new(AspectsService::new(adapters.aspects.clone()));
        let users_groups = Arc::new(UsersGroupsService::new(
            adapters.users.clone(),
            adapters.groups.clone(),
        ));
        let api_keys = Arc::new(ApiKeysService::new(
            adapters.api_keys.clone(),
            adapters.groups.clone(),
        ));
        let audit = Arc::new(AuditLogService::new(adapters.audit.clone()));
        let agents = Arc::new(AgentsService::new(
            adapters.agents.clone(),
            model,
            feature_service.clone(),
        ));

        // Seed data precedes subscriptions: nobody audits the seeds.
        users_groups.seed_builtins().await?;
        agents.seed_builtins().await?;
        match adapters.nodes.add(&builtins::root_folder(name, Utc::now())).await {
            Ok(()) => {}
            Err(crate::domain::repository::RepositoryError::Duplicate(_)) => {}
            Err(e) => return Err(AntboxError::from(e)),
        }

        let subscriptions = vec![
            feature_service.clone().subscribe(&bus),
            audit.clone().subscribe(&bus),
        ];

        Ok(Arc::new(Tenant {
            name: name.to_string(),
            bus,
            node_service,
            feature_service,
            aspects,
            users_groups,
            api_keys,
            audit,
            agents,
            subscriptions,
        }))
    }

    /// In-memory tenant for development and tests.
    pub async fn in_memory(
        name: &str,
        limiter: FeatureRateLimiter,
        model: Arc<dyn AiModel>,
    ) -> AntboxResult<Arc<Tenant>> {
        Self::new(name, TenantAdapters::in_memory(), limiter, model).await
    }

    /// Elevated internal context for this tenant.
    pub fn elevated_context(&self) -> AuthenticationContext {
        AuthenticationContext::elevated(&self.name)
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }
}
