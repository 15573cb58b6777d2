// Copyright (c) 2026 antbox.io
// SPDX-License-Identifier: AGPL-3.0

//! Agents Service
//!
//! CRUD for agent configuration records plus chat, delegating generation to
//! the opaque AiModel. The builtin RAG agent answers over node content
//! retrieved with the caller's own permissions.

use std::sync::Arc;

use serde_json::json;

use crate::application::feature_service::FeatureService;
use crate::domain::agent::Agent;
use crate::domain::ai::{AiModel, ChatMessage};
use crate::domain::auth::AuthenticationContext;
use crate::domain::builtins::RAG_AGENT_UUID;
use crate::domain::error::{AntboxError, AntboxResult};
use crate::domain::repository::ConfigCollection;

pub struct AgentsService {
    agents: Arc<dyn ConfigCollection<Agent>>,
    model: Arc<dyn AiModel>,
    features: Arc<FeatureService>,
}

impl AgentsService {
    pub fn new(
        agents: Arc<dyn ConfigCollection<Agent>>,
        model: Arc<dyn AiModel>,
        features: Arc<FeatureService>,
    ) -> Self {
        Self {
            agents,
            model,
            features,
        }
    }

    /// Seed the builtin RAG agent. Idempotent; called once per tenant.
    pub async fn seed_builtins(&self) -> AntboxResult<()> {
        let mut rag = Agent::new(RAG_AGENT_UUID, "RAG", "default");
        rag.system_prompt =
            "Answer strictly from the provided document context.".to_string();
        rag.use_tools = true;
        rag.builtin = true;
        self.agents.save(&rag).await?;
        Ok(())
    }

    pub async fn create_or_replace(
        &self,
        ctx: &AuthenticationContext,
        agent: Agent,
    ) -> AntboxResult<Agent> {
        if !ctx.is_admin() {
            return Err(AntboxError::Forbidden("Only admins manage agents".to_string()));
        }
        if agent.uuid.trim().is_empty() || agent.title.trim().is_empty() {
            return Err(AntboxError::BadRequest(
                "Agents require uuid and title".to_string(),
            ));
        }
        if let Some(existing) = self.agents.get(&agent.uuid).await? {
            if existing.builtin {
                return Err(AntboxError::BadRequest(
                    "Builtin agents cannot be modified".to_string(),
                ));
            }
        }
        let agent = Agent {
            builtin: false,
            ..agent
        };
        self.agents.save(&agent).await?;
        Ok(agent)
    }

    pub async fn get(&self, _ctx: &AuthenticationContext, uuid: &str) -> AntboxResult<Agent> {
        self.agents
            .get(uuid)
            .await?
            .ok_or_else(|| AntboxError::NodeNotFound(uuid.to_string()))
    }

    pub async fn list(&self, _ctx: &AuthenticationContext) -> AntboxResult<Vec<Agent>> {
        Ok(self.agents.list().await?)
    }

    pub async fn delete(&self, ctx: &AuthenticationContext, uuid: &str) -> AntboxResult<()> {
        if !ctx.is_admin() {
            return Err(AntboxError::Forbidden("Only admins manage agents".to_string()));
        }
        let agent = self.get(ctx, uuid).await?;
        if agent.builtin {
            return Err(AntboxError::BadRequest(
                "Builtin agents cannot be deleted".to_string(),
            ));
        }
        self.agents.delete(uuid).await?;
        Ok(())
    }

    /// Multi-turn chat with an agent.
    pub async fn chat(
        &self,
        ctx: &AuthenticationContext,
        uuid: &str,
        message: &str,
        history: Vec<ChatMessage>,
    ) -> AntboxResult<String> {
        let agent = self.get(ctx, uuid).await?;
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(&agent.system_prompt));
        messages.extend(history);
        messages.push(ChatMessage::user(message));

        let reply = self
            .model
            .chat(&agent.model, &messages, agent.temperature)
            .await?;
        Ok(reply)
    }

    /// One-shot answer without history.
    pub async fn answer(
        &self,
        ctx: &AuthenticationContext,
        uuid: &str,
        question: &str,
    ) -> AntboxResult<String> {
        self.chat(ctx, uuid, question, Vec::new()).await
    }

    /// RAG chat: retrieve candidate nodes with the caller's permissions
    /// through the AI-tool surface and feed them as context.
    pub async fn rag_chat(
        &self,
        ctx: &AuthenticationContext,
        message: &str,
        history: Vec<ChatMessage>,
    ) -> AntboxResult<String> {
        let mut params = serde_json::Map::new();
        params.insert("pageSize".to_string(), json!(10));
        let context = self
            .features
            .run_ai_tool(ctx, "NodeService:find", params)
            .await?;

        let agent = self.get(ctx, RAG_AGENT_UUID).await?;
        let mut messages = Vec::with_capacity(history.len() + 3);
        messages.push(ChatMessage::system(&agent.system_prompt));
        messages.push(ChatMessage::system(format!(
            "Document context: {}",
            context
        )));
        messages.extend(history);
        messages.push(ChatMessage::user(message));

        let reply = self
            .model
            .chat(&agent.model, &messages, agent.temperature)
            .await?;
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::node_service::NodeService;
    use crate::application::rate_limiter::FeatureRateLimiter;
    use crate::domain::aspect::Aspect;
    use crate::domain::builtins;
    use crate::domain::feature::Feature;
    use crate::domain::group::Group;
    use crate::domain::repository::NodeRepository;
    use crate::infrastructure::ai::DeterministicAiModel;
    use crate::infrastructure::event_bus::EventBus;
    use crate::infrastructure::repositories::{InMemoryConfigCollection, InMemoryNodeRepository};
    use crate::infrastructure::storage::InMemoryStorageProvider;
    use chrono::Utc;

    async fn service() -> (AgentsService, AuthenticationContext) {
        let repository = Arc::new(InMemoryNodeRepository::new());
        repository
            .add(&builtins::root_folder("default", Utc::now()))
            .await
            .unwrap();
        let node_service = Arc::new(NodeService::new(
            repository,
            Arc::new(InMemoryStorageProvider::new()),
            Arc::new(InMemoryConfigCollection::<Aspect>::new()),
            EventBus::with_default_capacity(),
        ));
        let features = Arc::new(FeatureService::new(
            Arc::new(InMemoryConfigCollection::<Feature>::new()),
            Arc::new(InMemoryConfigCollection::<Group>::new()),
            node_service,
            FeatureRateLimiter::default(),
        ));
        let service = AgentsService::new(
            Arc::new(InMemoryConfigCollection::<Agent>::new()),
            Arc::new(DeterministicAiModel::new()),
            features,
        );
        service.seed_builtins().await.unwrap();
        (service, AuthenticationContext::elevated("default"))
    }

    #[tokio::test]
    async fn test_chat_delegates_to_model() {
        let (service, admin) = service().await;
        let mut agent = Agent::new("helper", "Helper", "default");
        agent.system_prompt = "be helpful".to_string();
        service.create_or_replace(&admin, agent).await.unwrap();

        let reply = service.chat(&admin, "helper", "hello", vec![]).await.unwrap();
        assert_eq!(reply, "echo: hello");
    }

    #[tokio::test]
    async fn test_builtin_rag_agent_is_protected() {
        let (service, admin) = service().await;
        assert!(matches!(
            service.delete(&admin, RAG_AGENT_UUID).await,
            Err(AntboxError::BadRequest(_))
        ));
        let result = service
            .create_or_replace(&admin, Agent::new(RAG_AGENT_UUID, "X", "default"))
            .await;
        assert!(matches!(result, Err(AntboxError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_rag_chat_runs() {
        let (service, admin) = service().await;
        let reply = service.rag_chat(&admin, "what is stored?", vec![]).await.unwrap();
        assert_eq!(reply, "echo: what is stored?");
    }
}
