// Copyright (c) 2026 antbox.io
// SPDX-License-Identifier: AGPL-3.0

//! AI Model Interface (Anti-Corruption Layer)
//!
//! Opaque producer of text and embeddings. Agent chat delegates here; real
//! provider integrations are external collaborators behind this trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::error::AntboxError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

#[async_trait]
pub trait AiModel: Send + Sync {
    /// Generate the next assistant message for the conversation.
    async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        temperature: Option<f32>,
    ) -> Result<String, AiError>;

    /// Produce an embedding vector for the text.
    async fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>, AiError>;
}

#[derive(Debug, Error)]
pub enum AiError {
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider error: {0}")]
    Provider(String),
}

impl From<AiError> for AntboxError {
    fn from(err: AiError) -> Self {
        match err {
            AiError::ModelNotFound(m) => AntboxError::BadRequest(format!("Unknown model: {}", m)),
            AiError::Provider(message) => AntboxError::Unknown(message),
        }
    }
}
