// Copyright (c) 2026 antbox.io
// SPDX-License-Identifier: AGPL-3.0

//! Deterministic AI Model
//!
//! Test double for the opaque [`AiModel`] interface: chat echoes the last
//! user message, embeddings are a byte histogram. Real providers plug in
//! behind the same trait from outside the core.

use async_trait::async_trait;

use crate::domain::ai::{AiError, AiModel, ChatMessage, ChatRole};

#[derive(Default)]
pub struct DeterministicAiModel;

impl DeterministicAiModel {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AiModel for DeterministicAiModel {
    async fn chat(
        &self,
        _model: &str,
        messages: &[ChatMessage],
        _temperature: Option<f32>,
    ) -> Result<String, AiError> {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == ChatRole::User)
            .map(|m| m.content.as_str())
            .unwrap_or("");
        Ok(format!("echo: {}", last_user))
    }

    async fn embed(&self, _model: &str, text: &str) -> Result<Vec<f32>, AiError> {
        let mut histogram = vec![0f32; 16];
        for byte in text.bytes() {
            histogram[(byte % 16) as usize] += 1.0;
        }
        Ok(histogram)
    }
}
