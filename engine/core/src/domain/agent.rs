// Copyright (c) 2026 antbox.io
// SPDX-License-Identifier: AGPL-3.0

//! Agent Configuration Record
//!
//! Tenant-scoped AI configuration: bound to a model, with tool access flags
//! and a system prompt. The model itself stays behind the opaque
//! [`crate::domain::ai::AiModel`] interface.

use serde::{Deserialize, Serialize};

use crate::domain::repository::ConfigEntity;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub uuid: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Model identifier understood by the bound AiModel implementation.
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    pub system_prompt: String,
    /// Whether the agent may call exposed AI tools.
    #[serde(default)]
    pub use_tools: bool,
    #[serde(default)]
    pub builtin: bool,
}

impl Agent {
    pub fn new(uuid: impl Into<String>, title: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            title: title.into(),
            description: None,
            model: model.into(),
            temperature: None,
            system_prompt: String::new(),
            use_tools: false,
            builtin: false,
        }
    }
}

impl ConfigEntity for Agent {
    fn id(&self) -> &str {
        &self.uuid
    }
}
