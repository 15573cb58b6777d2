// Copyright (c) 2026 antbox.io
// SPDX-License-Identifier: AGPL-3.0

//! Group identity record, keyed by uuid.

use serde::{Deserialize, Serialize};

use crate::domain::repository::ConfigEntity;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub uuid: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub builtin: bool,
}

impl Group {
    pub fn new(uuid: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            title: title.into(),
            description: None,
            builtin: false,
        }
    }

    pub fn builtin(uuid: &str, title: &str) -> Self {
        Self {
            builtin: true,
            ..Self::new(uuid, title)
        }
    }
}

impl ConfigEntity for Group {
    fn id(&self) -> &str {
        &self.uuid
    }
}
