// Copyright (c) 2026 antbox.io
// SPDX-License-Identifier: AGPL-3.0

//! API Key - Secret-Based Principal
//!
//! The secret is the credential; the group grants the authority. The
//! authentication layer resolves `X-Api-Key` headers through `getBySecret`.

use serde::{Deserialize, Serialize};

use crate::domain::repository::ConfigEntity;

/// Minimum length of generated secrets.
pub const SECRET_MIN_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKey {
    pub uuid: String,
    pub secret: String,
    pub group: String,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn default_active() -> bool {
    true
}

impl ApiKey {
    /// Redacted copy for listings: only a prefix of the secret survives.
    pub fn redacted(&self) -> Self {
        let visible: String = self.secret.chars().take(4).collect();
        Self {
            secret: format!("{}****", visible),
            ..self.clone()
        }
    }
}

impl ConfigEntity for ApiKey {
    fn id(&self) -> &str {
        &self.uuid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redaction_hides_secret() {
        let key = ApiKey {
            uuid: "k1".to_string(),
            secret: "super-secret-value-123456".to_string(),
            group: "integrations".to_string(),
            active: true,
            description: None,
        };
        let redacted = key.redacted();
        assert_eq!(redacted.secret, "supe****");
        assert_eq!(redacted.uuid, key.uuid);
    }
}
