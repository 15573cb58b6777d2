// Copyright (c) 2026 antbox.io
// SPDX-License-Identifier: AGPL-3.0

//! Aspects Service
//!
//! CRUD over the aspect collection. Mutations are admin-gated; the node
//! service reads the same collection when validating node properties, so a
//! saved aspect is enforced on the next node mutation.

use std::sync::Arc;

use crate::domain::aspect::Aspect;
use crate::domain::auth::AuthenticationContext;
use crate::domain::error::{AntboxError, AntboxResult, ValidationErrors};
use crate::domain::repository::ConfigCollection;

pub struct AspectsService {
    aspects: Arc<dyn ConfigCollection<Aspect>>,
}

impl AspectsService {
    pub fn new(aspects: Arc<dyn ConfigCollection<Aspect>>) -> Self {
        Self { aspects }
    }

    pub async fn create_or_replace(
        &self,
        ctx: &AuthenticationContext,
        aspect: Aspect,
    ) -> AntboxResult<Aspect> {
        if !ctx.is_admin() {
            return Err(AntboxError::Forbidden("Only admins manage aspects".to_string()));
        }
        let mut errors = ValidationErrors::new();
        if aspect.uuid.trim().is_empty() {
            errors.push("uuid", "uuid is required");
        }
        if aspect.title.trim().is_empty() {
            errors.push("title", "title is required");
        }
        let mut seen = std::collections::HashSet::new();
        for property in &aspect.properties {
            if !seen.insert(property.name.as_str()) {
                errors.push(
                    format!("properties.{}", property.name),
                    "duplicate property name",
                );
            }
        }
        errors.into_result()?;

        if let Some(existing) = self.aspects.get(&aspect.uuid).await? {
            if existing.builtin {
                return Err(AntboxError::BadRequest(
                    "Builtin aspects cannot be modified".to_string(),
                ));
            }
        }
        let aspect = Aspect {
            builtin: false,
            ..aspect
        };
        self.aspects.save(&aspect).await?;
        Ok(aspect)
    }

    pub async fn get(&self, _ctx: &AuthenticationContext, uuid: &str) -> AntboxResult<Aspect> {
        self.aspects
            .get(uuid)
            .await?
            .ok_or_else(|| AntboxError::NodeNotFound(uuid.to_string()))
    }

    pub async fn list(&self, _ctx: &AuthenticationContext) -> AntboxResult<Vec<Aspect>> {
        Ok(self.aspects.list().await?)
    }

    pub async fn delete(&self, ctx: &AuthenticationContext, uuid: &str) -> AntboxResult<()> {
        if !ctx.is_admin() {
            return Err(AntboxError::Forbidden("Only admins manage aspects".to_string()));
        }
        let aspect = self.get(ctx, uuid).await?;
        if aspect.builtin {
            return Err(AntboxError::BadRequest(
                "Builtin aspects cannot be deleted".to_string(),
            ));
        }
        self.aspects.delete(uuid).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::repositories::InMemoryConfigCollection;

    #[tokio::test]
    async fn test_admin_gate_and_validation() {
        let service = AspectsService::new(Arc::new(InMemoryConfigCollection::<Aspect>::new()));
        let admin = AuthenticationContext::elevated("default");
        let anon = AuthenticationContext::anonymous("default");

        assert!(matches!(
            service.create_or_replace(&anon, Aspect::new("a", "A")).await,
            Err(AntboxError::Forbidden(_))
        ));
        assert!(matches!(
            service.create_or_replace(&admin, Aspect::new("", "")).await,
            Err(AntboxError::Validation(_))
        ));

        let saved = service
            .create_or_replace(&admin, Aspect::new("invoice", "Invoice"))
            .await
            .unwrap();
        assert_eq!(saved.uuid, "invoice");
        assert_eq!(service.list(&admin).await.unwrap().len(), 1);

        service.delete(&admin, "invoice").await.unwrap();
        assert!(service.list(&admin).await.unwrap().is_empty());
    }
}
