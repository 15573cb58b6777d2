// Copyright (c) 2026 antbox.io
// SPDX-License-Identifier: AGPL-3.0

//! Request Authentication
//!
//! Resolves the caller's principal from the request headers: an `X-Api-Key`
//! secret resolved through the api key service, or a bearer token checked
//! by the external [`TokenVerifier`]. Anything else falls back to the
//! anonymous principal.

use std::sync::Arc;

use axum::http::HeaderMap;

use crate::application::tenant::Tenant;
use crate::domain::auth::{
    AccessMode, AuthenticationContext, Principal, TokenVerifier,
};

pub const API_KEY_HEADER: &str = "x-api-key";
pub const TENANT_HEADER: &str = "x-tenant";

pub struct Authenticator {
    verifier: Arc<dyn TokenVerifier>,
}

impl Authenticator {
    pub fn new(verifier: Arc<dyn TokenVerifier>) -> Self {
        Self { verifier }
    }

    pub async fn authenticate(&self, tenant: &Tenant, headers: &HeaderMap) -> AuthenticationContext {
        if let Some(secret) = header(headers, API_KEY_HEADER) {
            if let Ok(Some(key)) = tenant.api_keys.get_by_secret(&secret).await {
                return AuthenticationContext::new(
                    &tenant.name,
                    Principal::new(
                        format!("{}@apikey.antbox.io", key.uuid),
                        vec![key.group],
                    ),
                    AccessMode::Direct,
                );
            }
        }

        if let Some(value) = header(headers, "authorization") {
            if let Some(token) = value.strip_prefix("Bearer ") {
                if let Some(principal) = self.verifier.verify(&tenant.name, token).await {
                    return AuthenticationContext::new(&tenant.name, principal, AccessMode::Direct);
                }
            }
        }

        AuthenticationContext::anonymous(&tenant.name)
    }
}

pub fn requested_tenant(headers: &HeaderMap) -> Option<String> {
    header(headers, TENANT_HEADER)
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::rate_limiter::FeatureRateLimiter;
    use crate::domain::auth::RejectAllTokenVerifier;
    use crate::domain::builtins;
    use crate::infrastructure::ai::DeterministicAiModel;

    async fn tenant() -> Arc<Tenant> {
        Tenant::in_memory(
            "default",
            FeatureRateLimiter::default(),
            Arc::new(DeterministicAiModel::new()),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_api_key_resolves_to_group_principal() {
        let tenant = tenant().await;
        let admin = tenant.elevated_context();
        let key = tenant
            .api_keys
            .create(&admin, builtins::ADMINS_GROUP_UUID, None)
            .await
            .unwrap();

        let authenticator = Authenticator::new(Arc::new(RejectAllTokenVerifier));
        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, key.secret.parse().unwrap());

        let ctx = authenticator.authenticate(&tenant, &headers).await;
        assert!(ctx.is_admin());
        assert!(ctx.principal.email.contains(&key.uuid));
    }

    #[tokio::test]
    async fn test_unverifiable_token_falls_back_to_anonymous() {
        let tenant = tenant().await;
        let authenticator = Authenticator::new(Arc::new(RejectAllTokenVerifier));

        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Bearer not-a-valid-token".parse().unwrap());
        let ctx = authenticator.authenticate(&tenant, &headers).await;
        assert!(ctx.is_anonymous());

        let ctx = authenticator.authenticate(&tenant, &HeaderMap::new()).await;
        assert!(ctx.is_anonymous());
    }
}
