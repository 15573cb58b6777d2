// Copyright (c) 2026 antbox.io
// SPDX-License-Identifier: AGPL-3.0

//! HTTP surface tests: status mapping of the error taxonomy and the
//! anonymous-principal fallback, driven through the axum router with
//! tower's oneshot harness.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use antbox_core::application::rate_limiter::FeatureRateLimiter;
use antbox_core::application::tenant::Tenant;
use antbox_core::domain::auth::RejectAllTokenVerifier;
use antbox_core::domain::builtins::ADMINS_GROUP_UUID;
use antbox_core::infrastructure::ai::DeterministicAiModel;
use antbox_core::presentation::api::{app, AppState};
use antbox_core::presentation::auth::Authenticator;

async fn router() -> (axum::Router, Arc<Tenant>) {
    let tenant = Tenant::in_memory(
        "default",
        FeatureRateLimiter::default(),
        Arc::new(DeterministicAiModel::new()),
    )
    .await
    .unwrap();
    let state = Arc::new(AppState::new(
        vec![tenant.clone()],
        "default",
        Authenticator::new(Arc::new(RejectAllTokenVerifier)),
    ));
    (app(state), tenant)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}

#[tokio::test]
async fn test_missing_node_maps_to_404() {
    let (router, _tenant) = router().await;
    let response = router
        .oneshot(
            Request::builder()
                .uri("/v2/nodes/does-not-exist-0001")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "NodeNotFoundError");
}

#[tokio::test]
async fn test_anonymous_create_under_root_is_forbidden() {
    let (router, _tenant) = router().await;
    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v2/nodes")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({
                        "title": "Docs",
                        "mimetype": "application/vnd.antbox.folder",
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "ForbiddenError");
}

#[tokio::test]
async fn test_api_key_header_authenticates_admin_flow() {
    let (router, tenant) = router().await;
    let admin = tenant.elevated_context();
    let key = tenant
        .api_keys
        .create(&admin, ADMINS_GROUP_UUID, None)
        .await
        .unwrap();

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v2/nodes")
                .header("content-type", "application/json")
                .header("x-api-key", &key.secret)
                .body(Body::from(
                    json!({
                        "title": "Docs",
                        "mimetype": "application/vnd.antbox.folder",
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["title"], "Docs");
    assert!(body["uuid"].as_str().is_some());

    // Root grants Read to authenticated principals only, so the anonymous
    // listing of the root is refused outright.
    let response = router
        .oneshot(
            Request::builder()
                .uri("/v2/nodes")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_unknown_tenant_is_bad_request() {
    let (router, _tenant) = router().await;
    let response = router
        .oneshot(
            Request::builder()
                .uri("/v2/nodes/whatever-000000")
                .header("x-tenant", "ghost")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_validation_error_maps_to_400() {
    let (router, tenant) = router().await;
    let admin = tenant.elevated_context();
    let key = tenant
        .api_keys
        .create(&admin, ADMINS_GROUP_UUID, None)
        .await
        .unwrap();

    // Smart folder without filters fails validation.
    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v2/nodes")
                .header("content-type", "application/json")
                .header("x-api-key", &key.secret)
                .body(Body::from(
                    json!({
                        "title": "Smart",
                        "mimetype": "application/vnd.antbox.smartfolder",
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "ValidationError");
}
