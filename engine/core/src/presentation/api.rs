// Copyright (c) 2026 antbox.io
// SPDX-License-Identifier: AGPL-3.0

//! HTTP API (/v2)
//!
//! Thin axum surface over the tenant services. Handlers resolve the tenant
//! from the `X-Tenant` header (default tenant otherwise), authenticate the
//! caller, delegate, and map `AntboxError` codes to HTTP statuses:
//! NodeNotFound→404, Forbidden→403, BadRequest/Validation→400,
//! Conflict→409, Locked→423, TooMany→429, Unknown→500.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get, post};
use axum::{Json, Router};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::application::feature_service::{ExtensionRequest, ExtensionResponse};
use crate::application::node_service::CreateNodeInput;
use crate::application::tenant::Tenant;
use crate::domain::agent::Agent;
use crate::domain::ai::ChatMessage;
use crate::domain::aspect::Aspect;
use crate::domain::auth::AuthenticationContext;
use crate::domain::error::AntboxError;
use crate::domain::filter::NodeFilters;
use crate::domain::group::Group;
use crate::domain::user::User;
use crate::presentation::auth::{requested_tenant, Authenticator};

pub struct AppState {
    tenants: HashMap<String, Arc<Tenant>>,
    default_tenant: String,
    authenticator: Authenticator,
}

impl AppState {
    pub fn new(
        tenants: Vec<Arc<Tenant>>,
        default_tenant: &str,
        authenticator: Authenticator,
    ) -> Self {
        Self {
            tenants: tenants.into_iter().map(|t| (t.name.clone(), t)).collect(),
            default_tenant: default_tenant.to_string(),
            authenticator,
        }
    }

    async fn resolve(
        &self,
        headers: &HeaderMap,
    ) -> Result<(Arc<Tenant>, AuthenticationContext), ApiError> {
        let name = requested_tenant(headers).unwrap_or_else(|| self.default_tenant.clone());
        let tenant = self
            .tenants
            .get(&name)
            .cloned()
            .ok_or_else(|| ApiError(AntboxError::BadRequest(format!("Unknown tenant: {}", name))))?;
        let ctx = self.authenticator.authenticate(&tenant, headers).await;
        Ok((tenant, ctx))
    }
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        // Nodes
        .route("/v2/nodes", post(create_node).get(list_nodes))
        .route("/v2/nodes/-/upload", post(upload_node))
        .route("/v2/nodes/-/find", post(find_nodes))
        .route(
            "/v2/nodes/{uuid}",
            get(get_node).patch(update_node).delete(delete_node),
        )
        .route("/v2/nodes/{uuid}/-/content", axum::routing::put(update_node_content))
        .route("/v2/nodes/{uuid}/-/export", get(export_node))
        .route("/v2/nodes/{uuid}/-/evaluate", get(evaluate_node))
        .route("/v2/nodes/{uuid}/-/breadcrumbs", get(node_breadcrumbs))
        .route("/v2/nodes/{uuid}/-/copy", post(copy_node))
        .route("/v2/nodes/{uuid}/-/duplicate", post(duplicate_node))
        .route("/v2/nodes/{uuid}/-/lock", post(lock_node))
        .route("/v2/nodes/{uuid}/-/unlock", post(unlock_node))
        // Features
        .route("/v2/features", get(list_features))
        .route("/v2/features/-/actions", get(list_actions))
        .route("/v2/features/-/ai-tools", get(list_ai_tools))
        .route("/v2/features/-/extensions", get(list_extensions))
        .route(
            "/v2/features/{uuid}",
            get(get_feature).delete(delete_feature),
        )
        .route("/v2/features/{uuid}/-/export", get(export_feature))
        .route("/v2/features/{uuid}/-/run", post(run_action))
        .route("/v2/features/{uuid}/-/ai-tool", post(run_ai_tool))
        .route("/v2/features/{uuid}/-/extension", any(run_extension))
        // Aspects
        .route("/v2/aspects", get(list_aspects).post(save_aspect))
        .route("/v2/aspects/{uuid}", get(get_aspect).delete(delete_aspect))
        // Identity
        .route("/v2/users", get(list_users).post(create_user))
        .route(
            "/v2/users/{email}",
            get(get_user).patch(update_user).delete(delete_user),
        )
        .route("/v2/groups", get(list_groups).post(create_group))
        .route(
            "/v2/groups/{uuid}",
            get(get_group).patch(update_group).delete(delete_group),
        )
        .route("/v2/api-keys", get(list_api_keys).post(create_api_key))
        .route(
            "/v2/api-keys/{uuid}",
            get(get_api_key).delete(delete_api_key),
        )
        // Audit
        .route("/v2/audit/-/deleted", get(audit_deleted))
        .route("/v2/audit/{uuid}", get(audit_stream))
        // Agents
        .route("/v2/agents", get(list_agents).post(save_agent))
        .route("/v2/agents/rag/-/chat", post(rag_chat))
        .route("/v2/agents/{uuid}", get(get_agent).delete(delete_agent))
        .route("/v2/agents/{uuid}/-/chat", post(agent_chat))
        .route("/v2/agents/{uuid}/-/answer", post(agent_answer))
        .with_state(state)
}

// ----------------------------------------------------------------------
// Error mapping
// ----------------------------------------------------------------------

pub struct ApiError(AntboxError);

impl From<AntboxError> for ApiError {
    fn from(err: AntboxError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            AntboxError::NodeNotFound(_)
            | AntboxError::FolderNotFound(_)
            | AntboxError::FeatureNotFound(_) => StatusCode::NOT_FOUND,
            AntboxError::Forbidden(_) => StatusCode::FORBIDDEN,
            AntboxError::BadRequest(_) | AntboxError::Validation(_) => StatusCode::BAD_REQUEST,
            AntboxError::Conflict(_) => StatusCode::CONFLICT,
            AntboxError::Locked(_) => StatusCode::LOCKED,
            AntboxError::TooMany(_) => StatusCode::TOO_MANY_REQUESTS,
            AntboxError::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = json!({
            "error": {
                "code": self.0.code(),
                "message": self.0.to_string(),
            }
        });
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

// ----------------------------------------------------------------------
// Nodes
// ----------------------------------------------------------------------

async fn create_node(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(input): Json<CreateNodeInput>,
) -> ApiResult<Json<Value>> {
    let (tenant, ctx) = state.resolve(&headers).await?;
    let node = tenant.node_service.create(&ctx, input).await?;
    Ok(Json(serde_json::to_value(node).unwrap_or_default()))
}

#[derive(Deserialize)]
struct ListQuery {
    parent: Option<String>,
}

async fn list_nodes(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Value>> {
    let (tenant, ctx) = state.resolve(&headers).await?;
    let nodes = tenant
        .node_service
        .list(&ctx, query.parent.as_deref())
        .await?;
    Ok(Json(serde_json::to_value(nodes).unwrap_or_default()))
}

async fn upload_node(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> ApiResult<Json<Value>> {
    let (tenant, ctx) = state.resolve(&headers).await?;

    let mut content: Option<Bytes> = None;
    let mut metadata: Option<CreateNodeInput> = None;
    let mut file_name = None;
    let mut file_type = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AntboxError::BadRequest(format!("Malformed multipart body: {}", e)))?
    {
        let name = field.name().map(|n| n.to_string());
        match name.as_deref() {
            Some("file") => {
                file_name = field.file_name().map(|n| n.to_string());
                file_type = field.content_type().map(|t| t.to_string());
                content = Some(field.bytes().await.map_err(|e| {
                    AntboxError::BadRequest(format!("Unreadable file field: {}", e))
                })?);
            }
            Some("metadata") => {
                let raw = field.text().await.map_err(|e| {
                    AntboxError::BadRequest(format!("Unreadable metadata field: {}", e))
                })?;
                metadata = Some(serde_json::from_str(&raw).map_err(|e| {
                    AntboxError::BadRequest(format!("Invalid metadata: {}", e))
                })?);
            }
            _ => {}
        }
    }

    let content =
        content.ok_or_else(|| AntboxError::BadRequest("Missing file field".to_string()))?;
    let mut input = metadata.unwrap_or_default();
    if input.title.is_empty() {
        input.title = file_name.unwrap_or_else(|| "upload".to_string());
    }
    if input.mimetype.is_empty() {
        input.mimetype = file_type.unwrap_or_else(|| "application/octet-stream".to_string());
    }

    let node = tenant.node_service.create_file(&ctx, content, input).await?;
    Ok(Json(serde_json::to_value(node).unwrap_or_default()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct FindRequest {
    filters: NodeFilters,
    page_size: usize,
    page_token: u64,
}

impl Default for FindRequest {
    fn default() -> Self {
        Self {
            filters: NodeFilters::default(),
            page_size: 25,
            page_token: 1,
        }
    }
}

async fn find_nodes(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<FindRequest>,
) -> ApiResult<Json<Value>> {
    let (tenant, ctx) = state.resolve(&headers).await?;
    let result = tenant
        .node_service
        .find(&ctx, &request.filters, request.page_size, request.page_token)
        .await?;
    Ok(Json(json!({
        "nodes": result.nodes,
        "nextPageToken": result.next_page_token,
    })))
}

async fn get_node(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(uuid): Path<String>,
) -> ApiResult<Json<Value>> {
    let (tenant, ctx) = state.resolve(&headers).await?;
    let node = tenant.node_service.get(&ctx, &uuid).await?;
    Ok(Json(serde_json::to_value(node).unwrap_or_default()))
}

async fn update_node(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(uuid): Path<String>,
    Json(patch): Json<Map<String, Value>>,
) -> ApiResult<Json<Value>> {
    let (tenant, ctx) = state.resolve(&headers).await?;
    let node = tenant.node_service.update(&ctx, &uuid, patch).await?;
    Ok(Json(serde_json::to_value(node).unwrap_or_default()))
}

async fn update_node_content(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(uuid): Path<String>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let (tenant, ctx) = state.resolve(&headers).await?;
    let node = tenant.node_service.update_file(&ctx, &uuid, body).await?;
    Ok(Json(serde_json::to_value(node).unwrap_or_default()))
}

async fn delete_node(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(uuid): Path<String>,
) -> ApiResult<StatusCode> {
    let (tenant, ctx) = state.resolve(&headers).await?;
    tenant.node_service.delete(&ctx, &uuid).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn export_node(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(uuid): Path<String>,
) -> ApiResult<Response> {
    let (tenant, ctx) = state.resolve(&headers).await?;
    let bundle = tenant.node_service.export(&ctx, &uuid).await?;
    Ok((
        [
            (header::CONTENT_TYPE, bundle.mimetype.clone()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", bundle.name),
            ),
        ],
        bundle.content,
    )
        .into_response())
}

async fn evaluate_node(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(uuid): Path<String>,
) -> ApiResult<Json<Value>> {
    let (tenant, ctx) = state.resolve(&headers).await?;
    let nodes = tenant.node_service.evaluate(&ctx, &uuid).await?;
    Ok(Json(serde_json::to_value(nodes).unwrap_or_default()))
}

async fn node_breadcrumbs(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(uuid): Path<String>,
) -> ApiResult<Json<Value>> {
    let (tenant, ctx) = state.resolve(&headers).await?;
    let chain = tenant.node_service.breadcrumbs(&ctx, &uuid).await?;
    Ok(Json(serde_json::to_value(chain).unwrap_or_default()))
}

#[derive(Deserialize)]
struct CopyRequest {
    parent: String,
}

async fn copy_node(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(uuid): Path<String>,
    Json(request): Json<CopyRequest>,
) -> ApiResult<Json<Value>> {
    let (tenant, ctx) = state.resolve(&headers).await?;
    let node = tenant.node_service.copy(&ctx, &uuid, &request.parent).await?;
    Ok(Json(serde_json::to_value(node).unwrap_or_default()))
}

async fn duplicate_node(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(uuid): Path<String>,
) -> ApiResult<Json<Value>> {
    let (tenant, ctx) = state.resolve(&headers).await?;
    let node = tenant.node_service.duplicate(&ctx, &uuid).await?;
    Ok(Json(serde_json::to_value(node).unwrap_or_default()))
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct LockRequest {
    unlock_authorized_groups: Vec<String>,
}

async fn lock_node(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(uuid): Path<String>,
    Json(request): Json<LockRequest>,
) -> ApiResult<Json<Value>> {
    let (tenant, ctx) = state.resolve(&headers).await?;
    let node = tenant
        .node_service
        .lock(&ctx, &uuid, request.unlock_authorized_groups)
        .await?;
    Ok(Json(serde_json::to_value(node).unwrap_or_default()))
}

async fn unlock_node(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(uuid): Path<String>,
) -> ApiResult<Json<Value>> {
    let (tenant, ctx) = state.resolve(&headers).await?;
    let node = tenant.node_service.unlock(&ctx, &uuid).await?;
    Ok(Json(serde_json::to_value(node).unwrap_or_default()))
}

// ----------------------------------------------------------------------
// Features
// ----------------------------------------------------------------------

async fn list_features(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    let (tenant, ctx) = state.resolve(&headers).await?;
    let features = tenant.feature_service.list_features(&ctx).await?;
    Ok(Json(serde_json::to_value(features).unwrap_or_default()))
}

async fn list_actions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    let (tenant, ctx) = state.resolve(&headers).await?;
    let features = tenant.feature_service.list_actions(&ctx).await?;
    Ok(Json(serde_json::to_value(features).unwrap_or_default()))
}

async fn list_ai_tools(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    let (tenant, ctx) = state.resolve(&headers).await?;
    let features = tenant.feature_service.list_ai_tools(&ctx).await?;
    Ok(Json(serde_json::to_value(features).unwrap_or_default()))
}

async fn list_extensions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    let (tenant, ctx) = state.resolve(&headers).await?;
    let features = tenant.feature_service.list_extensions(&ctx).await?;
    Ok(Json(serde_json::to_value(features).unwrap_or_default()))
}

async fn get_feature(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(uuid): Path<String>,
) -> ApiResult<Json<Value>> {
    let (tenant, ctx) = state.resolve(&headers).await?;
    let feature = tenant.feature_service.get(&ctx, &uuid).await?;
    Ok(Json(serde_json::to_value(feature).unwrap_or_default()))
}

async fn delete_feature(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(uuid): Path<String>,
) -> ApiResult<StatusCode> {
    let (tenant, ctx) = state.resolve(&headers).await?;
    tenant.feature_service.delete(&ctx, &uuid).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn export_feature(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(uuid): Path<String>,
) -> ApiResult<Json<Value>> {
    let (tenant, ctx) = state.resolve(&headers).await?;
    Ok(Json(tenant.feature_service.export(&ctx, &uuid).await?))
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RunActionRequest {
    uuids: Vec<String>,
    params: Option<Map<String, Value>>,
}

async fn run_action(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(uuid): Path<String>,
    Json(request): Json<RunActionRequest>,
) -> ApiResult<Json<Value>> {
    let (tenant, ctx) = state.resolve(&headers).await?;
    let result = tenant
        .feature_service
        .run_action(&ctx, &uuid, &request.uuids, request.params)
        .await?;
    Ok(Json(result))
}

async fn run_ai_tool(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(uuid): Path<String>,
    Json(params): Json<Map<String, Value>>,
) -> ApiResult<Json<Value>> {
    let (tenant, ctx) = state.resolve(&headers).await?;
    let result = tenant.feature_service.run_ai_tool(&ctx, &uuid, params).await?;
    Ok(Json(result))
}

async fn run_extension(
    State(state): State<Arc<AppState>>,
    method: Method,
    headers: HeaderMap,
    Path(uuid): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> ApiResult<Response> {
    let (tenant, ctx) = state.resolve(&headers).await?;

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let request = if method == Method::GET {
        ExtensionRequest::get(query)
    } else if content_type.starts_with("application/json") {
        let value = serde_json::from_slice(&body)
            .map_err(|e| AntboxError::BadRequest(format!("Invalid JSON body: {}", e)))?;
        ExtensionRequest::post_json(value)
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        let fields = url::form_urlencoded::parse(&body)
            .into_owned()
            .collect::<HashMap<String, String>>();
        ExtensionRequest::post_form(fields)
    } else {
        ExtensionRequest::get(query)
    };

    let response = tenant
        .feature_service
        .run_extension(&ctx, &uuid, request)
        .await?;
    Ok(extension_into_response(response))
}

fn extension_into_response(response: ExtensionResponse) -> Response {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::OK);
    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, response.content_type);
    if let Some(name) = response.attachment_name {
        builder = builder.header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", name),
        );
    }
    builder
        .body(axum::body::Body::from(response.body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

// ----------------------------------------------------------------------
// Aspects
// ----------------------------------------------------------------------

async fn list_aspects(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    let (tenant, ctx) = state.resolve(&headers).await?;
    let aspects = tenant.aspects.list(&ctx).await?;
    Ok(Json(serde_json::to_value(aspects).unwrap_or_default()))
}

async fn get_aspect(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(uuid): Path<String>,
) -> ApiResult<Json<Value>> {
    let (tenant, ctx) = state.resolve(&headers).await?;
    let aspect = tenant.aspects.get(&ctx, &uuid).await?;
    Ok(Json(serde_json::to_value(aspect).unwrap_or_default()))
}

async fn save_aspect(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(aspect): Json<Aspect>,
) -> ApiResult<Json<Value>> {
    let (tenant, ctx) = state.resolve(&headers).await?;
    let aspect = tenant.aspects.create_or_replace(&ctx, aspect).await?;
    Ok(Json(serde_json::to_value(aspect).unwrap_or_default()))
}

async fn delete_aspect(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(uuid): Path<String>,
) -> ApiResult<StatusCode> {
    let (tenant, ctx) = state.resolve(&headers).await?;
    tenant.aspects.delete(&ctx, &uuid).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ----------------------------------------------------------------------
// Identity
// ----------------------------------------------------------------------

async fn list_users(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    let (tenant, ctx) = state.resolve(&headers).await?;
    let users = tenant.users_groups.list_users(&ctx).await?;
    Ok(Json(serde_json::to_value(users).unwrap_or_default()))
}

async fn create_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(user): Json<User>,
) -> ApiResult<Json<Value>> {
    let (tenant, ctx) = state.resolve(&headers).await?;
    let user = tenant.users_groups.create_user(&ctx, user).await?;
    Ok(Json(serde_json::to_value(user).unwrap_or_default()))
}

async fn get_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(email): Path<String>,
) -> ApiResult<Json<Value>> {
    let (tenant, ctx) = state.resolve(&headers).await?;
    let user = tenant.users_groups.get_user(&ctx, &email).await?;
    Ok(Json(serde_json::to_value(user).unwrap_or_default()))
}

async fn update_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(email): Path<String>,
    Json(user): Json<User>,
) -> ApiResult<Json<Value>> {
    let (tenant, ctx) = state.resolve(&headers).await?;
    let user = tenant.users_groups.update_user(&ctx, &email, user).await?;
    Ok(Json(serde_json::to_value(user).unwrap_or_default()))
}

async fn delete_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(email): Path<String>,
) -> ApiResult<StatusCode> {
    let (tenant, ctx) = state.resolve(&headers).await?;
    tenant.users_groups.delete_user(&ctx, &email).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_groups(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    let (tenant, ctx) = state.resolve(&headers).await?;
    let groups = tenant.users_groups.list_groups(&ctx).await?;
    Ok(Json(serde_json::to_value(groups).unwrap_or_default()))
}

async fn create_group(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(group): Json<Group>,
) -> ApiResult<Json<Value>> {
    let (tenant, ctx) = state.resolve(&headers).await?;
    let group = tenant.users_groups.create_group(&ctx, group).await?;
    Ok(Json(serde_json::to_value(group).unwrap_or_default()))
}

async fn get_group(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(uuid): Path<String>,
) -> ApiResult<Json<Value>> {
    let (tenant, ctx) = state.resolve(&headers).await?;
    let group = tenant.users_groups.get_group(&ctx, &uuid).await?;
    Ok(Json(serde_json::to_value(group).unwrap_or_default()))
}

async fn update_group(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(uuid): Path<String>,
    Json(group): Json<Group>,
) -> ApiResult<Json<Value>> {
    let (tenant, ctx) = state.resolve(&headers).await?;
    let group = tenant.users_groups.update_group(&ctx, &uuid, group).await?;
    Ok(Json(serde_json::to_value(group).unwrap_or_default()))
}

async fn delete_group(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(uuid): Path<String>,
) -> ApiResult<StatusCode> {
    let (tenant, ctx) = state.resolve(&headers).await?;
    tenant.users_groups.delete_group(&ctx, &uuid).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct CreateApiKeyRequest {
    group: String,
    description: Option<String>,
}

async fn list_api_keys(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    let (tenant, ctx) = state.resolve(&headers).await?;
    let keys = tenant.api_keys.list(&ctx).await?;
    Ok(Json(serde_json::to_value(keys).unwrap_or_default()))
}

async fn create_api_key(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<CreateApiKeyRequest>,
) -> ApiResult<Json<Value>> {
    let (tenant, ctx) = state.resolve(&headers).await?;
    let key = tenant
        .api_keys
        .create(&ctx, &request.group, request.description)
        .await?;
    Ok(Json(serde_json::to_value(key).unwrap_or_default()))
}

async fn get_api_key(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(uuid): Path<String>,
) -> ApiResult<Json<Value>> {
    let (tenant, ctx) = state.resolve(&headers).await?;
    let key = tenant.api_keys.get(&ctx, &uuid).await?;
    Ok(Json(serde_json::to_value(key).unwrap_or_default()))
}

async fn delete_api_key(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(uuid): Path<String>,
) -> ApiResult<StatusCode> {
    let (tenant, ctx) = state.resolve(&headers).await?;
    tenant.api_keys.delete(&ctx, &uuid).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ----------------------------------------------------------------------
// Audit
// ----------------------------------------------------------------------

async fn audit_stream(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(uuid): Path<String>,
) -> ApiResult<Json<Value>> {
    let (tenant, ctx) = state.resolve(&headers).await?;
    let records = tenant.audit.get_stream(&ctx, &uuid).await?;
    Ok(Json(serde_json::to_value(records).unwrap_or_default()))
}

#[derive(Deserialize)]
struct DeletedQuery {
    mimetype: String,
}

async fn audit_deleted(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<DeletedQuery>,
) -> ApiResult<Json<Value>> {
    let (tenant, ctx) = state.resolve(&headers).await?;
    let deleted = tenant.audit.get_deleted(&ctx, &query.mimetype).await?;
    Ok(Json(serde_json::to_value(deleted).unwrap_or_default()))
}

// ----------------------------------------------------------------------
// Agents
// ----------------------------------------------------------------------

async fn list_agents(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    let (tenant, ctx) = state.resolve(&headers).await?;
    let agents = tenant.agents.list(&ctx).await?;
    Ok(Json(serde_json::to_value(agents).unwrap_or_default()))
}

async fn save_agent(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(agent): Json<Agent>,
) -> ApiResult<Json<Value>> {
    let (tenant, ctx) = state.resolve(&headers).await?;
    let agent = tenant.agents.create_or_replace(&ctx, agent).await?;
    Ok(Json(serde_json::to_value(agent).unwrap_or_default()))
}

async fn get_agent(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(uuid): Path<String>,
) -> ApiResult<Json<Value>> {
    let (tenant, ctx) = state.resolve(&headers).await?;
    let agent = tenant.agents.get(&ctx, &uuid).await?;
    Ok(Json(serde_json::to_value(agent).unwrap_or_default()))
}

async fn delete_agent(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(uuid): Path<String>,
) -> ApiResult<StatusCode> {
    let (tenant, ctx) = state.resolve(&headers).await?;
    tenant.agents.delete(&ctx, &uuid).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct ChatRequest {
    message: String,
    #[serde(default)]
    history: Vec<ChatMessage>,
}

async fn agent_chat(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(uuid): Path<String>,
    Json(request): Json<ChatRequest>,
) -> ApiResult<Json<Value>> {
    let (tenant, ctx) = state.resolve(&headers).await?;
    let reply = tenant
        .agents
        .chat(&ctx, &uuid, &request.message, request.history)
        .await?;
    Ok(Json(json!({ "reply": reply })))
}

async fn agent_answer(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(uuid): Path<String>,
    Json(request): Json<ChatRequest>,
) -> ApiResult<Json<Value>> {
    let (tenant, ctx) = state.resolve(&headers).await?;
    let reply = tenant.agents.answer(&ctx, &uuid, &request.message).await?;
    Ok(Json(json!({ "reply": reply })))
}

async fn rag_chat(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> ApiResult<Json<Value>> {
    let (tenant, ctx) = state.resolve(&headers).await?;
    let reply = tenant
        .agents
        .rag_chat(&ctx, &request.message, request.history)
        .await?;
    Ok(Json(json!({ "reply": reply })))
}
