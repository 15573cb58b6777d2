// Copyright (c) 2026 antbox.io
// SPDX-License-Identifier: AGPL-3.0

//! Feature Service
//!
//! Loads, validates, and executes features, and routes the three trigger
//! surfaces: manual/automatic actions, AI tools, and HTTP extensions. It
//! also subscribes to node events to run domain-wide automatic actions and
//! per-folder hooks.
//!
//! Every invocation passes the rate limiter and walks the
//! Queued → Validating → Executing → (Success | Error) state machine; there
//! is no retry, and handler errors never reach the publisher.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use futures::FutureExt;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::application::feature_runtime::{
    FeatureModule, InvocationState, ModuleRegistry, RunContext,
};
use crate::application::node_service::{CreateNodeInput, NodeService};
use crate::application::node_service_proxy::NodeServiceProxy;
use crate::application::rate_limiter::{FeatureRateLimiter, InvocationChannel};
use crate::domain::auth::{AccessMode, AuthenticationContext, Principal};
use crate::domain::builtins::ROOT_FOLDER_UUID;
use crate::domain::error::{AntboxError, AntboxResult};
use crate::domain::events::{NodeEvent, NodeEventKind};
use crate::domain::feature::{Feature, ParameterType, ReturnType, UUIDS_PARAMETER};
use crate::domain::group::Group;
use crate::domain::repository::ConfigCollection;
use crate::infrastructure::event_bus::{EventBus, SubscriptionToken};

/// Parsed HTTP request an extension receives: the reference path is
/// parse-then-invoke, never raw passthrough.
#[derive(Debug, Clone)]
pub struct ExtensionRequest {
    pub method: String,
    pub query: HashMap<String, String>,
    pub body: ExtensionBody,
}

#[derive(Debug, Clone)]
pub enum ExtensionBody {
    None,
    Json(Value),
    Form(HashMap<String, String>),
}

impl ExtensionRequest {
    pub fn get(query: HashMap<String, String>) -> Self {
        Self {
            method: "GET".to_string(),
            query,
            body: ExtensionBody::None,
        }
    }

    pub fn post_json(body: Value) -> Self {
        Self {
            method: "POST".to_string(),
            query: HashMap::new(),
            body: ExtensionBody::Json(body),
        }
    }

    pub fn post_form(fields: HashMap<String, String>) -> Self {
        Self {
            method: "POST".to_string(),
            query: HashMap::new(),
            body: ExtensionBody::Form(fields),
        }
    }
}

/// Response produced by an extension run, shaped by the feature's declared
/// return type.
#[derive(Debug, Clone)]
pub struct ExtensionResponse {
    pub status: u16,
    pub content_type: String,
    pub body: Bytes,
    /// Set for `file` returns: the response is served as an attachment.
    pub attachment_name: Option<String>,
}

pub struct FeatureService {
    features: Arc<dyn ConfigCollection<Feature>>,
    groups: Arc<dyn ConfigCollection<Group>>,
    registry: ModuleRegistry,
    node_service: Arc<NodeService>,
    limiter: FeatureRateLimiter,
}

impl FeatureService {
    pub fn new(
        features: Arc<dyn ConfigCollection<Feature>>,
        groups: Arc<dyn ConfigCollection<Group>>,
        node_service: Arc<NodeService>,
        limiter: FeatureRateLimiter,
    ) -> Self {
        Self {
            features,
            groups,
            registry: ModuleRegistry::new(),
            node_service,
            limiter,
        }
    }

    // ------------------------------------------------------------------
    // Catalog operations
    // ------------------------------------------------------------------

    /// Install or replace a feature: validate the configuration, check the
    /// `runAs` group exists, and materialize the module into the registry.
    pub async fn create_or_replace(
        &self,
        ctx: &AuthenticationContext,
        mut feature: Feature,
        module: Arc<dyn FeatureModule>,
    ) -> AntboxResult<Feature> {
        if !ctx.is_admin() {
            return Err(AntboxError::Forbidden(
                "Only admins manage features".to_string(),
            ));
        }
        feature.validate()?;
        if let Some(run_as) = &feature.run_as {
            if self.groups.get(run_as).await?.is_none() {
                return Err(AntboxError::BadRequest(format!(
                    "runAs group {} does not exist",
                    run_as
                )));
            }
        }

        let now = Utc::now();
        if let Some(existing) = self.features.get(&feature.uuid).await? {
            if existing.builtin {
                return Err(AntboxError::BadRequest(
                    "Builtin features cannot be modified".to_string(),
                ));
            }
            feature.created_time = existing.created_time;
        } else {
            feature.created_time = now;
        }
        feature.modified_time = now;

        self.features.save(&feature).await?;
        self.registry
            .register(&feature.uuid, feature.modified_time, module);
        Ok(feature)
    }

    pub async fn get(&self, ctx: &AuthenticationContext, uuid: &str) -> AntboxResult<Feature> {
        let feature = self.load(uuid).await?;
        if !self.visible(ctx, &feature) {
            return Err(AntboxError::Forbidden(format!(
                "Feature {} is not visible to this principal",
                uuid
            )));
        }
        Ok(feature)
    }

    /// Every feature the caller may see: admins and root see all, others
    /// only features whose `groupsAllowed` intersects their groups.
    pub async fn list_features(&self, ctx: &AuthenticationContext) -> AntboxResult<Vec<Feature>> {
        let features = self.features.list().await?;
        Ok(features
            .into_iter()
            .filter(|f| self.visible(ctx, f))
            .collect())
    }

    pub async fn list_actions(&self, ctx: &AuthenticationContext) -> AntboxResult<Vec<Feature>> {
        Ok(self
            .list_features(ctx)
            .await?
            .into_iter()
            .filter(|f| f.expose_action)
            .collect())
    }

    pub async fn list_ai_tools(&self, ctx: &AuthenticationContext) -> AntboxResult<Vec<Feature>> {
        Ok(self
            .list_features(ctx)
            .await?
            .into_iter()
            .filter(|f| f.expose_ai_tool)
            .collect())
    }

    pub async fn list_extensions(&self, ctx: &AuthenticationContext) -> AntboxResult<Vec<Feature>> {
        Ok(self
            .list_features(ctx)
            .await?
            .into_iter()
            .filter(|f| f.expose_extension)
            .collect())
    }

    pub async fn delete(&self, ctx: &AuthenticationContext, uuid: &str) -> AntboxResult<()> {
        if !ctx.is_admin() {
            return Err(AntboxError::Forbidden(
                "Only admins manage features".to_string(),
            ));
        }
        let feature = self.load(uuid).await?;
        if feature.builtin {
            return Err(AntboxError::BadRequest(
                "Builtin features cannot be deleted".to_string(),
            ));
        }
        self.features.delete(uuid).await?;
        self.registry.remove(uuid);
        Ok(())
    }

    /// Serialized configuration record of a feature.
    pub async fn export(&self, ctx: &AuthenticationContext, uuid: &str) -> AntboxResult<Value> {
        if !ctx.is_admin() {
            return Err(AntboxError::Forbidden(
                "Only admins export features".to_string(),
            ));
        }
        let feature = self.load(uuid).await?;
        serde_json::to_value(&feature).map_err(|e| AntboxError::Unknown(e.to_string()))
    }

    // ------------------------------------------------------------------
    // Execution paths
    // ------------------------------------------------------------------

    /// Manual action run over a set of nodes. Nodes that fail to resolve
    /// with the caller's context or do not satisfy the feature's filters
    /// are dropped before the module runs.
    pub async fn run_action(
        &self,
        ctx: &AuthenticationContext,
        uuid: &str,
        node_uuids: &[String],
        params: Option<Map<String, Value>>,
    ) -> AntboxResult<Value> {
        let feature = self.load(uuid).await?;
        if !feature.expose_action {
            return Err(AntboxError::BadRequest(format!(
                "Feature {} is not an action",
                uuid
            )));
        }
        if ctx.mode == AccessMode::Direct && !feature.run_manually {
            return Err(AntboxError::BadRequest(
                "Feature is not run manually".to_string(),
            ));
        }

        let mut survivors = Vec::with_capacity(node_uuids.len());
        for node_uuid in node_uuids {
            match self.node_service.get(ctx, node_uuid).await {
                Ok(node) => {
                    if feature.filters.matches(&node).unwrap_or(false) {
                        survivors.push(node.uuid);
                    }
                }
                Err(e) => debug!(uuid = %node_uuid, error = %e, "action target dropped"),
            }
        }

        let mut args = params.unwrap_or_default();
        args.insert(UUIDS_PARAMETER.to_string(), json!(survivors));

        let _permit = self.limiter.acquire(&feature.uuid, InvocationChannel::Action)?;
        self.run(ctx, &feature, args).await
    }

    /// AI tool dispatch. A name containing `:` routes to the fixed switch
    /// over core service methods; anything else must be an exposed AI tool.
    pub async fn run_ai_tool(
        &self,
        ctx: &AuthenticationContext,
        uuid: &str,
        params: Map<String, Value>,
    ) -> AntboxResult<Value> {
        if uuid.contains(':') {
            return self.run_service_tool(ctx, uuid, params).await;
        }
        let feature = self.load(uuid).await?;
        if !feature.expose_ai_tool {
            return Err(AntboxError::BadRequest(format!(
                "Feature {} is not an AI tool",
                uuid
            )));
        }
        let _permit = self.limiter.acquire(&feature.uuid, InvocationChannel::AiTool)?;
        self.run(ctx, &feature, params).await
    }

    /// HTTP extension run: extract parameters from the request, invoke,
    /// and shape the response body by the declared return type.
    pub async fn run_extension(
        &self,
        ctx: &AuthenticationContext,
        uuid: &str,
        request: ExtensionRequest,
    ) -> AntboxResult<ExtensionResponse> {
        let feature = self.load(uuid).await?;
        if !feature.expose_extension {
            return Err(AntboxError::BadRequest(format!(
                "Feature {} is not an extension",
                uuid
            )));
        }

        let args = extract_extension_args(&feature, &request)?;
        let _permit = self
            .limiter
            .acquire(&feature.uuid, InvocationChannel::Extension)?;
        let result = self.run(ctx, &feature, args).await?;
        Ok(shape_extension_response(&feature, result))
    }

    // ------------------------------------------------------------------
    // Event-driven execution
    // ------------------------------------------------------------------

    /// Attach this service to a bus: runs domain-wide automatic actions and
    /// folder hooks for every node event.
    pub fn subscribe(self: Arc<Self>, bus: &EventBus) -> SubscriptionToken {
        let service = self;
        bus.subscribe_handler(None, move |event| {
            let service = Arc::clone(&service);
            async move {
                service.react(event).await;
            }
        })
    }

    async fn react(&self, event: NodeEvent) {
        self.run_automatic_features(&event).await;
        self.run_folder_hooks(&event).await;
    }

    /// Reaction A: features flagged for the event kind, filter-tested
    /// against the event payload, invoked under an elevated action-mode
    /// context.
    async fn run_automatic_features(&self, event: &NodeEvent) {
        let features = match self.features.list().await {
            Ok(features) => features,
            Err(e) => {
                warn!(error = %e, "automatic actions skipped: feature listing failed");
                return;
            }
        };

        for feature in features {
            let triggered = match event.kind {
                NodeEventKind::Created => feature.run_on_creates,
                NodeEventKind::Updated => feature.run_on_updates,
                NodeEventKind::Deleted => feature.run_on_deletes,
            };
            if !triggered || !matches!(feature.filters.matches(&event.node), Ok(true)) {
                continue;
            }

            let ctx = AuthenticationContext::elevated(&event.tenant);
            let mut args = Map::new();
            args.insert(UUIDS_PARAMETER.to_string(), json!([event.node.uuid]));

            let outcome = match self.limiter.acquire(&feature.uuid, InvocationChannel::Action) {
                Ok(_permit) => self.run(&ctx, &feature, args).await.map(|_| ()),
                Err(e) => Err(e),
            };
            if let Err(e) = outcome {
                warn!(feature = %feature.uuid, node = %event.node.uuid, error = %e,
                    "automatic action failed");
            }
        }
    }

    /// Reaction B: the event node's parent folder declares hook strings
    /// `"<featureUuid> key=value ..."` per lifecycle kind; each runs in
    /// action mode under the event's user email.
    async fn run_folder_hooks(&self, event: &NodeEvent) {
        let parent = &event.node.parent;
        if parent.is_empty() || parent == ROOT_FOLDER_UUID {
            return;
        }
        let elevated = AuthenticationContext::elevated(&event.tenant);
        let folder = match self.node_service.get(&elevated, parent).await {
            Ok(folder) if folder.is_folder() => folder,
            _ => return,
        };

        let hooks = match event.kind {
            NodeEventKind::Created => &folder.on_create,
            NodeEventKind::Updated => &folder.on_update,
            NodeEventKind::Deleted => &folder.on_delete,
        };

        for invocation in hooks {
            let Some((feature_uuid, params)) = parse_hook_invocation(invocation) else {
                warn!(folder = %folder.uuid, invocation, "unparsable folder hook");
                continue;
            };
            let feature = match self.load(&feature_uuid).await {
                Ok(feature) => feature,
                Err(e) => {
                    warn!(folder = %folder.uuid, feature = %feature_uuid, error = %e,
                        "folder hook skipped");
                    continue;
                }
            };

            let ctx = AuthenticationContext::new(
                &event.tenant,
                Principal::new(&event.user_email, vec![]),
                AccessMode::Action,
            );
            let mut args = params;
            args.insert(UUIDS_PARAMETER.to_string(), json!([event.node.uuid]));

            let outcome = match self.limiter.acquire(&feature.uuid, InvocationChannel::Action) {
                Ok(_permit) => self.run(&ctx, &feature, args).await.map(|_| ()),
                Err(e) => Err(e),
            };
            if let Err(e) = outcome {
                warn!(feature = %feature.uuid, node = %event.node.uuid, error = %e,
                    "folder hook failed");
            }
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    async fn load(&self, uuid: &str) -> AntboxResult<Feature> {
        self.features
            .get(uuid)
            .await?
            .ok_or_else(|| AntboxError::FeatureNotFound(uuid.to_string()))
    }

    fn visible(&self, ctx: &AuthenticationContext, feature: &Feature) -> bool {
        feature.groups_allowed.is_empty()
            || ctx.is_admin()
            || feature
                .groups_allowed
                .iter()
                .any(|g| ctx.principal.is_member_of(g))
    }

    /// The shared execution tail of every path: module load, groupsAllowed
    /// enforcement, runAs elevation, argument validation, dispatch.
    async fn run(
        &self,
        ctx: &AuthenticationContext,
        feature: &Feature,
        mut args: Map<String, Value>,
    ) -> AntboxResult<Value> {
        let invocation = Uuid::new_v4();
        debug!(feature = %feature.uuid, %invocation, state = ?InvocationState::Queued, "invocation");

        let module = self
            .registry
            .resolve(&feature.uuid, feature.modified_time)
            .ok_or_else(|| {
                AntboxError::Unknown(format!("Module for feature {} is not loaded", feature.uuid))
            })?;

        if !feature.groups_allowed.is_empty()
            && !ctx.is_admin()
            && !feature
                .groups_allowed
                .iter()
                .any(|g| ctx.principal.is_member_of(g))
        {
            return Err(AntboxError::Forbidden(format!(
                "Feature {} is restricted to other groups",
                feature.uuid
            )));
        }

        let effective = match &feature.run_as {
            Some(group) if !ctx.principal.is_member_of(group) => ctx.with_group(group),
            _ => ctx.clone(),
        };

        debug!(feature = %feature.uuid, %invocation, state = ?InvocationState::Validating, "invocation");
        feature.validate_arguments(&mut args)?;

        let run_ctx = RunContext {
            auth: effective.clone(),
            node_service: NodeServiceProxy::new(self.node_service.clone(), effective),
        };

        debug!(feature = %feature.uuid, %invocation, state = ?InvocationState::Executing, "invocation");
        let outcome = std::panic::AssertUnwindSafe(module.run(run_ctx, args))
            .catch_unwind()
            .await;
        match outcome {
            Ok(Ok(value)) => {
                debug!(feature = %feature.uuid, %invocation, state = ?InvocationState::Success, "invocation");
                Ok(value)
            }
            Ok(Err(error)) => {
                debug!(feature = %feature.uuid, %invocation, state = ?InvocationState::Error,
                    code = error.code(), "invocation");
                Err(error)
            }
            Err(_) => {
                debug!(feature = %feature.uuid, %invocation, state = ?InvocationState::Error, "invocation");
                Err(AntboxError::Unknown(format!(
                    "Feature {} panicked during execution",
                    feature.uuid
                )))
            }
        }
    }

    /// Fixed switch of core service methods addressable as AI tools
    /// (`NodeService:find`, `NodeService:get`, ...).
    async fn run_service_tool(
        &self,
        ctx: &AuthenticationContext,
        name: &str,
        params: Map<String, Value>,
    ) -> AntboxResult<Value> {
        let str_param = |key: &str| -> AntboxResult<String> {
            params
                .get(key)
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
                .ok_or_else(|| {
                    AntboxError::BadRequest(format!("Parameter {} is required", key))
                })
        };

        match name {
            "NodeService:find" => {
                let filters = match params.get("filters") {
                    Some(value) => serde_json::from_value(value.clone())
                        .map_err(|e| AntboxError::BadRequest(format!("Invalid filters: {}", e)))?,
                    None => Default::default(),
                };
                let page_size = params
                    .get("pageSize")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(25) as usize;
                let page_token = params
                    .get("pageToken")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(1);
                let result = self
                    .node_service
                    .find(ctx, &filters, page_size, page_token)
                    .await?;
                Ok(json!({
                    "nodes": result.nodes,
                    "nextPageToken": result.next_page_token,
                }))
            }
            "NodeService:get" => {
                let node = self.node_service.get(ctx, &str_param("uuid")?).await?;
                serde_json::to_value(node).map_err(|e| AntboxError::Unknown(e.to_string()))
            }
            "NodeService:list" => {
                let parent = params.get("parent").and_then(|v| v.as_str());
                let nodes = self.node_service.list(ctx, parent).await?;
                serde_json::to_value(nodes).map_err(|e| AntboxError::Unknown(e.to_string()))
            }
            "NodeService:create" => {
                let metadata = params
                    .get("metadata")
                    .cloned()
                    .ok_or_else(|| AntboxError::BadRequest("Parameter metadata is required".to_string()))?;
                let input: CreateNodeInput = serde_json::from_value(metadata)
                    .map_err(|e| AntboxError::BadRequest(format!("Invalid metadata: {}", e)))?;
                let node = self.node_service.create(ctx, input).await?;
                serde_json::to_value(node).map_err(|e| AntboxError::Unknown(e.to_string()))
            }
            "NodeService:update" => {
                let patch = params
                    .get("metadata")
                    .and_then(|v| v.as_object())
                    .cloned()
                    .ok_or_else(|| AntboxError::BadRequest("Parameter metadata is required".to_string()))?;
                let node = self
                    .node_service
                    .update(ctx, &str_param("uuid")?, patch)
                    .await?;
                serde_json::to_value(node).map_err(|e| AntboxError::Unknown(e.to_string()))
            }
            "NodeService:delete" => {
                self.node_service.delete(ctx, &str_param("uuid")?).await?;
                Ok(Value::Null)
            }
            "NodeService:duplicate" => {
                let node = self.node_service.duplicate(ctx, &str_param("uuid")?).await?;
                serde_json::to_value(node).map_err(|e| AntboxError::Unknown(e.to_string()))
            }
            "NodeService:copy" => {
                let node = self
                    .node_service
                    .copy(ctx, &str_param("uuid")?, &str_param("parent")?)
                    .await?;
                serde_json::to_value(node).map_err(|e| AntboxError::Unknown(e.to_string()))
            }
            "NodeService:breadcrumbs" => {
                let chain = self
                    .node_service
                    .breadcrumbs(ctx, &str_param("uuid")?)
                    .await?;
                serde_json::to_value(chain).map_err(|e| AntboxError::Unknown(e.to_string()))
            }
            "NodeService:export" => {
                use base64::Engine as _;
                let bundle = self.node_service.export(ctx, &str_param("uuid")?).await?;
                Ok(json!({
                    "name": bundle.name,
                    "mimetype": bundle.mimetype,
                    "content": base64_engine().encode(&bundle.content),
                }))
            }
            other => Err(AntboxError::BadRequest(format!(
                "Unknown service tool: {}",
                other
            ))),
        }
    }
}

fn base64_engine() -> base64::engine::GeneralPurpose {
    base64::engine::general_purpose::STANDARD
}

/// Parse `"<featureUuid> key=value ..."`. Values stay strings.
fn parse_hook_invocation(invocation: &str) -> Option<(String, Map<String, Value>)> {
    let mut parts = invocation.split_whitespace();
    let uuid = parts.next()?.to_string();
    let mut params = Map::new();
    for part in parts {
        let (key, value) = part.split_once('=')?;
        params.insert(key.to_string(), Value::String(value.to_string()));
    }
    Some((uuid, params))
}

/// Build the argument map from the request: GET query string, POST JSON
/// object, or form fields. String inputs are coerced to the declared
/// parameter types.
fn extract_extension_args(
    feature: &Feature,
    request: &ExtensionRequest,
) -> AntboxResult<Map<String, Value>> {
    match &request.body {
        ExtensionBody::Json(Value::Object(map)) => Ok(map.clone()),
        ExtensionBody::Json(_) => Err(AntboxError::BadRequest(
            "Extension body must be a JSON object".to_string(),
        )),
        ExtensionBody::Form(fields) => Ok(coerce_string_args(feature, fields)),
        ExtensionBody::None => Ok(coerce_string_args(feature, &request.query)),
    }
}

fn coerce_string_args(feature: &Feature, fields: &HashMap<String, String>) -> Map<String, Value> {
    let mut args = Map::new();
    for (key, raw) in fields {
        let coerced = match feature.parameter(key).map(|p| p.parameter_type) {
            Some(ParameterType::Number) => raw.parse::<f64>().ok().map(|n| json!(n)),
            Some(ParameterType::Boolean) => raw.parse::<bool>().ok().map(Value::Bool),
            Some(ParameterType::Array) | Some(ParameterType::Object) => {
                serde_json::from_str(raw).ok()
            }
            _ => None,
        };
        args.insert(key.clone(), coerced.unwrap_or(Value::String(raw.clone())));
    }
    args
}

fn shape_extension_response(feature: &Feature, result: Value) -> ExtensionResponse {
    match feature.return_type {
        ReturnType::Void => ExtensionResponse {
            status: 200,
            content_type: "text/plain".to_string(),
            body: Bytes::from_static(b"OK"),
            attachment_name: None,
        },
        ReturnType::Array | ReturnType::Object => ExtensionResponse {
            status: 200,
            content_type: "application/json".to_string(),
            body: Bytes::from(serde_json::to_vec(&result).unwrap_or_default()),
            attachment_name: None,
        },
        ReturnType::File => {
            let body = match &result {
                Value::String(text) => Bytes::from(text.clone().into_bytes()),
                other => Bytes::from(serde_json::to_vec(other).unwrap_or_default()),
            };
            ExtensionResponse {
                status: 200,
                content_type: feature
                    .return_content_type
                    .clone()
                    .unwrap_or_else(|| "application/octet-stream".to_string()),
                body,
                attachment_name: Some(feature.title.clone()),
            }
        }
        _ => {
            let text = match &result {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            ExtensionResponse {
                status: 200,
                content_type: feature
                    .return_content_type
                    .clone()
                    .unwrap_or_else(|| "text/plain".to_string()),
                body: Bytes::from(text.into_bytes()),
                attachment_name: None,
            }
        }
    }
}
