// Copyright (c) 2026 antbox.io
// SPDX-License-Identifier: AGPL-3.0

//! Feature Runtime - Executable Modules and Their Registry
//!
//! A feature's `module` field is materialized ahead of time into an
//! executable unit registered here under the feature uuid. The rest of the
//! core depends only on the `run(ctx, args)` contract; how the unit was
//! produced is invisible downstream.
//!
//! The registry caches modules keyed by `(uuid, modified_time)`: replacing
//! a feature re-registers its module, and a stale entry never resolves.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::{Map, Value};

use crate::domain::auth::AuthenticationContext;
use crate::domain::error::AntboxResult;
use crate::application::node_service_proxy::NodeServiceProxy;

/// Per-invocation execution context handed to feature code. The node
/// service proxy is bound to the authentication context; feature code
/// cannot reach the unproxied service or forge a different principal.
#[derive(Clone)]
pub struct RunContext {
    pub auth: AuthenticationContext,
    pub node_service: NodeServiceProxy,
}

/// The executable unit behind a feature.
#[async_trait]
pub trait FeatureModule: Send + Sync {
    async fn run(&self, ctx: RunContext, args: Map<String, Value>) -> AntboxResult<Value>;
}

/// Lifecycle of one feature invocation, logged by the feature service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationState {
    Queued,
    Validating,
    Executing,
    Success,
    Error,
}

struct RegisteredModule {
    modified_time: DateTime<Utc>,
    module: Arc<dyn FeatureModule>,
}

/// Process-local module cache keyed by feature uuid.
#[derive(Clone, Default)]
pub struct ModuleRegistry {
    modules: Arc<DashMap<String, RegisteredModule>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &self,
        uuid: &str,
        modified_time: DateTime<Utc>,
        module: Arc<dyn FeatureModule>,
    ) {
        self.modules.insert(
            uuid.to_string(),
            RegisteredModule {
                modified_time,
                module,
            },
        );
    }

    /// Resolve the module for `(uuid, modified_time)`. A registration from
    /// an older feature revision does not resolve.
    pub fn resolve(
        &self,
        uuid: &str,
        modified_time: DateTime<Utc>,
    ) -> Option<Arc<dyn FeatureModule>> {
        self.modules.get(uuid).and_then(|entry| {
            (entry.modified_time == modified_time).then(|| entry.module.clone())
        })
    }

    pub fn remove(&self, uuid: &str) {
        self.modules.remove(uuid);
    }
}

/// Adapter turning an async closure into a [`FeatureModule`].
pub struct FnModule<F> {
    f: F,
}

impl<F> FnModule<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> FeatureModule for FnModule<F>
where
    F: Fn(RunContext, Map<String, Value>) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = AntboxResult<Value>> + Send,
{
    async fn run(&self, ctx: RunContext, args: Map<String, Value>) -> AntboxResult<Value> {
        (self.f)(ctx, args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct NoopModule;

    #[async_trait]
    impl FeatureModule for NoopModule {
        async fn run(&self, _ctx: RunContext, _args: Map<String, Value>) -> AntboxResult<Value> {
            Ok(json!(null))
        }
    }

    #[test]
    fn test_registry_invalidates_stale_revisions() {
        let registry = ModuleRegistry::new();
        let first = Utc::now();
        registry.register("f1", first, Arc::new(NoopModule));

        assert!(registry.resolve("f1", first).is_some());

        let second = first + chrono::Duration::seconds(1);
        assert!(registry.resolve("f1", second).is_none());

        registry.register("f1", second, Arc::new(NoopModule));
        assert!(registry.resolve("f1", second).is_some());
        assert!(registry.resolve("f1", first).is_none());
    }

    #[test]
    fn test_remove() {
        let registry = ModuleRegistry::new();
        let at = Utc::now();
        registry.register("f1", at, Arc::new(NoopModule));
        registry.remove("f1");
        assert!(registry.resolve("f1", at).is_none());
    }
}
