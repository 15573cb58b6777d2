// Copyright (c) 2026 antbox.io
// SPDX-License-Identifier: AGPL-3.0

//! # antbox server daemon
//!
//! Boots one [`Tenant`] per `--tenant` flag on in-memory repositories
//! (optionally with filesystem-backed blob storage) and serves the `/v2`
//! HTTP API. Bearer-token verification is an external collaborator; this
//! binary wires the reject-all verifier, so callers authenticate with api
//! keys or fall back to the anonymous principal.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use antbox_core::application::rate_limiter::FeatureRateLimiter;
use antbox_core::application::tenant::{Tenant, TenantAdapters};
use antbox_core::domain::auth::RejectAllTokenVerifier;
use antbox_core::infrastructure::ai::DeterministicAiModel;
use antbox_core::infrastructure::storage::LocalStorageProvider;
use antbox_core::presentation::api::{app, AppState};
use antbox_core::presentation::auth::Authenticator;

/// antbox ECM server
#[derive(Parser)]
#[command(name = "antbox")]
#[command(version, about, long_about = None)]
struct Cli {
    /// HTTP API host
    #[arg(long, env = "ANTBOX_HOST", default_value = "127.0.0.1")]
    host: String,

    /// HTTP API port
    #[arg(long, env = "ANTBOX_PORT", default_value = "7180")]
    port: u16,

    /// Tenants to boot; the first one is the default tenant
    #[arg(long = "tenant", default_value = "default")]
    tenants: Vec<String>,

    /// Directory for blob storage; in-memory when omitted
    #[arg(long, env = "ANTBOX_STORAGE_DIR", value_name = "DIR")]
    storage_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    let limiter = FeatureRateLimiter::default();
    let model = Arc::new(DeterministicAiModel::new());

    let mut tenants = Vec::with_capacity(cli.tenants.len());
    for name in &cli.tenants {
        let mut adapters = TenantAdapters::in_memory();
        if let Some(dir) = &cli.storage_dir {
            let path = dir.join(name);
            adapters.storage = Arc::new(
                LocalStorageProvider::new(&path)
                    .with_context(|| format!("storage dir {}", path.display()))?,
            );
        }
        let tenant = Tenant::new(name, adapters, limiter.clone(), model.clone())
            .await
            .map_err(|e| anyhow::anyhow!("tenant {} failed to boot: {}", name, e))?;
        info!(tenant = %name, "tenant ready");
        tenants.push(tenant);
    }

    let default_tenant = cli.tenants.first().cloned().unwrap_or_default();
    let state = Arc::new(AppState::new(
        tenants,
        &default_tenant,
        Authenticator::new(Arc::new(RejectAllTokenVerifier)),
    ));

    let addr = format!("{}:{}", cli.host, cli.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!(%addr, "antbox listening");
    axum::serve(listener, app(state)).await.context("server")?;
    Ok(())
}
