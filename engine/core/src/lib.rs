// Copyright (c) 2026 antbox.io
// SPDX-License-Identifier: AGPL-3.0
//! # antbox-core
//!
//! The core engine of the antbox ECM: a multi-tenant content graph of
//! hierarchical nodes with metadata and optional binary bodies, plus the
//! dynamic feature system that acts on it.
//!
//! ## Subsystems
//!
//! | Subsystem | Modules |
//! |---|---|
//! | **Content graph** | [`domain::node`], [`domain::filter`], [`application::node_service`] |
//! | **Features** | [`domain::feature`], [`application::feature_service`], [`application::feature_runtime`] |
//! | **Events & audit** | [`domain::events`], [`infrastructure::event_bus`], [`application::audit_service`] |
//! | **Permissions** | [`domain::permission`], [`domain::auth`] |
//! | **Identity** | [`application::users_groups_service`], [`application::api_keys_service`] |
//! | **AI** | [`domain::ai`], [`application::agents_service`] |
//!
//! ## Layer Structure
//!
//! ```text
//! presentation/   ← HTTP API (axum), request authentication
//!     ↓
//! application/    ← Services, tenant container, rate limiter, feature runtime
//!     ↓
//! domain/         ← Aggregates, value objects, domain events, repository traits
//!     ↓
//! infrastructure/ ← In-memory repositories, storage providers, event bus
//! ```
//!
//! Integration tests live in `engine/core/tests/` and cover the node
//! lifecycle, permission walks, feature execution, and audit streams.

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;

pub use domain::error::{AntboxError, AntboxResult};
