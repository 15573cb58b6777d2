// Copyright (c) 2026 antbox.io
// SPDX-License-Identifier: AGPL-3.0

// Error Taxonomy - Uniform Result Type Across the Core
//
// Every public core operation returns Result<T, AntboxError>. Nothing in the
// core surface panics across module boundaries; adapter faults are wrapped
// as Unknown. Each variant carries a stable code used by the HTTP layer to
// derive the response status.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result alias used across every service in the core.
pub type AntboxResult<T> = Result<T, AntboxError>;

#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum AntboxError {
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Folder not found: {0}")]
    FolderNotFound(String),

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("{0}")]
    Validation(ValidationErrors),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Node is locked: {0}")]
    Locked(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Too many invocations: {0}")]
    TooMany(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl AntboxError {
    /// Stable error code, preserved across serialization and the wire.
    pub fn code(&self) -> &'static str {
        match self {
            AntboxError::NodeNotFound(_) => "NodeNotFoundError",
            AntboxError::FolderNotFound(_) => "FolderNotFoundError",
            AntboxError::FeatureNotFound(_) => "FeatureNotFoundError",
            AntboxError::BadRequest(_) => "BadRequestError",
            AntboxError::Validation(_) => "ValidationError",
            AntboxError::Forbidden(_) => "ForbiddenError",
            AntboxError::Locked(_) => "LockedError",
            AntboxError::Conflict(_) => "ConflictError",
            AntboxError::TooMany(_) => "TooManyError",
            AntboxError::Unknown(_) => "UnknownError",
        }
    }
}

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Aggregate of field-level errors surfaced as a single ValidationError.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Consume the aggregate: Ok if no errors were recorded.
    pub fn into_result(self) -> AntboxResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AntboxError::Validation(self))
        }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Validation failed: ")?;
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}: {}", err.field, err.message)?;
        }
        Ok(())
    }
}
