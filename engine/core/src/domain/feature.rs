// Copyright (c) 2026 antbox.io
// SPDX-License-Identifier: AGPL-3.0

//! Feature Aggregate
//!
//! An executable unit: configuration record plus a registered module
//! exposing the `run(ctx, args)` contract. A feature can surface as a
//! manual action, an automatic event-triggered action, an HTTP extension,
//! or an AI tool; the exposure flags are independent.
//!
//! Actions must declare a required `uuids: array<string>` parameter and
//! must not declare `file` parameters (extensions may).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::error::{AntboxError, AntboxResult, ValidationErrors};
use crate::domain::filter::NodeFilters;
use crate::domain::repository::ConfigEntity;

pub const UUIDS_PARAMETER: &str = "uuids";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    String,
    Number,
    Boolean,
    Object,
    Array,
    File,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReturnType {
    String,
    Number,
    Boolean,
    Object,
    Array,
    File,
    Void,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub parameter_type: ParameterType,
    /// Element type when `parameter_type` is `array`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub array_type: Option<ParameterType>,
    #[serde(default)]
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
}

impl FeatureParameter {
    pub fn required(name: impl Into<String>, parameter_type: ParameterType) -> Self {
        Self {
            name: name.into(),
            parameter_type,
            array_type: None,
            required: true,
            description: None,
            default_value: None,
        }
    }

    pub fn optional(name: impl Into<String>, parameter_type: ParameterType) -> Self {
        Self {
            required: false,
            ..Self::required(name, parameter_type)
        }
    }

    /// The `uuids: array<string>` parameter every action must declare.
    pub fn uuids() -> Self {
        Self {
            array_type: Some(ParameterType::String),
            ..Self::required(UUIDS_PARAMETER, ParameterType::Array)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feature {
    pub uuid: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub expose_action: bool,
    #[serde(default)]
    pub run_on_creates: bool,
    #[serde(default)]
    pub run_on_updates: bool,
    #[serde(default)]
    pub run_on_deletes: bool,
    #[serde(default = "default_true")]
    pub run_manually: bool,
    #[serde(default)]
    pub expose_extension: bool,
    #[serde(default)]
    pub expose_ai_tool: bool,

    /// Restricts which nodes the feature targets; tested per node on manual
    /// runs and against the event payload on automatic runs.
    #[serde(default)]
    pub filters: NodeFilters,

    /// Group appended to the caller's principal when running.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_as: Option<String>,
    /// Non-empty restricts execution and visibility to these groups.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups_allowed: Vec<String>,

    #[serde(default)]
    pub parameters: Vec<FeatureParameter>,
    pub return_type: ReturnType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_content_type: Option<String>,

    #[serde(default)]
    pub builtin: bool,

    pub created_time: DateTime<Utc>,
    /// Module cache key component: the registry invalidates compiled
    /// modules when this moves.
    pub modified_time: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

impl Feature {
    pub fn new(uuid: impl Into<String>, title: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            uuid: uuid.into(),
            title: title.into(),
            description: None,
            expose_action: false,
            run_on_creates: false,
            run_on_updates: false,
            run_on_deletes: false,
            run_manually: true,
            expose_extension: false,
            expose_ai_tool: false,
            filters: NodeFilters::default(),
            run_as: None,
            groups_allowed: Vec::new(),
            parameters: Vec::new(),
            return_type: ReturnType::Void,
            return_content_type: None,
            builtin: false,
            created_time: at,
            modified_time: at,
        }
    }

    pub fn parameter(&self, name: &str) -> Option<&FeatureParameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn is_action_flavored(&self) -> bool {
        self.expose_action || self.run_on_creates || self.run_on_updates || self.run_on_deletes
    }

    /// Structural validation of the configuration record. An empty
    /// parameter list is always valid.
    pub fn validate(&self) -> AntboxResult<()> {
        let mut errors = ValidationErrors::new();

        if self.uuid.trim().is_empty() {
            errors.push("uuid", "uuid is required");
        }
        if self.title.trim().is_empty() {
            errors.push("title", "title is required");
        }

        let mut seen = std::collections::HashSet::new();
        for parameter in &self.parameters {
            if !seen.insert(parameter.name.as_str()) {
                errors.push(
                    format!("parameters.{}", parameter.name),
                    "duplicate parameter name",
                );
            }
        }

        if self.is_action_flavored() {
            match self.parameter(UUIDS_PARAMETER) {
                Some(p)
                    if p.required
                        && p.parameter_type == ParameterType::Array
                        && p.array_type == Some(ParameterType::String) => {}
                Some(_) => errors.push(
                    "parameters.uuids",
                    "actions must declare uuids as a required array of strings",
                ),
                None => errors.push(
                    "parameters.uuids",
                    "actions must declare a required uuids parameter",
                ),
            }
            if self
                .parameters
                .iter()
                .any(|p| p.parameter_type == ParameterType::File)
            {
                errors.push("parameters", "actions must not declare file parameters");
            }
        }

        if self.return_type == ReturnType::File && self.return_content_type.is_none() {
            errors.push(
                "returnContentType",
                "file-returning features must declare a content type",
            );
        }

        errors.into_result()
    }

    /// Presence-only check of required parameters, after filling declared
    /// defaults into the argument map. Never reaches the module on failure.
    pub fn validate_arguments(
        &self,
        args: &mut serde_json::Map<String, Value>,
    ) -> AntboxResult<()> {
        for parameter in &self.parameters {
            if !args.contains_key(&parameter.name) {
                if let Some(default) = &parameter.default_value {
                    args.insert(parameter.name.clone(), default.clone());
                }
            }
        }
        let missing: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required && !args.contains_key(&p.name))
            .map(|p| p.name.as_str())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AntboxError::BadRequest(format!(
                "Missing required parameters: {}",
                missing.join(", ")
            )))
        }
    }
}

impl ConfigEntity for Feature {
    fn id(&self) -> &str {
        &self.uuid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn action() -> Feature {
        let mut feature = Feature::new("copy-to-archive", "Copy to archive", Utc::now());
        feature.expose_action = true;
        feature.parameters = vec![FeatureParameter::uuids()];
        feature
    }

    #[test]
    fn test_action_requires_uuids_parameter() {
        let mut feature = action();
        assert!(feature.validate().is_ok());

        feature.parameters.clear();
        assert!(matches!(
            feature.validate(),
            Err(AntboxError::Validation(_))
        ));
    }

    #[test]
    fn test_action_rejects_file_parameters() {
        let mut feature = action();
        feature
            .parameters
            .push(FeatureParameter::optional("attachment", ParameterType::File));
        assert!(feature.validate().is_err());

        // Extensions may declare file parameters.
        let mut extension = Feature::new("render", "Render", Utc::now());
        extension.expose_extension = true;
        extension.return_type = ReturnType::String;
        extension
            .parameters
            .push(FeatureParameter::optional("attachment", ParameterType::File));
        assert!(extension.validate().is_ok());
    }

    #[test]
    fn test_empty_parameters_is_valid() {
        let mut feature = Feature::new("ping", "Ping", Utc::now());
        feature.expose_ai_tool = true;
        assert!(feature.validate().is_ok());
    }

    #[test]
    fn test_automatic_action_needs_uuids_too() {
        let mut feature = Feature::new("auto", "Auto", Utc::now());
        feature.run_on_creates = true;
        assert!(feature.validate().is_err());
        feature.parameters = vec![FeatureParameter::uuids()];
        assert!(feature.validate().is_ok());
    }

    #[test]
    fn test_argument_validation_applies_defaults() {
        let mut feature = action();
        let mut lang = FeatureParameter::optional("lang", ParameterType::String);
        lang.default_value = Some(json!("en"));
        feature.parameters.push(lang);

        let mut args = Map::new();
        args.insert("uuids".to_string(), json!(["n1"]));
        feature.validate_arguments(&mut args).unwrap();
        assert_eq!(args["lang"], json!("en"));
    }

    #[test]
    fn test_argument_validation_missing_required() {
        let feature = action();
        let mut args = Map::new();
        let result = feature.validate_arguments(&mut args);
        match result {
            Err(AntboxError::BadRequest(message)) => assert!(message.contains("uuids")),
            other => panic!("Expected BadRequest, got {:?}", other),
        }
    }
}
