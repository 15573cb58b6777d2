// Copyright (c) 2026 antbox.io
// SPDX-License-Identifier: AGPL-3.0

//! Aspect Aggregate
//!
//! Typed property schemas attachable to nodes. An aspect declares the
//! properties it contributes, each with a type and optional validation
//! (regex or allowed-list), plus a filter restricting which nodes the
//! aspect may apply to. The node service revalidates properties against
//! every attached aspect on create and update.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::error::ValidationErrors;
use crate::domain::filter::{FilterError, NodeFilters};
use crate::domain::node::Node;
use crate::domain::repository::ConfigEntity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    String,
    Number,
    Boolean,
    Array,
    Object,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AspectProperty {
    pub name: String,
    #[serde(rename = "type")]
    pub property_type: PropertyType,
    #[serde(default)]
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Anchor-free regex the string value must match.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_regex: Option<String>,
    /// Closed list of admissible values.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_list: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
}

impl AspectProperty {
    fn type_matches(&self, value: &Value) -> bool {
        match self.property_type {
            PropertyType::String => value.is_string(),
            PropertyType::Number => value.is_number(),
            PropertyType::Boolean => value.is_boolean(),
            PropertyType::Array => value.is_array(),
            PropertyType::Object => value.is_object(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Aspect {
    pub uuid: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Restricts which nodes this aspect may be attached to.
    #[serde(default)]
    pub filters: NodeFilters,
    #[serde(default)]
    pub properties: Vec<AspectProperty>,
    #[serde(default)]
    pub builtin: bool,
}

impl Aspect {
    pub fn new(uuid: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            title: title.into(),
            description: None,
            filters: NodeFilters::default(),
            properties: Vec::new(),
            builtin: false,
        }
    }

    /// Whether this aspect may be attached to the given node.
    pub fn applies_to(&self, node: &Node) -> Result<bool, FilterError> {
        self.filters.matches(node)
    }

    /// Validate a node's property map against this aspect's schema,
    /// accumulating field-level errors into the given aggregate.
    pub fn validate_properties(&self, properties: &Map<String, Value>, errors: &mut ValidationErrors) {
        for property in &self.properties {
            let value = properties
                .get(&property.name)
                .filter(|v| !v.is_null())
                .or(property.default_value.as_ref());

            let Some(value) = value else {
                if property.required {
                    errors.push(
                        format!("properties.{}", property.name),
                        "required property is missing",
                    );
                }
                continue;
            };

            if !property.type_matches(value) {
                errors.push(
                    format!("properties.{}", property.name),
                    format!("expected a {:?} value", property.property_type),
                );
                continue;
            }

            if let (Some(pattern), Some(text)) = (&property.validation_regex, value.as_str()) {
                match Regex::new(pattern) {
                    Ok(regex) if regex.is_match(text) => {}
                    Ok(_) => errors.push(
                        format!("properties.{}", property.name),
                        format!("value does not match pattern {}", pattern),
                    ),
                    Err(_) => errors.push(
                        format!("properties.{}", property.name),
                        format!("invalid validation pattern {}", pattern),
                    ),
                }
            }

            if let Some(allowed) = &property.validation_list {
                if !allowed.contains(value) {
                    errors.push(
                        format!("properties.{}", property.name),
                        "value is not in the allowed list",
                    );
                }
            }
        }
    }
}

impl ConfigEntity for Aspect {
    fn id(&self) -> &str {
        &self.uuid
    }
}
