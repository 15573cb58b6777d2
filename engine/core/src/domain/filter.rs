// Copyright (c) 2026 antbox.io
// SPDX-License-Identifier: AGPL-3.0

//! Filter Engine
//!
//! Predicates over nodes, stored and transported as triples
//! `[field, operator, value]`. A flat list of triples is conjunctive; a list
//! of lists is an OR of AND-groups (disjunctive normal form). Field
//! resolution looks at top-level node attributes first and falls back into
//! `properties[field]`.
//!
//! Undefined fields never match, except for the negative operators
//! (`!=`, `not-in`, `not-contains`, `contains-none`) which hold vacuously.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::node::Node;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOperator {
    #[serde(rename = "==")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = "<=")]
    LessThanOrEqual,
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = ">=")]
    GreaterThanOrEqual,
    /// Case-insensitive substring match.
    #[serde(rename = "~=")]
    Like,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "not-in")]
    NotIn,
    /// Anchor-free regex match.
    #[serde(rename = "match")]
    Match,
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "contains-all")]
    ContainsAll,
    #[serde(rename = "contains-any")]
    ContainsAny,
    #[serde(rename = "not-contains")]
    NotContains,
    #[serde(rename = "contains-none")]
    ContainsNone,
}

impl FilterOperator {
    /// Operators that hold vacuously when the field is undefined.
    fn holds_on_undefined(self) -> bool {
        matches!(
            self,
            FilterOperator::NotEqual
                | FilterOperator::NotIn
                | FilterOperator::NotContains
                | FilterOperator::ContainsNone
        )
    }

    fn symbol(self) -> &'static str {
        match self {
            FilterOperator::Equal => "==",
            FilterOperator::NotEqual => "!=",
            FilterOperator::LessThan => "<",
            FilterOperator::LessThanOrEqual => "<=",
            FilterOperator::GreaterThan => ">",
            FilterOperator::GreaterThanOrEqual => ">=",
            FilterOperator::Like => "~=",
            FilterOperator::In => "in",
            FilterOperator::NotIn => "not-in",
            FilterOperator::Match => "match",
            FilterOperator::Contains => "contains",
            FilterOperator::ContainsAll => "contains-all",
            FilterOperator::ContainsAny => "contains-any",
            FilterOperator::NotContains => "not-contains",
            FilterOperator::ContainsNone => "contains-none",
        }
    }
}

/// One predicate triple. Serializes as `[field, operator, value]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter(pub String, pub FilterOperator, pub Value);

impl Filter {
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: impl Into<Value>) -> Self {
        Self(field.into(), operator, value.into())
    }

    pub fn field(&self) -> &str {
        &self.0
    }

    pub fn operator(&self) -> FilterOperator {
        self.1
    }

    pub fn value(&self) -> &Value {
        &self.2
    }
}

/// A compound filter: either one AND-group or an OR of AND-groups.
///
/// The untagged representation keeps the wire shape of the triples: a
/// depth-1 list parses as the conjunctive form, a depth-2 list as the
/// disjunctive form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeFilters {
    And(Vec<Filter>),
    Or(Vec<Vec<Filter>>),
}

impl Default for NodeFilters {
    fn default() -> Self {
        NodeFilters::And(Vec::new())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum FilterError {
    #[error("Operator {operator} cannot be applied to field {field}")]
    TypeMismatch { field: String, operator: String },

    #[error("Invalid regex pattern: {pattern}")]
    InvalidRegex { pattern: String },
}

impl NodeFilters {
    pub fn is_empty(&self) -> bool {
        match self {
            NodeFilters::And(filters) => filters.is_empty(),
            NodeFilters::Or(groups) => groups.iter().all(|g| g.is_empty()),
        }
    }

    /// A node satisfies the compound when at least one OR-group fully ANDs
    /// to true. An empty filter list matches any node.
    pub fn matches(&self, node: &Node) -> Result<bool, FilterError> {
        self.matches_object(&node.to_filter_object())
    }

    pub fn matches_object(&self, object: &Map<String, Value>) -> Result<bool, FilterError> {
        match self {
            NodeFilters::And(filters) => and_group(filters, object),
            NodeFilters::Or(groups) => {
                if groups.is_empty() {
                    return Ok(true);
                }
                for group in groups {
                    if and_group(group, object)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }
}

/// Callable form of a filter list.
pub struct NodeFilterSpec {
    filters: NodeFilters,
}

impl NodeFilterSpec {
    pub fn new(filters: NodeFilters) -> Self {
        Self { filters }
    }

    pub fn is_satisfied_by(&self, node: &Node) -> Result<bool, FilterError> {
        self.filters.matches(node)
    }
}

fn and_group(filters: &[Filter], object: &Map<String, Value>) -> Result<bool, FilterError> {
    for filter in filters {
        if !apply(filter, object)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Top-level attributes win; otherwise the field resolves inside
/// `properties`. A JSON null counts as undefined.
fn resolve_field<'a>(object: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
    let direct = object.get(field).filter(|v| !v.is_null());
    if direct.is_some() {
        return direct;
    }
    object
        .get("properties")
        .and_then(|p| p.get(field))
        .filter(|v| !v.is_null())
}

fn apply(filter: &Filter, object: &Map<String, Value>) -> Result<bool, FilterError> {
    let operator = filter.operator();
    let Some(actual) = resolve_field(object, filter.field()) else {
        return Ok(operator.holds_on_undefined());
    };
    let expected = filter.value();

    let mismatch = || FilterError::TypeMismatch {
        field: filter.field().to_string(),
        operator: operator.symbol().to_string(),
    };

    match operator {
        FilterOperator::Equal => Ok(values_equal(actual, expected)),
        FilterOperator::NotEqual => Ok(!values_equal(actual, expected)),

        FilterOperator::LessThan
        | FilterOperator::LessThanOrEqual
        | FilterOperator::GreaterThan
        | FilterOperator::GreaterThanOrEqual => {
            let ordering = compare(actual, expected).ok_or_else(mismatch)?;
            Ok(match operator {
                FilterOperator::LessThan => ordering.is_lt(),
                FilterOperator::LessThanOrEqual => ordering.is_le(),
                FilterOperator::GreaterThan => ordering.is_gt(),
                _ => ordering.is_ge(),
            })
        }

        FilterOperator::Like => {
            let (a, b) = both_strings(actual, expected).ok_or_else(mismatch)?;
            Ok(a.to_lowercase().contains(&b.to_lowercase()))
        }

        FilterOperator::Match => {
            let (a, pattern) = both_strings(actual, expected).ok_or_else(mismatch)?;
            let regex = Regex::new(pattern).map_err(|_| FilterError::InvalidRegex {
                pattern: pattern.to_string(),
            })?;
            Ok(regex.is_match(a))
        }

        FilterOperator::In => {
            let set = expected.as_array().ok_or_else(mismatch)?;
            Ok(set.iter().any(|v| values_equal(actual, v)))
        }
        FilterOperator::NotIn => {
            let set = expected.as_array().ok_or_else(mismatch)?;
            Ok(!set.iter().any(|v| values_equal(actual, v)))
        }

        FilterOperator::Contains => {
            let items = actual.as_array().ok_or_else(mismatch)?;
            Ok(items.iter().any(|v| values_equal(v, expected)))
        }
        FilterOperator::NotContains => {
            let items = actual.as_array().ok_or_else(mismatch)?;
            Ok(!items.iter().any(|v| values_equal(v, expected)))
        }
        FilterOperator::ContainsAll => {
            let items = actual.as_array().ok_or_else(mismatch)?;
            let wanted = expected.as_array().ok_or_else(mismatch)?;
            Ok(wanted
                .iter()
                .all(|w| items.iter().any(|v| values_equal(v, w))))
        }
        FilterOperator::ContainsAny => {
            let items = actual.as_array().ok_or_else(mismatch)?;
            let wanted = expected.as_array().ok_or_else(mismatch)?;
            Ok(wanted
                .iter()
                .any(|w| items.iter().any(|v| values_equal(v, w))))
        }
        FilterOperator::ContainsNone => {
            let items = actual.as_array().ok_or_else(mismatch)?;
            let wanted = expected.as_array().ok_or_else(mismatch)?;
            Ok(!wanted
                .iter()
                .any(|w| items.iter().any(|v| values_equal(v, w))))
        }
    }
}

/// Equality with numeric coercion: 5 and 5.0 are the same value.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Numbers compare numerically, strings lexicographically. Anything else is
/// not comparable.
fn compare(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return x.partial_cmp(&y);
    }
    if let (Some(x), Some(y)) = (a.as_str(), b.as_str()) {
        return Some(x.cmp(y));
    }
    None
}

fn both_strings<'a>(a: &'a Value, b: &'a Value) -> Option<(&'a str, &'a str)> {
    Some((a.as_str()?, b.as_str()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn node() -> Node {
        let mut node = Node::new(
            "11111111-aaaa-bbbb-cccc-000000000001",
            "Quarterly Report",
            "text/plain",
            "owner@antbox.io",
            "default",
            Utc::now(),
        );
        node.tags = ["finance", "q3"].iter().map(|s| s.to_string()).collect();
        node.size = 2048;
        node.properties
            .insert("department".to_string(), json!("sales"));
        node.properties.insert("priority".to_string(), json!(7));
        node
    }

    fn matches(field: &str, op: FilterOperator, value: Value) -> Result<bool, FilterError> {
        NodeFilters::And(vec![Filter::new(field, op, value)]).matches(&node())
    }

    #[test]
    fn test_equality_operators() {
        assert!(matches("mimetype", FilterOperator::Equal, json!("text/plain")).unwrap());
        assert!(!matches("mimetype", FilterOperator::Equal, json!("image/png")).unwrap());
        assert!(matches("mimetype", FilterOperator::NotEqual, json!("image/png")).unwrap());
        // Numeric coercion between integer and float.
        assert!(matches("size", FilterOperator::Equal, json!(2048.0)).unwrap());
    }

    #[test]
    fn test_ordering_operators() {
        assert!(matches("size", FilterOperator::GreaterThan, json!(1024)).unwrap());
        assert!(matches("size", FilterOperator::LessThanOrEqual, json!(2048)).unwrap());
        assert!(!matches("size", FilterOperator::LessThan, json!(100)).unwrap());
        // Strings compare lexicographically.
        assert!(matches("title", FilterOperator::GreaterThan, json!("Alpha")).unwrap());
    }

    #[test]
    fn test_ordering_type_mismatch() {
        let result = matches("tags", FilterOperator::LessThan, json!(3));
        assert!(matches!(result, Err(FilterError::TypeMismatch { .. })));
    }

    #[test]
    fn test_like_and_match() {
        assert!(matches("title", FilterOperator::Like, json!("quarterly")).unwrap());
        assert!(!matches("title", FilterOperator::Like, json!("annual")).unwrap());
        assert!(matches("title", FilterOperator::Match, json!("^Quarter.+Report$")).unwrap());
        assert!(matches("title", FilterOperator::Match, json!("Repo")).unwrap());

        let result = matches("title", FilterOperator::Match, json!("["));
        assert!(matches!(result, Err(FilterError::InvalidRegex { .. })));
    }

    #[test]
    fn test_set_operators() {
        assert!(matches(
            "mimetype",
            FilterOperator::In,
            json!(["text/plain", "text/html"])
        )
        .unwrap());
        assert!(matches("mimetype", FilterOperator::NotIn, json!(["image/png"])).unwrap());

        assert!(matches("tags", FilterOperator::Contains, json!("finance")).unwrap());
        assert!(matches("tags", FilterOperator::NotContains, json!("archived")).unwrap());
        assert!(matches("tags", FilterOperator::ContainsAll, json!(["finance", "q3"])).unwrap());
        assert!(!matches("tags", FilterOperator::ContainsAll, json!(["finance", "q4"])).unwrap());
        assert!(matches("tags", FilterOperator::ContainsAny, json!(["q4", "q3"])).unwrap());
        assert!(matches("tags", FilterOperator::ContainsNone, json!(["q4", "draft"])).unwrap());
    }

    #[test]
    fn test_property_fallback() {
        assert!(matches("department", FilterOperator::Equal, json!("sales")).unwrap());
        assert!(matches("priority", FilterOperator::GreaterThanOrEqual, json!(7)).unwrap());
    }

    #[test]
    fn test_undefined_field_semantics() {
        assert!(!matches("missing", FilterOperator::Equal, json!("x")).unwrap());
        assert!(!matches("missing", FilterOperator::Like, json!("x")).unwrap());
        assert!(!matches("missing", FilterOperator::Contains, json!("x")).unwrap());

        assert!(matches("missing", FilterOperator::NotEqual, json!("x")).unwrap());
        assert!(matches("missing", FilterOperator::NotIn, json!(["x"])).unwrap());
        assert!(matches("missing", FilterOperator::NotContains, json!("x")).unwrap());
        assert!(matches("missing", FilterOperator::ContainsNone, json!(["x"])).unwrap());
    }

    #[test]
    fn test_empty_filters_match_any_node() {
        assert!(NodeFilters::default().matches(&node()).unwrap());
        assert!(NodeFilters::Or(vec![]).matches(&node()).unwrap());
    }

    #[test]
    fn test_disjunctive_normal_form() {
        let filters = NodeFilters::Or(vec![
            vec![
                Filter::new("mimetype", FilterOperator::Equal, json!("image/png")),
                Filter::new("size", FilterOperator::GreaterThan, json!(0)),
            ],
            vec![
                Filter::new("department", FilterOperator::Equal, json!("sales")),
                Filter::new("priority", FilterOperator::GreaterThan, json!(5)),
            ],
        ]);
        // First group fails on mimetype, second fully ANDs to true.
        assert!(filters.matches(&node()).unwrap());

        let filters = NodeFilters::Or(vec![
            vec![Filter::new("mimetype", FilterOperator::Equal, json!("image/png"))],
            vec![Filter::new("priority", FilterOperator::GreaterThan, json!(9))],
        ]);
        assert!(!filters.matches(&node()).unwrap());
    }

    #[test]
    fn test_wire_shape() {
        let filters: NodeFilters =
            serde_json::from_value(json!([["mimetype", "==", "text/plain"]])).unwrap();
        assert!(matches!(&filters, NodeFilters::And(f) if f.len() == 1));
        assert!(filters.matches(&node()).unwrap());

        let dnf: NodeFilters = serde_json::from_value(json!([
            [["mimetype", "==", "text/plain"], ["size", ">", 100]],
            [["tags", "contains", "legal"]]
        ]))
        .unwrap();
        assert!(matches!(&dnf, NodeFilters::Or(groups) if groups.len() == 2));
        assert!(dnf.matches(&node()).unwrap());

        // Round trip keeps the triple form.
        let back = serde_json::to_value(&filters).unwrap();
        assert_eq!(back, json!([["mimetype", "==", "text/plain"]]));
    }

    #[test]
    fn test_spec_form() {
        let specification = NodeFilterSpec::new(NodeFilters::And(vec![Filter::new(
            "department",
            FilterOperator::Equal,
            json!("sales"),
        )]));
        assert!(specification.is_satisfied_by(&node()).unwrap());
    }
}
