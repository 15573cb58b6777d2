// Copyright (c) 2026 antbox.io
// SPDX-License-Identifier: AGPL-3.0

//! User identity record. Email is the stable identifier; the primary group
//! plus any additional groups form the principal's group set.

use serde::{Deserialize, Serialize};

use crate::domain::repository::ConfigEntity;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub email: String,
    pub name: String,
    /// Primary group uuid.
    pub group: String,
    /// Additional group uuids.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
    #[serde(default)]
    pub builtin: bool,
}

impl User {
    pub fn new(email: impl Into<String>, name: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: name.into(),
            group: group.into(),
            groups: Vec::new(),
            builtin: false,
        }
    }

    pub fn builtin(email: &str, name: &str, group: &str) -> Self {
        Self {
            builtin: true,
            ..Self::new(email, name, group)
        }
    }

    /// Primary group first, then the additional groups.
    pub fn all_groups(&self) -> Vec<String> {
        let mut groups = Vec::with_capacity(1 + self.groups.len());
        groups.push(self.group.clone());
        for group in &self.groups {
            if !groups.contains(group) {
                groups.push(group.clone());
            }
        }
        groups
    }
}

impl ConfigEntity for User {
    fn id(&self) -> &str {
        &self.email
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_groups_dedupes_and_keeps_primary_first() {
        let mut user = User::new("a@example.com", "A", "writers");
        user.groups = vec!["writers".to_string(), "reviewers".to_string()];
        assert_eq!(user.all_groups(), vec!["writers", "reviewers"]);
    }
}
