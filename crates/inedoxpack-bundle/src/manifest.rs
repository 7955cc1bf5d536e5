//! Manifest schema for Universal Packages.
//!
//! The manifest identifies the package (group, name, version), carries
//! optional display metadata, and any number of additional properties.
//! Inedo extensions use underscore-prefixed properties such as
//! `_inedoSdkVersion` and `_targetFrameworks`.

use crate::{BundleError, BundleResult};
use semver::Version;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Package manifest.
///
/// This corresponds to the `upack.json` file in the package root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniversalManifest {
    /// Package group (e.g., "inedox").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    /// Package name.
    pub name: String,

    /// Package version.
    pub version: Version,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Icon URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    /// Additional properties, serialized alongside the fields above.
    #[serde(flatten)]
    pub properties: BTreeMap<String, Value>,
}

impl UniversalManifest {
    /// Create a new manifest with the minimum required fields.
    #[must_use]
    pub fn new(group: &str, name: &str, version: Version) -> Self {
        Self {
            group: (!group.is_empty()).then(|| group.to_string()),
            name: name.to_string(),
            version,
            title: None,
            description: None,
            icon: None,
            properties: BTreeMap::new(),
        }
    }

    /// Set an additional property, replacing any previous value.
    pub fn set_property(&mut self, key: &str, value: impl Into<Value>) {
        self.properties.insert(key.to_string(), value.into());
    }

    /// Get an additional property.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// `group/name`, or just the name when there is no group.
    #[must_use]
    pub fn full_name(&self) -> String {
        match &self.group {
            Some(group) => format!("{group}/{}", self.name),
            None => self.name.clone(),
        }
    }

    /// Validate the manifest.
    pub fn validate(&self) -> BundleResult<()> {
        if self.name.is_empty() {
            return Err(BundleError::InvalidManifest("name is required".to_string()));
        }

        if !self.name.chars().all(is_name_char) {
            return Err(BundleError::InvalidManifest(format!(
                "name '{}' may only contain letters, digits, '-', '.' and '_'",
                self.name
            )));
        }

        if let Some(group) = &self.group
            && (group.starts_with('/')
                || group.ends_with('/')
                || !group.chars().all(|c| c == '/' || is_name_char(c)))
        {
            return Err(BundleError::InvalidManifest(format!(
                "group '{group}' is not a valid package group"
            )));
        }

        for key in self.properties.keys() {
            if matches!(
                key.as_str(),
                "group" | "name" | "version" | "title" | "description" | "icon"
            ) {
                return Err(BundleError::InvalidManifest(format!(
                    "property '{key}' shadows a manifest field"
                )));
            }
        }

        Ok(())
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> BundleResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> BundleResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_')
}
