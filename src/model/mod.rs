//! ConfigMap records as exchanged with every engine
//!
//! Input and merged output share one shape. Labels and data are kept in
//! ordered maps so that serialised and printed records are stable.

pub mod input;
pub mod sample;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use input::{load_records, parse_records, InputFormat};
pub use sample::sample_config_maps;

pub const API_VERSION: &str = "v1";
pub const KIND: &str = "ConfigMap";
pub const DEFAULT_NAMESPACE: &str = "default";

/// Kubernetes-style ConfigMap
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMap {
    pub api_version: String,
    pub kind: String,
    pub metadata: Metadata,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

/// Object metadata
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Metadata {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

impl ConfigMap {
    /// Create an empty ConfigMap with the fixed apiVersion and kind
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: Metadata {
                name: name.into(),
                ..Metadata::default()
            },
            data: BTreeMap::new(),
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.metadata.namespace = Some(namespace.into());
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Label value, treating an empty string as absent
    pub fn label(&self, key: &str) -> Option<&str> {
        self.metadata
            .labels
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    /// Namespace, treating an empty string as absent
    pub fn namespace(&self) -> Option<&str> {
        self.metadata
            .namespace
            .as_deref()
            .filter(|namespace| !namespace.is_empty())
    }
}
