//! Kong instance descriptors and the read-only directory of them.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Connection descriptor for one Kong deployment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Instance {
    /// Unique instance name.
    pub name: String,
    /// Admin API base URL, e.g. `http://kong:8001`.
    pub base_url: String,
    /// Name of the header carrying the credential.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_key: Option<String>,
    /// Credential value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_value: Option<String>,
}

impl Instance {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            header_key: None,
            header_value: None,
        }
    }

    /// Attach the static authentication header.
    pub fn with_auth_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.header_key = Some(key.into());
        self.header_value = Some(value.into());
        self
    }

    /// The auth header, if both name and value are non-empty.
    pub fn auth_header(&self) -> Option<(&str, &str)> {
        match (self.header_key.as_deref(), self.header_value.as_deref()) {
            (Some(k), Some(v)) if !k.is_empty() && !v.is_empty() => Some((k, v)),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth_header().is_some()
    }
}

/// Immutable table of configured instances, shared by lifecycle and discovery.
///
/// Built once at startup and never mutated afterwards, so it can be read
/// from any number of tasks without locking.
#[derive(Debug, Clone, Default)]
pub struct InstanceDirectory {
    instances: Arc<[Instance]>,
}

impl InstanceDirectory {
    pub fn new(instances: Vec<Instance>) -> Self {
        Self {
            instances: instances.into(),
        }
    }

    /// Find an instance by its configured name.
    pub fn lookup(&self, name: &str) -> Option<&Instance> {
        self.instances.iter().find(|i| i.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Instance> {
        self.instances.iter()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}
