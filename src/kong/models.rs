//! Kong Admin API entities, limited to the fields this crate reads or writes.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A Kong service (upstream definition).
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Service {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Only present when the API echoes back a shorthand URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, deserialize_with = "nullable_list")]
    pub tags: Vec<String>,
}

/// A Kong route. Always owned by one service.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Route {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable_list")]
    pub hosts: Vec<String>,
    #[serde(default, deserialize_with = "nullable_list")]
    pub paths: Vec<String>,
    #[serde(default, deserialize_with = "nullable_list")]
    pub methods: Vec<String>,
    #[serde(default, deserialize_with = "nullable_list")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<ResourceRef>,
}

impl Route {
    /// Id of the owning service as reported by Kong.
    pub fn service_id(&self) -> Option<&str> {
        self.service.as_ref().map(|s| s.id.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Consumer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_id: Option<String>,
}

/// Foreign-key reference as Kong encodes it: `{"id": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ResourceRef {
    pub id: String,
}

impl ResourceRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// A plugin instance as created on, and returned by, the Admin API.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Plugin {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, deserialize_with = "nullable_list")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub config: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<ResourceRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<ResourceRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumer: Option<ResourceRef>,
}

/// One page of a Kong list endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct Page<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    /// Cursor for the next page; absent on the last one.
    #[serde(default)]
    pub offset: Option<String>,
}

/// Kong serializes empty lists as `null`.
pub(crate) fn nullable_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let list: Option<Vec<String>> = Deserialize::deserialize(deserializer)?;
    Ok(list.unwrap_or_default())
}
