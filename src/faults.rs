//! Fault configuration for the request-termination plugin.

use crate::kong::{Consumer, Plugin, ResourceRef};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Kong plugin that short-circuits matching traffic.
pub const PLUGIN_NAME: &str = "request-termination";

/// Tag attached to every plugin this crate creates.
pub const PROVENANCE_TAG: &str = "created-by=kong-chaos";

pub const DEFAULT_STATUS: u16 = 500;

pub const DEFAULT_MESSAGE: &str =
    "Error injected through the Kong chaos extension (through the request-termination Kong plugin)";

/// What the terminated requests should look like.
///
/// Absent fields are omitted from the plugin config entirely. When both
/// `body` and `message` are set, `body` wins and `message` is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminationConfig {
    /// HTTP status returned to clients.
    #[serde(default = "default_status")]
    pub status: u16,
    /// Raw response body.
    #[serde(default, deserialize_with = "non_empty")]
    pub body: Option<String>,
    /// Message wrapped by Kong into its default error body.
    #[serde(default, deserialize_with = "non_empty")]
    pub message: Option<String>,
    /// Content-Type of the returned body.
    #[serde(default, deserialize_with = "non_empty")]
    pub content_type: Option<String>,
    /// Header or query parameter name that activates the plugin.
    #[serde(default, deserialize_with = "non_empty")]
    pub trigger: Option<String>,
    /// Consumer username or id the fault is restricted to.
    #[serde(default, deserialize_with = "non_empty")]
    pub consumer: Option<String>,
}

fn default_status() -> u16 {
    DEFAULT_STATUS
}

impl Default for TerminationConfig {
    fn default() -> Self {
        Self {
            status: DEFAULT_STATUS,
            body: None,
            message: None,
            content_type: None,
            trigger: None,
            consumer: None,
        }
    }
}

/// Orchestrators send `""` for unset parameters; treat it as absent.
fn non_empty<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Deserialize::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}

impl TerminationConfig {
    pub fn with_status(status: u16) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    /// Plugin `config` object.
    pub fn plugin_config(&self) -> Map<String, Value> {
        let mut config = Map::new();
        config.insert("status_code".to_string(), Value::from(self.status));

        if let Some(body) = &self.body {
            config.insert("body".to_string(), Value::from(body.as_str()));
        } else if let Some(message) = &self.message {
            config.insert("message".to_string(), Value::from(message.as_str()));
        }

        if let Some(content_type) = &self.content_type {
            config.insert("content_type".to_string(), Value::from(content_type.as_str()));
        }
        if let Some(trigger) = &self.trigger {
            config.insert("trigger".to_string(), Value::from(trigger.as_str()));
        }

        config
    }

    /// Disabled, tagged plugin ready to be created at some scope.
    pub fn to_plugin(&self, consumer: Option<&Consumer>) -> Plugin {
        Plugin {
            id: None,
            name: PLUGIN_NAME.to_string(),
            enabled: false,
            tags: vec![PROVENANCE_TAG.to_string()],
            config: self.plugin_config(),
            service: None,
            route: None,
            consumer: consumer.and_then(|c| c.id.clone()).map(ResourceRef::new),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_minimal_config_only_sets_status() {
        let config = TerminationConfig::with_status(503);
        let plugin_config = config.plugin_config();

        assert_eq!(plugin_config.len(), 1);
        assert_eq!(plugin_config["status_code"], json!(503));
    }

    #[test]
    fn test_body_takes_precedence_over_message() {
        let config = TerminationConfig {
            body: Some("some body".to_string()),
            message: Some("Hello from Kong extension".to_string()),
            ..Default::default()
        };
        let plugin_config = config.plugin_config();

        assert_eq!(plugin_config["body"], json!("some body"));
        assert!(!plugin_config.contains_key("message"));
    }

    #[test]
    fn test_message_used_without_body() {
        let config = TerminationConfig {
            message: Some("Hello".to_string()),
            content_type: Some("text/foobar".to_string()),
            trigger: Some("banana".to_string()),
            ..Default::default()
        };
        let plugin_config = config.plugin_config();

        assert_eq!(plugin_config["message"], json!("Hello"));
        assert_eq!(plugin_config["content_type"], json!("text/foobar"));
        assert_eq!(plugin_config["trigger"], json!("banana"));
        assert!(!plugin_config.contains_key("body"));
    }

    #[test]
    fn test_empty_strings_deserialize_as_absent() {
        let config: TerminationConfig = serde_json::from_value(json!({
            "status": 200,
            "body": "",
            "message": "Hello",
            "contentType": "",
            "trigger": null,
            "consumer": ""
        }))
        .unwrap();

        assert_eq!(config.status, 200);
        assert!(config.body.is_none());
        assert_eq!(config.message.as_deref(), Some("Hello"));
        assert!(config.content_type.is_none());
        assert!(config.trigger.is_none());
        assert!(config.consumer.is_none());
    }

    #[test]
    fn test_status_defaults_to_500() {
        let config: TerminationConfig = serde_json::from_value(json!({})).unwrap();
        assert_eq!(config.status, DEFAULT_STATUS);
    }

    #[test]
    fn test_plugin_is_disabled_and_tagged() {
        let consumer = Consumer {
            id: Some("c1".to_string()),
            username: Some("test-consumer".to_string()),
            custom_id: None,
        };
        let plugin = TerminationConfig::default().to_plugin(Some(&consumer));

        assert_eq!(plugin.name, PLUGIN_NAME);
        assert!(!plugin.enabled);
        assert_eq!(plugin.tags, vec![PROVENANCE_TAG.to_string()]);
        assert_eq!(plugin.consumer, Some(ResourceRef::new("c1")));
        assert!(plugin.service.is_none() && plugin.route.is_none());
    }
}
