//! Configuration for the Kong chaos extension.

use crate::error::{ChaosError, Result};
use crate::instance::{Instance, InstanceDirectory};
use crate::kong::HttpConnector;
use crate::targeting::AttributeExcludes;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// Main configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Kong instances the extension may act on.
    pub instances: Vec<Instance>,
    /// Discovery settings.
    pub discovery: DiscoveryConfig,
    /// Admin API client settings.
    pub http: HttpConfig,
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ChaosError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| ChaosError::Config(e.to_string()))
    }

    /// Overlay the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Overlay variables from `lookup`.
    ///
    /// `KONG_INSTANCE_<n>_NAME` is read for n = 0, 1, ... until one is
    /// missing; those instances are appended after the file's.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: String| lookup(key.as_str()).filter(|v| !v.is_empty());

        for n in 0.. {
            let Some(name) = non_empty(format!("KONG_INSTANCE_{}_NAME", n)) else {
                break;
            };
            self.instances.push(Instance {
                name,
                base_url: non_empty(format!("KONG_INSTANCE_{}_ORIGIN", n)).unwrap_or_default(),
                header_key: non_empty(format!("KONG_INSTANCE_{}_HEADER_KEY", n)),
                header_value: non_empty(format!("KONG_INSTANCE_{}_HEADER_VALUE", n)),
            });
        }

        if let Some(raw) = lookup("DISCOVERY_ATTRIBUTES_EXCLUDES_SERVICE") {
            self.discovery.attributes_excludes_service = split_list(&raw);
        }
        if let Some(raw) = lookup("DISCOVERY_ATTRIBUTES_EXCLUDES_ROUTE") {
            self.discovery.attributes_excludes_route = split_list(&raw);
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for instance in &self.instances {
            if instance.name.trim().is_empty() {
                return Err(ChaosError::Config("instance name must not be empty".into()));
            }
            if !names.insert(instance.name.as_str()) {
                return Err(ChaosError::Config(format!(
                    "Duplicate instance name: {}",
                    instance.name
                )));
            }
            validate_base_url(instance)?;
            let has_key = instance.header_key.as_deref().is_some_and(|k| !k.is_empty());
            let has_value = instance.header_value.as_deref().is_some_and(|v| !v.is_empty());
            if has_key != has_value {
                return Err(ChaosError::Config(format!(
                    "instance '{}': header_key and header_value must be set together",
                    instance.name
                )));
            }
        }

        self.discovery.validate()?;

        if self.http.timeout_secs == 0 {
            return Err(ChaosError::Config("http.timeout_secs must be positive".into()));
        }

        Ok(())
    }

    pub fn directory(&self) -> InstanceDirectory {
        InstanceDirectory::new(self.instances.clone())
    }

    pub fn connector(&self) -> HttpConnector {
        HttpConnector::new(
            Duration::from_secs(self.http.timeout_secs),
            self.http.user_agent.clone(),
        )
    }
}

fn validate_base_url(instance: &Instance) -> Result<()> {
    let url = reqwest::Url::parse(&instance.base_url).map_err(|e| {
        ChaosError::Config(format!(
            "instance '{}': invalid base_url '{}': {}",
            instance.name, instance.base_url, e
        ))
    })?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ChaosError::Config(format!(
            "instance '{}': unsupported scheme '{}'",
            instance.name, other
        ))),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Discovery settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Refresh interval of service targets.
    pub services_interval_secs: u64,
    /// Refresh interval of route targets.
    pub routes_interval_secs: u64,
    /// Attribute keys (`*` wildcards allowed) stripped from service targets.
    pub attributes_excludes_service: Vec<String>,
    /// Attribute keys stripped from route targets.
    pub attributes_excludes_route: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            services_interval_secs: 150,
            routes_interval_secs: 300,
            attributes_excludes_service: Vec::new(),
            attributes_excludes_route: Vec::new(),
        }
    }
}

impl DiscoveryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.services_interval_secs == 0 || self.routes_interval_secs == 0 {
            return Err(ChaosError::Config(
                "discovery intervals must be positive".into(),
            ));
        }
        self.service_excludes()?;
        self.route_excludes()?;
        Ok(())
    }

    pub fn service_excludes(&self) -> Result<AttributeExcludes> {
        compile_excludes(&self.attributes_excludes_service)
    }

    pub fn route_excludes(&self) -> Result<AttributeExcludes> {
        compile_excludes(&self.attributes_excludes_route)
    }

    pub fn services_interval(&self) -> Duration {
        Duration::from_secs(self.services_interval_secs)
    }

    pub fn routes_interval(&self) -> Duration {
        Duration::from_secs(self.routes_interval_secs)
    }
}

fn compile_excludes(patterns: &[String]) -> Result<AttributeExcludes> {
    AttributeExcludes::new(patterns)
        .map_err(|e| ChaosError::Config(format!("invalid attribute exclude: {}", e)))
}

/// Admin API client settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: "kong-chaos".to_string(),
        }
    }
}
