//! Request-termination attack lifecycle: prepare, start, stop.
//!
//! Prepare creates a disabled `request-termination` plugin at service or
//! route level and returns an [`AttackState`]. Start enables the plugin,
//! stop deletes it. The state is the only thing carried between the three
//! calls; the orchestrator persists it and decides when to call stop.

use crate::error::{ChaosError, Result};
use crate::faults::TerminationConfig;
use crate::kong::{nullable_list, AdminApiError, PluginScope};
use crate::resolver::{ResourceResolver, Selector};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Level the plugin was created at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Service {
        service_id: String,
    },
    Route {
        service_id: String,
        route_id: String,
    },
}

impl Scope {
    pub fn service_id(&self) -> &str {
        match self {
            Scope::Service { service_id } | Scope::Route { service_id, .. } => service_id,
        }
    }

    pub fn route_id(&self) -> Option<&str> {
        match self {
            Scope::Service { .. } => None,
            Scope::Route { route_id, .. } => Some(route_id),
        }
    }

    pub fn plugin_scope(&self) -> PluginScope<'_> {
        match self {
            Scope::Service { service_id } => PluginScope::Service(service_id),
            Scope::Route { route_id, .. } => PluginScope::Route(route_id),
        }
    }
}

/// State handed back to the orchestrator after prepare and start.
///
/// Serialized as `{"InstanceName", "ServiceId", "RouteId", "PluginIds"}`
/// with an empty `RouteId` for service-level plugins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "StateRecord", try_from = "StateRecord")]
pub struct AttackState {
    pub instance_name: String,
    pub scope: Scope,
    pub plugin_ids: Vec<String>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StateRecord {
    #[serde(default)]
    instance_name: String,
    #[serde(default)]
    service_id: String,
    #[serde(default)]
    route_id: String,
    /// Go encoders write an empty list as `null`.
    #[serde(default, deserialize_with = "nullable_list")]
    plugin_ids: Vec<String>,
}

impl From<AttackState> for StateRecord {
    fn from(state: AttackState) -> Self {
        let (service_id, route_id) = match state.scope {
            Scope::Service { service_id } => (service_id, String::new()),
            Scope::Route {
                service_id,
                route_id,
            } => (service_id, route_id),
        };
        Self {
            instance_name: state.instance_name,
            service_id,
            route_id,
            plugin_ids: state.plugin_ids,
        }
    }
}

impl TryFrom<StateRecord> for AttackState {
    type Error = ChaosError;

    fn try_from(record: StateRecord) -> Result<Self> {
        if record.instance_name.is_empty() {
            return Err(ChaosError::InvalidState("missing InstanceName".to_string()));
        }
        if record.service_id.is_empty() {
            return Err(ChaosError::InvalidState("missing ServiceId".to_string()));
        }

        let scope = if record.route_id.is_empty() {
            Scope::Service {
                service_id: record.service_id,
            }
        } else {
            Scope::Route {
                service_id: record.service_id,
                route_id: record.route_id,
            }
        };

        Ok(Self {
            instance_name: record.instance_name,
            scope,
            plugin_ids: record.plugin_ids,
        })
    }
}

impl AttackState {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| ChaosError::InvalidState(e.to_string()))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| ChaosError::InvalidState(e.to_string()))
    }
}

/// The request-termination attack.
#[derive(Clone)]
pub struct RequestTermination {
    resolver: ResourceResolver,
}

impl RequestTermination {
    pub fn new(resolver: ResourceResolver) -> Self {
        Self { resolver }
    }

    /// Resolve the target and create a disabled plugin for it.
    ///
    /// The plugin is the last thing created, so a failure leaves nothing
    /// behind on the gateway.
    pub async fn prepare(
        &self,
        selector: &Selector,
        config: &TerminationConfig,
    ) -> Result<AttackState> {
        let connection = self.resolver.connect(&selector.instance_name)?;
        let resolved = self
            .resolver
            .resolve(
                connection.client.as_ref(),
                selector,
                config.consumer.as_deref(),
            )
            .await?;

        let service_id = resolved
            .service
            .id
            .clone()
            .ok_or_else(|| missing_id("service", &selector.service_id))?;
        let scope = match &resolved.route {
            Some(route) => Scope::Route {
                service_id,
                route_id: route.id.clone().ok_or_else(|| {
                    missing_id("route", selector.route_id.as_deref().unwrap_or_default())
                })?,
            },
            None => Scope::Service { service_id },
        };

        let plugin = config.to_plugin(resolved.consumer.as_ref());
        let created = connection
            .client
            .create_plugin(scope.plugin_scope(), &plugin)
            .await
            .map_err(|e| ChaosError::remote("Failed to create plugin", e))?;
        let plugin_id = created.id.ok_or_else(|| {
            ChaosError::remote(
                "Failed to create plugin",
                AdminApiError::Decode("response carries no plugin id".to_string()),
            )
        })?;

        info!(
            instance = %connection.instance.name,
            scope = %scope.plugin_scope(),
            plugin_id = %plugin_id,
            status = config.status,
            "Prepared disabled request-termination plugin"
        );

        Ok(AttackState {
            instance_name: connection.instance.name.clone(),
            scope,
            plugin_ids: vec![plugin_id],
        })
    }

    /// Enable every plugin in the state.
    ///
    /// Stops at the first failure; plugins enabled earlier in the same call
    /// stay enabled until stop removes them.
    pub async fn start(&self, state: &AttackState) -> Result<AttackState> {
        let connection = self.resolver.connect(&state.instance_name)?;
        let scope = state.scope.plugin_scope();

        for plugin_id in &state.plugin_ids {
            connection
                .client
                .update_plugin(scope, plugin_id, true)
                .await
                .map_err(|e| {
                    ChaosError::remote(
                        format!(
                            "Failed to enable plugin within Kong for plugin ID '{}' at {} level",
                            plugin_id,
                            scope.level()
                        ),
                        e,
                    )
                })?;
            info!(
                instance = %state.instance_name,
                %scope,
                plugin_id = %plugin_id,
                "Enabled plugin"
            );
        }

        Ok(state.clone())
    }

    /// Delete every plugin in the state, enabled or not.
    pub async fn stop(&self, state: &AttackState) -> Result<()> {
        let connection = self.resolver.connect(&state.instance_name)?;
        let scope = state.scope.plugin_scope();

        for plugin_id in &state.plugin_ids {
            connection
                .client
                .delete_plugin(scope, plugin_id)
                .await
                .map_err(|e| {
                    ChaosError::remote(
                        format!(
                            "Failed to delete plugin within Kong for plugin ID '{}' at {} level",
                            plugin_id,
                            scope.level()
                        ),
                        e,
                    )
                })?;
            info!(
                instance = %state.instance_name,
                %scope,
                plugin_id = %plugin_id,
                "Deleted plugin"
            );
        }

        debug!(plugins = state.plugin_ids.len(), "Attack stopped");
        Ok(())
    }
}

fn missing_id(kind: &str, requested: &str) -> ChaosError {
    ChaosError::remote(
        format!("Failed to find {} '{}' within Kong", kind, requested),
        AdminApiError::Decode(format!("{} carries no id", kind)),
    )
}
