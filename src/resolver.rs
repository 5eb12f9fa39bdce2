//! Resolution of a target selector into concrete Kong resources.

use crate::attributes::{ATTR_INSTANCE_NAME, ATTR_ROUTE_ID, ATTR_SERVICE_ID};
use crate::error::{ChaosError, Result};
use crate::instance::{Instance, InstanceDirectory};
use crate::kong::{Connector, Consumer, GatewayClient, Route, Service};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// What an attack is aimed at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    pub instance_name: String,
    pub service_id: String,
    pub route_id: Option<String>,
}

impl Selector {
    pub fn service(instance_name: impl Into<String>, service_id: impl Into<String>) -> Self {
        Self {
            instance_name: instance_name.into(),
            service_id: service_id.into(),
            route_id: None,
        }
    }

    pub fn with_route(mut self, route_id: impl Into<String>) -> Self {
        self.route_id = Some(route_id.into());
        self
    }

    /// Build a selector from a discovered target's attributes, taking the
    /// first value of each key.
    pub fn from_attributes(attributes: &HashMap<String, Vec<String>>) -> Result<Self> {
        let instance_name = first_value(attributes, ATTR_INSTANCE_NAME).ok_or_else(|| {
            ChaosError::InvalidSelector(format!(
                "Missing target attribute '{}'",
                ATTR_INSTANCE_NAME
            ))
        })?;
        let service_id = first_value(attributes, ATTR_SERVICE_ID).ok_or_else(|| {
            ChaosError::InvalidSelector(format!(
                "Missing target attribute '{}' required.",
                ATTR_SERVICE_ID
            ))
        })?;

        Ok(Self {
            instance_name: instance_name.to_string(),
            service_id: service_id.to_string(),
            route_id: first_value(attributes, ATTR_ROUTE_ID).map(str::to_string),
        })
    }
}

fn first_value<'a>(attributes: &'a HashMap<String, Vec<String>>, key: &str) -> Option<&'a str> {
    attributes
        .get(key)
        .and_then(|values| values.first())
        .map(String::as_str)
        .filter(|v| !v.is_empty())
}

/// Instance plus a connected client.
pub struct Connection<'a> {
    pub instance: &'a Instance,
    pub client: Arc<dyn GatewayClient>,
}

/// Resources a selector resolved to.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub service: Service,
    pub route: Option<Route>,
    pub consumer: Option<Consumer>,
}

/// Looks up instances and the resources behind a selector.
#[derive(Clone)]
pub struct ResourceResolver {
    directory: InstanceDirectory,
    connector: Arc<dyn Connector>,
}

impl ResourceResolver {
    pub fn new(directory: InstanceDirectory, connector: Arc<dyn Connector>) -> Self {
        Self {
            directory,
            connector,
        }
    }

    pub fn directory(&self) -> &InstanceDirectory {
        &self.directory
    }

    /// Find the named instance and connect to it.
    pub fn connect(&self, instance_name: &str) -> Result<Connection<'_>> {
        let instance = self
            .directory
            .lookup(instance_name)
            .ok_or_else(|| ChaosError::InstanceNotFound(instance_name.to_string()))?;
        let client = self.connector.connect(instance).map_err(|e| {
            ChaosError::remote(
                format!("Failed to connect to instance '{}'", instance.name),
                e,
            )
        })?;
        Ok(Connection { instance, client })
    }

    /// Resolve service, optional route, and optional consumer.
    ///
    /// The route must belong to the selected service; an empty consumer name
    /// means no consumer.
    pub async fn resolve(
        &self,
        client: &dyn GatewayClient,
        selector: &Selector,
        consumer: Option<&str>,
    ) -> Result<Resolved> {
        if selector.service_id.is_empty() {
            return Err(ChaosError::InvalidSelector(format!(
                "Missing target attribute '{}' required.",
                ATTR_SERVICE_ID
            )));
        }

        let service = client
            .find_service(&selector.service_id)
            .await
            .map_err(|e| ChaosError::ServiceNotFound {
                id: selector.service_id.clone(),
                reason: e.to_string(),
            })?;

        let route = match selector.route_id.as_deref().filter(|r| !r.is_empty()) {
            Some(route_id) => Some(self.resolve_route(client, &service, route_id).await?),
            None => None,
        };

        let consumer = match consumer.filter(|c| !c.is_empty()) {
            Some(name) => Some(client.find_consumer(name).await.map_err(|e| {
                ChaosError::ConsumerNotFound {
                    id: name.to_string(),
                    reason: e.to_string(),
                }
            })?),
            None => None,
        };

        debug!(
            service = ?service.id,
            route = ?route.as_ref().and_then(|r| r.id.as_ref()),
            consumer = ?consumer.as_ref().and_then(|c| c.id.as_ref()),
            "Selector resolved"
        );

        Ok(Resolved {
            service,
            route,
            consumer,
        })
    }

    async fn resolve_route(
        &self,
        client: &dyn GatewayClient,
        service: &Service,
        route_id: &str,
    ) -> Result<Route> {
        let service_id = service.id.as_deref().unwrap_or_default();
        let route = client
            .find_route(service_id, route_id)
            .await
            .map_err(|e| ChaosError::RouteNotFound {
                id: route_id.to_string(),
                reason: e.to_string(),
            })?;

        // Ownership is checked here rather than trusted from the API.
        match route.service_id() {
            Some(owner) if owner == service_id => Ok(route),
            owner => Err(ChaosError::RouteNotFound {
                id: route_id.to_string(),
                reason: format!(
                    "route does not belong to service '{}' (owned by '{}')",
                    service_id,
                    owner.unwrap_or("none")
                ),
            }),
        }
    }
}
