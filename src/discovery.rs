//! Discovery of Kong services and routes as attribute-tagged targets.
//!
//! Each cycle lists every configured instance on its own task. An instance
//! that cannot be listed contributes no targets and is logged; the others
//! are unaffected. Attribute suppression runs once over the finished list.

use crate::attributes::*;
use crate::instance::{Instance, InstanceDirectory};
use crate::kong::{AdminApiError, Connector, GatewayClient, Route, Service};
use crate::targeting::AttributeExcludes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, warn};

pub const SERVICE_TARGET_TYPE: &str = "com.kong-chaos.service";
pub const ROUTE_TARGET_TYPE: &str = "com.kong-chaos.route";

/// A discovered resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    /// `{instance}-{resource id}`.
    pub id: String,
    pub label: String,
    pub target_type: String,
    pub attributes: BTreeMap<String, Vec<String>>,
}

impl Target {
    /// First value of an attribute.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .get(key)
            .and_then(|v| v.first())
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryKind {
    Services,
    Routes,
}

impl DiscoveryKind {
    pub fn target_type(&self) -> &'static str {
        match self {
            DiscoveryKind::Services => SERVICE_TARGET_TYPE,
            DiscoveryKind::Routes => ROUTE_TARGET_TYPE,
        }
    }
}

impl fmt::Display for DiscoveryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoveryKind::Services => f.write_str("services"),
            DiscoveryKind::Routes => f.write_str("routes"),
        }
    }
}

/// One discovery producer (services or routes) over all instances.
#[derive(Clone)]
pub struct TargetDiscovery {
    kind: DiscoveryKind,
    directory: InstanceDirectory,
    connector: Arc<dyn Connector>,
    excludes: AttributeExcludes,
}

impl TargetDiscovery {
    pub fn new(
        kind: DiscoveryKind,
        directory: InstanceDirectory,
        connector: Arc<dyn Connector>,
        excludes: AttributeExcludes,
    ) -> Self {
        Self {
            kind,
            directory,
            connector,
            excludes,
        }
    }

    pub fn kind(&self) -> DiscoveryKind {
        self.kind
    }

    /// Run one discovery cycle.
    pub async fn discover(&self) -> Vec<Target> {
        let handles: Vec<_> = self
            .directory
            .iter()
            .map(|instance| {
                let kind = self.kind;
                let connector = Arc::clone(&self.connector);
                let instance = instance.clone();
                let name = instance.name.clone();
                let handle = tokio::spawn(async move {
                    discover_instance(kind, connector.as_ref(), &instance).await
                });
                (name, handle)
            })
            .collect();

        let mut targets = Vec::new();
        for (name, handle) in handles {
            match handle.await {
                Ok(found) => targets.extend(found),
                Err(e) => {
                    error!(instance = %name, error = %e, kind = %self.kind, "Discovery task failed")
                }
            }
        }

        for target in &mut targets {
            self.excludes.apply(&mut target.attributes);
        }

        debug!(kind = %self.kind, targets = targets.len(), "Discovery cycle finished");
        targets
    }
}

/// Targets of one instance; failures are logged and yield nothing.
async fn discover_instance(
    kind: DiscoveryKind,
    connector: &dyn Connector,
    instance: &Instance,
) -> Vec<Target> {
    let result = match connector.connect(instance) {
        Ok(client) => match kind {
            DiscoveryKind::Services => service_targets(client.as_ref(), instance).await,
            DiscoveryKind::Routes => route_targets(client.as_ref(), instance).await,
        },
        Err(e) => Err(e),
    };

    result.unwrap_or_else(|e| {
        error!(
            instance = %instance.name,
            base_url = %instance.base_url,
            error = %e,
            "Failed to get {} from Kong instance",
            kind
        );
        Vec::new()
    })
}

/// List services of an instance and project each into a target.
pub async fn service_targets(
    client: &dyn GatewayClient,
    instance: &Instance,
) -> Result<Vec<Target>, AdminApiError> {
    let services = client.list_services().await?;
    Ok(services
        .iter()
        .filter_map(|service| service_target(&instance.name, service))
        .collect())
}

/// List routes service by service and project each into a target.
///
/// A service whose routes cannot be listed is skipped.
pub async fn route_targets(
    client: &dyn GatewayClient,
    instance: &Instance,
) -> Result<Vec<Target>, AdminApiError> {
    let services = client.list_services().await?;
    let mut targets = Vec::new();

    for service in &services {
        let Some(service_id) = service.id.as_deref() else {
            continue;
        };
        let routes = match client.list_routes_for_service(service_id).await {
            Ok(routes) => routes,
            Err(e) => {
                warn!(
                    instance = %instance.name,
                    base_url = %instance.base_url,
                    service = %service_id,
                    error = %e,
                    "Failed to get routes for service"
                );
                continue;
            }
        };
        targets.extend(
            routes
                .iter()
                .filter_map(|route| route_target(&instance.name, service, route)),
        );
    }

    Ok(targets)
}

/// Project a service. Services without an id cannot be addressed and are
/// skipped.
pub fn service_target(instance_name: &str, service: &Service) -> Option<Target> {
    let id = service.id.as_deref()?;
    let mut attributes = BTreeMap::new();
    put(&mut attributes, ATTR_INSTANCE_NAME, instance_name);
    put(&mut attributes, ATTR_SERVICE_ID, id);

    if let Some(name) = &service.name {
        put(&mut attributes, ATTR_SERVICE_NAME, name);
        put(&mut attributes, ATTR_LABEL, name);
    }
    if let Some(protocol) = &service.protocol {
        put(&mut attributes, ATTR_SERVICE_PROTOCOL, protocol);
    }
    if let Some(host) = &service.host {
        put(&mut attributes, ATTR_SERVICE_HOST, host);
    }
    if let Some(port) = service.port {
        put(&mut attributes, ATTR_SERVICE_PORT, &port.to_string());
    }
    if let Some(path) = &service.path {
        put(&mut attributes, ATTR_SERVICE_PATH, path);
    }
    if let Some(url) = service_url(service) {
        put(&mut attributes, ATTR_SERVICE_URL, &url);
    }
    if let Some(enabled) = service.enabled {
        put(&mut attributes, ATTR_SERVICE_ENABLED, &enabled.to_string());
    }
    put_all(&mut attributes, ATTR_SERVICE_TAG, &service.tags);

    Some(Target {
        id: format!("{}-{}", instance_name, id),
        label: service.name.clone().unwrap_or_else(|| id.to_string()),
        target_type: SERVICE_TARGET_TYPE.to_string(),
        attributes,
    })
}

/// The service's own URL if Kong returned one, else
/// `protocol://host[:port][path]` with missing parts left out.
pub fn service_url(service: &Service) -> Option<String> {
    if let Some(url) = &service.url {
        return Some(url.clone());
    }

    let mut url = String::new();
    if let Some(protocol) = &service.protocol {
        url.push_str(protocol);
        url.push_str("://");
    }
    if let Some(host) = &service.host {
        url.push_str(host);
    }
    if let Some(port) = service.port {
        url.push(':');
        url.push_str(&port.to_string());
    }
    if let Some(path) = &service.path {
        url.push_str(path);
    }

    (!url.is_empty()).then_some(url)
}

/// Project a route. Routes missing an id or a name are skipped.
pub fn route_target(instance_name: &str, service: &Service, route: &Route) -> Option<Target> {
    let (id, name) = match (route.id.as_deref(), route.name.as_deref()) {
        (Some(id), Some(name)) => (id, name),
        _ => return None,
    };

    let mut attributes = BTreeMap::new();
    put(&mut attributes, ATTR_INSTANCE_NAME, instance_name);
    put(&mut attributes, ATTR_ROUTE_ID, id);
    put(&mut attributes, ATTR_ROUTE_NAME, name);
    put(&mut attributes, ATTR_LABEL, name);
    if let Some(service_id) = &service.id {
        put(&mut attributes, ATTR_SERVICE_ID, service_id);
    }
    if let Some(service_name) = &service.name {
        put(&mut attributes, ATTR_SERVICE_NAME, service_name);
    }
    put_all(&mut attributes, ATTR_ROUTE_PATH, &route.paths);
    put_all(&mut attributes, ATTR_ROUTE_HOST, &route.hosts);
    put_all(&mut attributes, ATTR_ROUTE_TAG, &route.tags);
    put_all(&mut attributes, ATTR_ROUTE_METHOD, &route.methods);

    Some(Target {
        id: format!("{}-{}", instance_name, id),
        label: name.to_string(),
        target_type: ROUTE_TARGET_TYPE.to_string(),
        attributes,
    })
}

fn put(attributes: &mut BTreeMap<String, Vec<String>>, key: &str, value: &str) {
    attributes.insert(key.to_string(), vec![value.to_string()]);
}

/// Multi-valued attribute, order preserved; omitted when empty.
fn put_all(attributes: &mut BTreeMap<String, Vec<String>>, key: &str, values: &[String]) {
    if !values.is_empty() {
        attributes.insert(key.to_string(), values.to_vec());
    }
}
