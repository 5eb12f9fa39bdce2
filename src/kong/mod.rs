//! Kong Admin API access.
//!
//! [`GatewayClient`] is the seam the lifecycle and discovery code talk to;
//! [`AdminClient`] implements it over HTTP, and a [`Connector`] hands out a
//! client per configured instance.

mod client;
mod models;

pub use client::{AdminClient, HttpConnector};
pub use models::{Consumer, Plugin, ResourceRef, Route, Service};
pub(crate) use models::{nullable_list, Page};

use crate::instance::Instance;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Admin API errors.
#[derive(Debug, Error)]
pub enum AdminApiError {
    /// The addressed entity does not exist (HTTP 404).
    #[error("Not found: {0}")]
    NotFound(String),

    /// Any other non-success status.
    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    /// The request never got a response (connect, TLS, timeout).
    #[error("Connection failed: {0}")]
    Transport(String),

    /// The response body was not what the API documents.
    #[error("Parse error: {0}")]
    Decode(String),

    /// The client could not be built for this instance.
    #[error("Invalid client configuration: {0}")]
    InvalidClient(String),
}

/// Level a plugin is attached at. The same plugin id is addressed through a
/// different URL family at each level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginScope<'a> {
    Service(&'a str),
    Route(&'a str),
}

impl<'a> PluginScope<'a> {
    /// `service` or `route`, as used in error messages.
    pub fn level(&self) -> &'static str {
        match self {
            PluginScope::Service(_) => "service",
            PluginScope::Route(_) => "route",
        }
    }

    /// Collection and id the plugins endpoint hangs off.
    pub(crate) fn owner(&self) -> (&'static str, &'a str) {
        match *self {
            PluginScope::Service(id) => ("services", id),
            PluginScope::Route(id) => ("routes", id),
        }
    }

    pub(crate) fn plugins_path(&self) -> String {
        match self {
            PluginScope::Service(id) => format!("/services/{}/plugins", id),
            PluginScope::Route(id) => format!("/routes/{}/plugins", id),
        }
    }
}

impl fmt::Display for PluginScope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginScope::Service(id) => write!(f, "service {}", id),
            PluginScope::Route(id) => write!(f, "route {}", id),
        }
    }
}

/// Remote-call primitives against one Kong instance.
#[async_trait]
pub trait GatewayClient: Send + Sync {
    /// Fetch a service by id or name.
    async fn find_service(&self, id_or_name: &str) -> Result<Service, AdminApiError>;

    /// Fetch a route by id or name, addressed under its service.
    async fn find_route(&self, service_id: &str, id_or_name: &str)
        -> Result<Route, AdminApiError>;

    /// Fetch a consumer by id or username.
    async fn find_consumer(&self, id_or_name: &str) -> Result<Consumer, AdminApiError>;

    /// List every service, across all pages.
    async fn list_services(&self) -> Result<Vec<Service>, AdminApiError>;

    /// List every route of one service, across all pages.
    async fn list_routes_for_service(&self, service_id: &str)
        -> Result<Vec<Route>, AdminApiError>;

    /// Create a plugin at the given level.
    async fn create_plugin(
        &self,
        scope: PluginScope<'_>,
        plugin: &Plugin,
    ) -> Result<Plugin, AdminApiError>;

    /// Flip the enabled flag of an existing plugin.
    async fn update_plugin(
        &self,
        scope: PluginScope<'_>,
        plugin_id: &str,
        enabled: bool,
    ) -> Result<Plugin, AdminApiError>;

    /// Delete a plugin. Deleting an already deleted plugin fails.
    async fn delete_plugin(&self, scope: PluginScope<'_>, plugin_id: &str)
        -> Result<(), AdminApiError>;
}

/// Produces a client for an instance.
pub trait Connector: Send + Sync {
    fn connect(&self, instance: &Instance) -> Result<Arc<dyn GatewayClient>, AdminApiError>;
}
