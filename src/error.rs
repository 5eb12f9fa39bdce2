//! Error types for gateway resolution and the fault-injection lifecycle.

use crate::kong::AdminApiError;
use thiserror::Error;

/// Errors surfaced by prepare/start/stop and by configuration loading.
///
/// Every variant names the resource it failed on so the message can be
/// handed to the orchestrator verbatim.
#[derive(Debug, Error)]
pub enum ChaosError {
    /// No instance with this name is configured.
    #[error("Failed to find a configured instance named '{0}'")]
    InstanceNotFound(String),

    /// Service lookup failed, either missing or unreachable.
    #[error("Failed to find service '{id}' within Kong: {reason}")]
    ServiceNotFound { id: String, reason: String },

    /// Route lookup failed, or the route belongs to another service.
    #[error("Failed to find route '{id}' within Kong: {reason}")]
    RouteNotFound { id: String, reason: String },

    /// Consumer lookup failed.
    #[error("Failed to find consumer '{id}' within Kong: {reason}")]
    ConsumerNotFound { id: String, reason: String },

    /// Any other Admin API failure (create/update/delete, transport).
    #[error("{context}: {source}")]
    RemoteCallFailed {
        context: String,
        #[source]
        source: AdminApiError,
    },

    /// Required target attribute missing from the selector.
    #[error("{0}")]
    InvalidSelector(String),

    /// Attack state handed back by the orchestrator cannot be used.
    #[error("Invalid attack state: {0}")]
    InvalidState(String),

    /// Configuration failed validation.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl ChaosError {
    pub(crate) fn remote(context: impl Into<String>, source: AdminApiError) -> Self {
        Self::RemoteCallFailed {
            context: context.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ChaosError>;
