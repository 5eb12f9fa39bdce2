//! Self-description of the extension: target types and the attack with its
//! parameters, for orchestrators and the `describe` command.

use crate::attributes::*;
use crate::discovery::{DiscoveryKind, ROUTE_TARGET_TYPE, SERVICE_TARGET_TYPE};
use crate::faults::{DEFAULT_MESSAGE, DEFAULT_STATUS, PLUGIN_NAME};
use serde::Serialize;

pub const ACTION_ID: &str = "com.kong-chaos.request-termination";
pub const CATEGORY: &str = "API gateway";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderBy {
    pub attribute: &'static str,
    pub direction: Direction,
}

/// How a target type is presented in a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetDescription {
    pub id: &'static str,
    pub label: PluralLabel,
    pub category: &'static str,
    pub version: &'static str,
    pub columns: Vec<&'static str>,
    pub order_by: Vec<OrderBy>,
}

pub fn target_description(kind: DiscoveryKind) -> TargetDescription {
    match kind {
        DiscoveryKind::Services => TargetDescription {
            id: SERVICE_TARGET_TYPE,
            label: PluralLabel::new("Kong service", "Kong services"),
            category: CATEGORY,
            version: env!("CARGO_PKG_VERSION"),
            columns: vec![
                ATTR_SERVICE_NAME,
                ATTR_SERVICE_URL,
                ATTR_INSTANCE_NAME,
                ATTR_SERVICE_TAG,
                ATTR_SERVICE_ENABLED,
            ],
            order_by: vec![OrderBy {
                attribute: ATTR_SERVICE_NAME,
                direction: Direction::Asc,
            }],
        },
        DiscoveryKind::Routes => TargetDescription {
            id: ROUTE_TARGET_TYPE,
            label: PluralLabel::new("Kong route", "Kong routes"),
            category: CATEGORY,
            version: env!("CARGO_PKG_VERSION"),
            columns: vec![
                ATTR_INSTANCE_NAME,
                ATTR_ROUTE_NAME,
                ATTR_ROUTE_ID,
                ATTR_SERVICE_NAME,
                ATTR_ROUTE_TAG,
                ATTR_ROUTE_HOST,
                ATTR_ROUTE_METHOD,
                ATTR_ROUTE_PATH,
            ],
            order_by: vec![OrderBy {
                attribute: ATTR_ROUTE_NAME,
                direction: Direction::Asc,
            }],
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    String,
    Integer,
}

/// One attack parameter; `name` is the key in the fault configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterDescription {
    pub name: &'static str,
    pub label: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'static str>,
    #[serde(rename = "type")]
    pub kind: ParameterType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    pub required: bool,
    pub advanced: bool,
}

/// Query template an orchestrator offers to pick targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectionTemplate {
    pub label: &'static str,
    pub description: &'static str,
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionDescription {
    pub id: &'static str,
    pub label: &'static str,
    pub description: String,
    pub version: &'static str,
    pub target_types: Vec<&'static str>,
    pub selection_templates: Vec<SelectionTemplate>,
    pub parameters: Vec<ParameterDescription>,
}

fn parameter(
    name: &'static str,
    label: &'static str,
    kind: ParameterType,
    description: Option<&'static str>,
) -> ParameterDescription {
    ParameterDescription {
        name,
        label,
        description,
        kind,
        default_value: None,
        required: false,
        advanced: true,
    }
}

fn template(label: &'static str, description: &'static str, attribute: &str) -> SelectionTemplate {
    SelectionTemplate {
        label,
        description,
        query: format!("{}=\"\"", attribute),
    }
}

/// The request-termination attack.
pub fn action_description() -> ActionDescription {
    ActionDescription {
        id: ACTION_ID,
        label: "Terminate requests",
        description: format!(
            "Leverage the Kong {} plugin to inject HTTP failures \
             for specific Kong services or routes.",
            PLUGIN_NAME
        ),
        version: env!("CARGO_PKG_VERSION"),
        target_types: vec![SERVICE_TARGET_TYPE, ROUTE_TARGET_TYPE],
        selection_templates: vec![
            template("service-name", "Find service by name", ATTR_SERVICE_NAME),
            template("route-id", "Find route by id", ATTR_ROUTE_ID),
            template("route-name", "Find route by name", ATTR_ROUTE_NAME),
        ],
        parameters: vec![
            ParameterDescription {
                advanced: false,
                ..parameter(
                    "consumer",
                    "Consumer Username or ID",
                    ParameterType::String,
                    Some(
                        "You may optionally define for which Kong consumer \
                         the traffic should be impacted.",
                    ),
                )
            },
            ParameterDescription {
                default_value: Some(DEFAULT_MESSAGE.to_string()),
                ..parameter("message", "Message", ParameterType::String, None)
            },
            parameter(
                "contentType",
                "Content-Type",
                ParameterType::String,
                Some("Content-Type response header to be returned for terminated requests."),
            ),
            parameter(
                "body",
                "Body",
                ParameterType::String,
                Some(
                    "The raw response body to be returned for terminated requests. \
                     Takes precedence over the message parameter.",
                ),
            ),
            ParameterDescription {
                default_value: Some(DEFAULT_STATUS.to_string()),
                ..parameter("status", "HTTP status code", ParameterType::Integer, None)
            },
            parameter(
                "trigger",
                "Trigger",
                ParameterType::String,
                Some(
                    "When not set, the plugin always activates. When set, the plugin activates \
                     only on requests carrying a header or query parameter of that name.",
                ),
            ),
        ],
    }
}

/// Everything the extension describes about itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Catalog {
    pub attributes: Vec<AttributeDescription>,
    pub targets: Vec<TargetDescription>,
    pub action: ActionDescription,
}

pub fn catalog() -> Catalog {
    Catalog {
        attributes: attribute_descriptions(),
        targets: vec![
            target_description(DiscoveryKind::Services),
            target_description(DiscoveryKind::Routes),
        ],
        action: action_description(),
    }
}
