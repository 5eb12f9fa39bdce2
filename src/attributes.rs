//! Target attribute keys and their human-readable labels.

use serde::Serialize;

pub const ATTR_INSTANCE_NAME: &str = "kong.instance.name";

pub const ATTR_SERVICE_ID: &str = "kong.service.id";
pub const ATTR_SERVICE_NAME: &str = "kong.service.name";
pub const ATTR_SERVICE_PROTOCOL: &str = "kong.service.protocol";
pub const ATTR_SERVICE_HOST: &str = "kong.service.host";
pub const ATTR_SERVICE_PORT: &str = "kong.service.port";
pub const ATTR_SERVICE_PATH: &str = "kong.service.path";
pub const ATTR_SERVICE_URL: &str = "kong.service.url";
pub const ATTR_SERVICE_ENABLED: &str = "kong.service.enabled";
pub const ATTR_SERVICE_TAG: &str = "kong.service.tag";

pub const ATTR_ROUTE_ID: &str = "kong.route.id";
pub const ATTR_ROUTE_NAME: &str = "kong.route.name";
pub const ATTR_ROUTE_PATH: &str = "kong.route.path";
pub const ATTR_ROUTE_HOST: &str = "kong.route.host";
pub const ATTR_ROUTE_TAG: &str = "kong.route.tag";
pub const ATTR_ROUTE_METHOD: &str = "kong.route.method";

/// Generic display-label attribute.
pub const ATTR_LABEL: &str = "label";

/// Singular and plural form of a label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluralLabel {
    pub one: &'static str,
    pub other: &'static str,
}

impl PluralLabel {
    pub const fn new(one: &'static str, other: &'static str) -> Self {
        Self { one, other }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributeDescription {
    pub attribute: &'static str,
    pub label: PluralLabel,
}

const fn describe(
    attribute: &'static str,
    one: &'static str,
    other: &'static str,
) -> AttributeDescription {
    AttributeDescription {
        attribute,
        label: PluralLabel::new(one, other),
    }
}

/// Label of every attribute key discovery emits.
pub fn attribute_descriptions() -> Vec<AttributeDescription> {
    vec![
        describe(ATTR_INSTANCE_NAME, "Kong instance name", "Kong instance names"),
        describe(ATTR_SERVICE_NAME, "Kong service name", "Kong service names"),
        describe(ATTR_SERVICE_ID, "Kong service ID", "Kong service IDs"),
        describe(ATTR_SERVICE_PROTOCOL, "Kong service protocol", "Kong service protocols"),
        describe(ATTR_SERVICE_HOST, "Kong service host", "Kong service hosts"),
        describe(ATTR_SERVICE_PORT, "Kong service port", "Kong service ports"),
        describe(ATTR_SERVICE_PATH, "Kong service path", "Kong service paths"),
        describe(ATTR_SERVICE_URL, "Kong service URL", "Kong service URLs"),
        describe(ATTR_SERVICE_TAG, "Kong service tag", "Kong service tags"),
        describe(ATTR_SERVICE_ENABLED, "Kong service enabled", "Kong service enabled"),
        describe(ATTR_ROUTE_NAME, "Kong route name", "Kong route names"),
        describe(ATTR_ROUTE_ID, "Kong route ID", "Kong route IDs"),
        describe(ATTR_ROUTE_TAG, "Kong route tag", "Kong route tags"),
        describe(ATTR_ROUTE_HOST, "Kong route host", "Kong route hosts"),
        describe(ATTR_ROUTE_METHOD, "Kong route method", "Kong route methods"),
        describe(ATTR_ROUTE_PATH, "Kong route path", "Kong route paths"),
        describe(ATTR_LABEL, "Label", "Labels"),
    ]
}

/// Label of one attribute key.
pub fn attribute_label(attribute: &str) -> Option<PluralLabel> {
    attribute_descriptions()
        .into_iter()
        .find(|d| d.attribute == attribute)
        .map(|d| d.label)
}
