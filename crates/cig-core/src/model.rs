//! OData response models
//!
//! The integration API wraps single entities as `{"d": {...}}` and
//! collections as `{"d": {"results": [...]}}`.

use serde::{Deserialize, Serialize};

/// Version token addressing the currently active version of an artifact
pub const ACTIVE_VERSION: &str = "active";

/// Single-entity envelope
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Entity<T> {
    pub d: T,
}

/// Collection envelope
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Collection<T> {
    pub d: Results<T>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Results<T> {
    pub results: Vec<T>,
}

/// OData entity metadata
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Metadata {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub uri: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub media_src: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub edit_media: String,
}

/// Design-time integration flow
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct IntegrationFlow {
    #[serde(rename = "__metadata", default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub package_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub receiver: String,
    #[serde(default)]
    pub created_by: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub modified_by: String,
    #[serde(default)]
    pub modified_at: String,
}

/// Integration package
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct IntegrationPackage {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub short_text: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub vendor: String,
    #[serde(default)]
    pub partner_content: bool,
    #[serde(default)]
    pub update_available: bool,
    #[serde(default)]
    pub mode: String,
    #[serde(default)]
    pub supported_platform: String,
    #[serde(default)]
    pub modified_by: String,
    #[serde(default)]
    pub creation_date: String,
    #[serde(default)]
    pub modified_date: String,
    #[serde(default)]
    pub created_by: String,
    #[serde(default)]
    pub products: String,
    #[serde(default)]
    pub keywords: String,
    #[serde(default)]
    pub countries: String,
    #[serde(default)]
    pub industries: String,
    #[serde(default)]
    pub line_of_business: String,
}

/// Externalized configuration parameter as returned by the service
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct FlowConfiguration {
    #[serde(rename = "__metadata", default, skip_serializing)]
    pub metadata: Metadata,
    pub parameter_key: String,
    #[serde(default)]
    pub parameter_value: String,
    #[serde(default)]
    pub data_type: String,
}

/// Parameter value to write back to a flow
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConfigurationParameter {
    pub parameter_key: String,
    #[serde(default)]
    pub parameter_value: String,
    #[serde(default)]
    pub data_type: String,
}

impl ConfigurationParameter {
    pub fn new(key: impl Into<String>, value: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            parameter_key: key.into(),
            parameter_value: value.into(),
            data_type: data_type.into(),
        }
    }
}

impl From<FlowConfiguration> for ConfigurationParameter {
    fn from(c: FlowConfiguration) -> Self {
        Self {
            parameter_key: c.parameter_key,
            parameter_value: c.parameter_value,
            data_type: c.data_type,
        }
    }
}

/// Body of a single configuration write
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ParameterValueBody<'a> {
    pub parameter_value: &'a str,
    pub data_type: &'a str,
}

impl<'a> From<&'a ConfigurationParameter> for ParameterValueBody<'a> {
    fn from(p: &'a ConfigurationParameter) -> Self {
        Self {
            parameter_value: &p.parameter_value,
            data_type: &p.data_type,
        }
    }
}
