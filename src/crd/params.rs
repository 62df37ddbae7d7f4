//! # Parameter Sources
//!
//! Typed value sources for `ExternalService` parameters.

use serde::{Deserialize, Serialize};

/// Where the value of one parameter comes from
///
/// Exactly one field must be set. Resolution happens on every reconciliation,
/// so referenced ConfigMaps, Secrets and environment variables are re-read each time.
#[derive(Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ParamSource {
    /// Integer literal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub int: Option<i64>,
    /// String literal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string: Option<String>,
    /// Structured value written as a YAML document
    /// Parsed into maps, lists and scalars before it is sent to the provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yaml: Option<String>,
    /// Value read from the environment or from another object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_from: Option<ParamValueFrom>,
}

/// Reference to a value held outside the `ExternalService` object
#[derive(Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ParamValueFrom {
    /// Environment variable of the controller process
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<String>,
    /// Key of a ConfigMap in the resource namespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_map_key_ref: Option<KeyRef>,
    /// Key of a Secret in the resource namespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key_ref: Option<KeyRef>,
}

/// Selects a key of a ConfigMap or Secret
#[derive(Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct KeyRef {
    /// Object name
    pub name: String,
    /// Key within the object's data
    pub key: String,
    /// When true, a missing object or key omits the parameter instead of failing
    #[serde(default)]
    pub optional: bool,
}
