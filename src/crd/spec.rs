//! # ExternalService Spec
//!
//! Main CRD specification types and default values.

use crate::constants::DEFAULT_RESOURCE_TYPE;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// ExternalService Custom Resource Definition
///
/// Declares a service release that should exist at the provider with the given
/// parameters. The controller creates the release, follows it until the provider
/// reports it ready, pushes parameter changes, and deletes it when the resource
/// is removed.
///
/// # Example
///
/// ```yaml
/// apiVersion: externalservice.octopilot.io/v1
/// kind: ExternalService
/// metadata:
///   name: orders-db
///   namespace: default
/// spec:
///   serviceId: mysql-catalog
///   releaseId: orders-db-2024-06
///   params:
///     replicas:
///       int: 3
///     version:
///       string: "8.0"
///     options:
///       yaml: |
///         max_connections: 200
///         charset: utf8mb4
///     password:
///       valueFrom:
///         secretKeyRef:
///           name: orders-db-credentials
///           key: password
/// ```
#[derive(kube::CustomResource, Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "ExternalService",
    group = "externalservice.octopilot.io",
    version = "v1",
    namespaced,
    status = "crate::crd::ExternalServiceStatus",
    shortname = "exs",
    printcolumn = r#"{"name":"Phase", "type":"string", "jsonPath":".status.phase"}, {"name":"External ID", "type":"string", "jsonPath":".status.externalId"}, {"name":"Reason", "type":"string", "jsonPath":".status.reason"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ExternalServiceSpec {
    /// Parameters sent to the provider, keyed by parameter name
    #[serde(default)]
    pub params: BTreeMap<String, crate::crd::ParamSource>,
    /// Provider-side service identifier the release belongs to
    #[serde(default)]
    pub service_id: String,
    /// Release identifier; the provider keys release creation on it
    #[serde(default)]
    pub release_id: String,
    /// Adapter tag selecting which provider resource type manages this object
    /// Default: "ServiceRelease"
    #[serde(default = "default_resource_type")]
    pub resource_type: String,
}

/// Default value for the adapter tag
pub fn default_resource_type() -> String {
    DEFAULT_RESOURCE_TYPE.to_string()
}
