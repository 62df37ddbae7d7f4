//! # Provider Modules
//!
//! Adapters between `ExternalService` objects and the provider that owns the
//! real resources.
//!
//! Each resource type implements [`ExternalResourceAdapter`]. The controller
//! never picks an adapter by itself: an [`AdapterRegistry`] built at start-up
//! maps `spec.resourceType` tags to adapter instances and is handed to the
//! reconciler.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

mod error;
mod registry;

pub mod release;

pub use error::ProviderError;
pub use registry::AdapterRegistry;

/// Resolved parameter bag sent to the provider
pub type Params = BTreeMap<String, Value>;

/// Open field bag returned by a detail lookup
pub type ExternalDetail = Map<String, Value>;

/// Normalized result of a provider operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalInfo {
    /// Provider-assigned identifier of the release
    pub id: String,
    /// Raw provider status string (e.g. `ready`, `deploy_failed`)
    pub raw_status: String,
    /// Name of the operation the provider reports as last executed
    pub action: String,
    /// Provider-side id of the workload backing the release, when reported
    pub resource_id: Option<String>,
}

/// Result of a successful create
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedResource {
    pub info: ExternalInfo,
    /// Lookup key of the owning service, resolved before the create call
    pub primary_key: String,
}

/// Capability set every provider resource type implements
///
/// Each call targets exactly one provider operation (create additionally
/// resolves the service's primary key first). Implementations must report
/// unparseable responses as [`ProviderError::MalformedResponse`] rather than
/// defaulting fields.
#[async_trait]
pub trait ExternalResourceAdapter: Send + Sync {
    /// Create a release keyed by `release_id`
    async fn create(
        &self,
        service_id: &str,
        release_id: &str,
        params: &Params,
    ) -> Result<CreatedResource, ProviderError>;

    /// Replace the parameters of an existing release
    async fn update(
        &self,
        service_id: &str,
        external_id: &str,
        params: &Params,
    ) -> Result<ExternalInfo, ProviderError>;

    /// Delete an existing release
    async fn delete(&self, service_id: &str, external_id: &str)
        -> Result<ExternalInfo, ProviderError>;

    /// Current status of a release
    async fn get_status(
        &self,
        service_id: &str,
        external_id: &str,
    ) -> Result<ExternalInfo, ProviderError>;

    /// Full provider view of a release, including the echoed `request_params`
    async fn get_detail(
        &self,
        service_id: &str,
        external_id: &str,
    ) -> Result<ExternalDetail, ProviderError>;
}
