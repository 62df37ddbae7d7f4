//! # Status Updates
//!
//! Commits the observed status of an `ExternalService`.

use crate::constants::FIELD_MANAGER;
use crate::crd::{ExternalService, ExternalServiceStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, ResourceExt};
use serde_json::json;
use tracing::debug;

/// Writes a complete status record for an object
///
/// A commit replaces the whole record at once; partial writes are never visible.
#[async_trait]
pub trait StatusWriter: Send + Sync {
    async fn commit(&self, service: &ExternalService, status: &ExternalServiceStatus) -> Result<()>;
}

/// [`StatusWriter`] patching the status subresource
#[derive(Clone)]
pub struct StatusPatcher {
    client: Client,
}

impl std::fmt::Debug for StatusPatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusPatcher").finish_non_exhaustive()
    }
}

impl StatusPatcher {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StatusWriter for StatusPatcher {
    async fn commit(&self, service: &ExternalService, status: &ExternalServiceStatus) -> Result<()> {
        let name = service.name_any();
        let namespace = service.namespace().unwrap_or_else(|| "default".to_string());
        let api: Api<ExternalService> = Api::namespaced(self.client.clone(), &namespace);

        let patch = json!({ "status": status });

        api.patch_status(&name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(patch))
            .await
            .with_context(|| format!("Failed to update status of {namespace}/{name}"))?;

        debug!(
            resource.name = %name,
            resource.namespace = %namespace,
            phase = ?status.phase,
            "Status updated"
        );
        Ok(())
    }
}
