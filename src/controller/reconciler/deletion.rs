//! # Deletion Guard
//!
//! Keeps an `ExternalService` in the store until its external release has been
//! deleted, using the `externalservice.octopilot.io/cleanup` finalizer.

use crate::constants::{CLEANUP_FINALIZER, FIELD_MANAGER};
use crate::crd::ExternalService;
use anyhow::{Context, Result};
use async_trait::async_trait;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, ResourceExt};
use serde_json::json;
use tracing::{debug, info};

/// Marker that blocks removal of an object until cleanup is done
#[async_trait]
pub trait DeletionGuard: Send + Sync {
    /// Whether the object currently carries the guard
    fn has_guard(&self, service: &ExternalService) -> bool;

    /// Attach the guard
    async fn add_guard(&self, service: &ExternalService) -> Result<()>;

    /// Release the guard so the store can remove the object
    async fn release_guard(&self, service: &ExternalService) -> Result<()>;
}

/// [`DeletionGuard`] implemented with a Kubernetes finalizer
#[derive(Clone)]
pub struct FinalizerGuard {
    client: Client,
}

impl std::fmt::Debug for FinalizerGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinalizerGuard")
            .field("finalizer", &CLEANUP_FINALIZER)
            .finish_non_exhaustive()
    }
}

impl FinalizerGuard {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn patch_finalizers(&self, service: &ExternalService, finalizers: Vec<String>) -> Result<()> {
        let name = service.name_any();
        let namespace = service.namespace().unwrap_or_else(|| "default".to_string());
        let api: Api<ExternalService> = Api::namespaced(self.client.clone(), &namespace);

        let patch = json!({
            "metadata": {
                "finalizers": finalizers
            }
        });

        api.patch(&name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(patch))
            .await
            .with_context(|| format!("Failed to patch finalizers of {namespace}/{name}"))?;
        Ok(())
    }
}

#[async_trait]
impl DeletionGuard for FinalizerGuard {
    fn has_guard(&self, service: &ExternalService) -> bool {
        service.finalizers().iter().any(|f| f == CLEANUP_FINALIZER)
    }

    async fn add_guard(&self, service: &ExternalService) -> Result<()> {
        if self.has_guard(service) {
            return Ok(());
        }
        let mut finalizers = service.finalizers().to_vec();
        finalizers.push(CLEANUP_FINALIZER.to_string());
        self.patch_finalizers(service, finalizers).await?;

        info!(
            resource.name = %service.name_any(),
            finalizer = CLEANUP_FINALIZER,
            "Added cleanup finalizer"
        );
        Ok(())
    }

    async fn release_guard(&self, service: &ExternalService) -> Result<()> {
        if !self.has_guard(service) {
            debug!(resource.name = %service.name_any(), "Cleanup finalizer already released");
            return Ok(());
        }
        let finalizers: Vec<String> = service
            .finalizers()
            .iter()
            .filter(|f| *f != CLEANUP_FINALIZER)
            .cloned()
            .collect();
        self.patch_finalizers(service, finalizers).await?;

        info!(
            resource.name = %service.name_any(),
            finalizer = CLEANUP_FINALIZER,
            "Released cleanup finalizer"
        );
        Ok(())
    }
}
