//! # External Service Controller
//!
//! A Kubernetes controller that reconciles `ExternalService` resources against
//! service releases managed by a remote provider.
//!
//! ## Overview
//!
//! For every `ExternalService` the controller:
//!
//! 1. **Resolves parameters** - Literals, YAML documents, environment variables, ConfigMap and Secret keys
//! 2. **Creates the release** - Once, keyed by `releaseId`, recording the provider id in status
//! 3. **Follows the release** - Polls while Pending and maps provider status onto a lifecycle phase
//! 4. **Pushes parameter drift** - Re-submits parameters when the provider's copy differs
//! 5. **Cleans up** - Deletes the release before the object is removed (finalizer)
//!
//! Metrics and probes are served on `/metrics`, `/healthz` and `/readyz`.

use anyhow::Result;
use external_service_controller::runtime::{initialization, watch_loop};

#[tokio::main]
async fn main() -> Result<()> {
    let init = initialization::initialize().await?;

    watch_loop::run_watch_loop(init.services, init.reconciler, init.server_state).await
}
