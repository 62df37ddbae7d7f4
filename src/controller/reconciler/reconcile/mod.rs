//! # Reconciliation
//!
//! Entry point called by the kube-runtime controller for every
//! `ExternalService` event and requeue.

mod lifecycle;

pub use lifecycle::{reconcile_service, LifecycleContext};

use crate::controller::reconciler::deletion::FinalizerGuard;
use crate::controller::reconciler::params::KubeValueStore;
use crate::controller::reconciler::status::StatusPatcher;
use crate::controller::reconciler::types::{Directive, Reconciler, ReconcilerError};
use crate::crd::ExternalService;
use crate::observability;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, Instrument};

/// Reconcile one `ExternalService` against the Kubernetes API and its provider
///
/// # Errors
/// Propagates [`ReconcilerError`] to the error policy, which schedules the retry
pub async fn reconcile(
    service: Arc<ExternalService>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let start = Instant::now();
    let name = service.name_any();
    let namespace = service.namespace().unwrap_or_else(|| "default".to_string());

    let span = tracing::info_span!(
        "controller.reconcile",
        resource.name = name.as_str(),
        resource.namespace = namespace.as_str(),
        resource.kind = "ExternalService",
        resource.r#type = service.spec.resource_type.as_str(),
        resource.generation = service.metadata.generation.unwrap_or(0),
        phase = ?service.status.as_ref().and_then(|s| s.phase),
    );

    observability::metrics::increment_reconciliations();

    let values = KubeValueStore::new(ctx.client.clone());
    let status = StatusPatcher::new(ctx.client.clone());
    let guard = FinalizerGuard::new(ctx.client.clone());
    let cx = LifecycleContext {
        adapters: &ctx.adapters,
        values: &values,
        status: &status,
        guard: &guard,
        pending_poll: ctx.config.pending_poll_interval(),
        drift_check_interval: ctx.config.drift_check_interval(),
    };

    let result = reconcile_service(&service, &cx).instrument(span.clone()).await;
    observability::metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());

    let directive = result?;

    let _guard = span.enter();
    let resource_key = format!("{namespace}/{name}");
    if ctx.reset_backoff(&resource_key) {
        info!("Backoff reset after successful reconciliation");
    }

    match directive {
        Directive::Done => debug!("Reconciliation complete, waiting for changes"),
        Directive::RequeueAfter(delay) => {
            observability::metrics::increment_requeues("scheduled");
            debug!(requeue_after_secs = delay.as_secs(), "Reconciliation complete, requeueing");
        }
        Directive::RequeueNow => {
            observability::metrics::increment_requeues("immediate");
            debug!("Reconciliation complete, requeueing immediately");
        }
    }

    Ok(directive.into_action())
}
