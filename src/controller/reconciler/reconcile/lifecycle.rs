//! # Release Lifecycle
//!
//! The state machine driving one `ExternalService` against its provider.
//!
//! Each call works on a snapshot of the object, issues the provider calls the
//! current phase needs, and commits at most one new status record. Evaluation
//! order:
//!
//! 1. Deletion (object has a deletion timestamp)
//! 2. Attach the cleanup finalizer
//! 3. Validate the resource type and resolve parameters
//! 4. Create the release if it does not exist yet
//! 5. Stop on terminal phases whose spec has not been edited
//! 6. Poll Pending releases / check settled releases for parameter drift

use crate::controller::reconciler::deletion::DeletionGuard;
use crate::controller::reconciler::drift::drifted_params;
use crate::controller::reconciler::params::{resolve_params, ResolveError, ValueStore};
use crate::controller::reconciler::status::StatusWriter;
use crate::controller::reconciler::translate::{action_reason, translate};
use crate::controller::reconciler::types::{Directive, ReconcilerError};
use crate::crd::{ExternalService, ExternalServiceStatus, ResourcePhase};
use crate::observability::metrics;
use crate::provider::{AdapterRegistry, ExternalResourceAdapter, Params};
use kube::ResourceExt;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Collaborators of one reconciliation
pub struct LifecycleContext<'a> {
    pub adapters: &'a AdapterRegistry,
    pub values: &'a dyn ValueStore,
    pub status: &'a dyn StatusWriter,
    pub guard: &'a dyn DeletionGuard,
    /// Re-poll delay while Pending
    pub pending_poll: Duration,
    /// Delay between drift checks once Finished
    pub drift_check_interval: Duration,
}

impl std::fmt::Debug for LifecycleContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleContext")
            .field("adapters", &self.adapters)
            .field("pending_poll", &self.pending_poll)
            .field("drift_check_interval", &self.drift_check_interval)
            .finish_non_exhaustive()
    }
}

impl LifecycleContext<'_> {
    fn directive_for(&self, phase: ResourcePhase) -> Directive {
        match phase {
            ResourcePhase::Pending | ResourcePhase::Deleting => {
                Directive::RequeueAfter(self.pending_poll)
            }
            ResourcePhase::Finished => Directive::RequeueAfter(self.drift_check_interval),
            ResourcePhase::Invalid | ResourcePhase::Failed | ResourcePhase::Deleted => {
                Directive::Done
            }
        }
    }
}

/// Reconcile one `ExternalService` snapshot
///
/// # Errors
/// Returns an error for provider failures, status or finalizer write failures,
/// transient parameter lookups, and deletions whose adapter is unknown.
pub async fn reconcile_service(
    service: &ExternalService,
    cx: &LifecycleContext<'_>,
) -> Result<Directive, ReconcilerError> {
    let current = service.status.clone().unwrap_or_default();

    if service.metadata.deletion_timestamp.is_some() {
        return finalize(service, &current, cx).await;
    }

    if !cx.guard.has_guard(service) {
        cx.guard
            .add_guard(service)
            .await
            .map_err(ReconcilerError::Guard)?;
        return Ok(Directive::RequeueNow);
    }

    let generation = service.metadata.generation;
    let resource_type = service.spec.resource_type.as_str();

    let Some(adapter) = cx.adapters.get(resource_type) else {
        warn!(
            resource.name = %service.name_any(),
            resource.r#type = resource_type,
            "No adapter registered for resource type"
        );
        return mark_invalid(
            service,
            &current,
            format!("Unknown resource type '{resource_type}'"),
            cx,
        )
        .await;
    };

    let namespace = service.namespace().unwrap_or_else(|| "default".to_string());
    let params = match resolve_params(&service.spec.params, &namespace, cx.values).await {
        Ok(params) => params,
        Err(e @ ResolveError::Invalid { .. }) => {
            warn!(resource.name = %service.name_any(), error = %e, "Parameter validation failed");
            return mark_invalid(service, &current, e.to_string(), cx).await;
        }
        Err(e @ ResolveError::Lookup { .. }) => {
            return Err(ReconcilerError::ParamLookup(anyhow::Error::new(e)));
        }
    };

    let Some(external_id) = current.external_id().map(str::to_string) else {
        return create(service, &current, adapter, &params, cx).await;
    };

    match current.phase {
        Some(ResourcePhase::Deleted) => Ok(Directive::Done),
        Some(phase) if phase.is_terminal_until_edited() && generation == current.observed_generation => {
            debug!(
                resource.name = %service.name_any(),
                phase = %phase,
                "Skipping provider calls until the spec changes"
            );
            Ok(Directive::Done)
        }
        None | Some(ResourcePhase::Pending | ResourcePhase::Deleting) => {
            poll_status(service, &current, adapter, &external_id, cx).await
        }
        Some(ResourcePhase::Finished | ResourcePhase::Failed | ResourcePhase::Invalid) => {
            check_drift(service, &current, adapter, &external_id, &params, cx).await
        }
    }
}

async fn mark_invalid(
    service: &ExternalService,
    current: &ExternalServiceStatus,
    reason: String,
    cx: &LifecycleContext<'_>,
) -> Result<Directive, ReconcilerError> {
    let mut candidate = current.transition(ResourcePhase::Invalid, Some(reason));
    candidate.observed_generation = service.metadata.generation;
    commit_if_changed(service, current, &candidate, cx).await?;
    Ok(Directive::Done)
}

async fn create(
    service: &ExternalService,
    current: &ExternalServiceStatus,
    adapter: &dyn ExternalResourceAdapter,
    params: &Params,
    cx: &LifecycleContext<'_>,
) -> Result<Directive, ReconcilerError> {
    let spec = &service.spec;
    let created = adapter
        .create(&spec.service_id, &spec.release_id, params)
        .await?;

    info!(
        resource.name = %service.name_any(),
        release.id = %created.info.id,
        release.status = %created.info.raw_status,
        "Release created"
    );

    let mut candidate = current.transition(
        ResourcePhase::Pending,
        Some(action_reason(&created.info.action)),
    );
    candidate.external_id = Some(created.info.id);
    candidate.resource_id = created.info.resource_id;
    candidate.primary_key = Some(created.primary_key);
    candidate.external_status = Some(created.info.raw_status);
    candidate.last_action = Some(created.info.action);
    candidate.observed_generation = service.metadata.generation;
    commit_if_changed(service, current, &candidate, cx).await?;

    Ok(Directive::RequeueAfter(cx.pending_poll))
}

async fn poll_status(
    service: &ExternalService,
    current: &ExternalServiceStatus,
    adapter: &dyn ExternalResourceAdapter,
    external_id: &str,
    cx: &LifecycleContext<'_>,
) -> Result<Directive, ReconcilerError> {
    let info = adapter
        .get_status(&service.spec.service_id, external_id)
        .await?;
    let (phase, reason) = translate(&info.raw_status, &info.action);

    debug!(
        resource.name = %service.name_any(),
        release.status = %info.raw_status,
        phase = %phase,
        "Polled release status"
    );

    let mut candidate = current.transition(phase, Some(reason));
    candidate.external_status = Some(info.raw_status);
    candidate.last_action = Some(info.action);
    if info.resource_id.is_some() {
        candidate.resource_id = info.resource_id;
    }
    commit_if_changed(service, current, &candidate, cx).await?;

    // Spec edits made while the release was converging are checked right away
    if phase != ResourcePhase::Pending && service.metadata.generation != candidate.observed_generation {
        return Ok(Directive::RequeueNow);
    }
    Ok(cx.directive_for(phase))
}

async fn check_drift(
    service: &ExternalService,
    current: &ExternalServiceStatus,
    adapter: &dyn ExternalResourceAdapter,
    external_id: &str,
    params: &Params,
    cx: &LifecycleContext<'_>,
) -> Result<Directive, ReconcilerError> {
    let service_id = service.spec.service_id.as_str();
    let detail = adapter.get_detail(service_id, external_id).await?;
    let drifted = drifted_params(params, &detail);

    if drifted.is_empty() {
        let mut candidate = current.clone();
        candidate.observed_generation = service.metadata.generation;

        // Leaving Invalid: the cached phase says nothing about the release
        if current.phase == Some(ResourcePhase::Invalid) {
            let info = adapter.get_status(service_id, external_id).await?;
            let (phase, reason) = translate(&info.raw_status, &info.action);
            candidate = candidate.transition(phase, Some(reason));
            candidate.external_status = Some(info.raw_status);
            candidate.last_action = Some(info.action);
            if info.resource_id.is_some() {
                candidate.resource_id = info.resource_id;
            }
        }

        commit_if_changed(service, current, &candidate, cx).await?;
        let phase = candidate.phase.unwrap_or(ResourcePhase::Pending);
        return Ok(cx.directive_for(phase));
    }

    info!(
        resource.name = %service.name_any(),
        release.id = external_id,
        params = ?drifted,
        "Parameter drift detected, updating release"
    );
    metrics::increment_drift_detected();

    let info = adapter.update(service_id, external_id, params).await?;

    let mut candidate = current.transition(ResourcePhase::Pending, Some(action_reason(&info.action)));
    candidate.external_status = Some(info.raw_status);
    candidate.last_action = Some(info.action);
    candidate.observed_generation = service.metadata.generation;
    commit_if_changed(service, current, &candidate, cx).await?;

    Ok(Directive::RequeueAfter(cx.pending_poll))
}

async fn finalize(
    service: &ExternalService,
    current: &ExternalServiceStatus,
    cx: &LifecycleContext<'_>,
) -> Result<Directive, ReconcilerError> {
    if !cx.guard.has_guard(service) {
        return Ok(Directive::Done);
    }

    let external_id = match current.external_id() {
        Some(id) if current.phase != Some(ResourcePhase::Deleted) => id,
        _ => {
            cx.guard
                .release_guard(service)
                .await
                .map_err(ReconcilerError::Guard)?;
            return Ok(Directive::Done);
        }
    };

    let resource_type = service.spec.resource_type.as_str();
    let adapter = cx
        .adapters
        .get(resource_type)
        .ok_or_else(|| ReconcilerError::UnknownResourceType(resource_type.to_string()))?;

    match adapter.delete(&service.spec.service_id, external_id).await {
        Ok(info) => {
            info!(
                resource.name = %service.name_any(),
                release.id = external_id,
                "Release deleted"
            );
            let mut candidate =
                current.transition(ResourcePhase::Deleted, Some(action_reason(&info.action)));
            candidate.external_status = Some(info.raw_status);
            candidate.last_action = Some(info.action);
            // The release is gone either way; a second delete must not follow a lost write
            if let Err(write_error) = commit_if_changed(service, current, &candidate, cx).await {
                warn!(
                    resource.name = %service.name_any(),
                    error = %write_error,
                    "Failed to record Deleted phase"
                );
            }

            cx.guard
                .release_guard(service)
                .await
                .map_err(ReconcilerError::Guard)?;
            Ok(Directive::Done)
        }
        Err(e) => {
            let candidate = current.transition(ResourcePhase::Deleting, current.reason.clone());
            if let Err(write_error) = commit_if_changed(service, current, &candidate, cx).await {
                warn!(
                    resource.name = %service.name_any(),
                    error = %write_error,
                    "Failed to record Deleting phase"
                );
            }
            Err(e.into())
        }
    }
}

/// Commit `candidate` unless it matches what is already stored
async fn commit_if_changed(
    service: &ExternalService,
    current: &ExternalServiceStatus,
    candidate: &ExternalServiceStatus,
    cx: &LifecycleContext<'_>,
) -> Result<bool, ReconcilerError> {
    if !current.requires_update(candidate) {
        debug!(resource.name = %service.name_any(), "Status unchanged, skipping write");
        return Ok(false);
    }

    cx.status
        .commit(service, candidate)
        .await
        .map_err(ReconcilerError::StatusWrite)?;

    if current.phase != candidate.phase {
        if let Some(phase) = candidate.phase {
            info!(
                resource.name = %service.name_any(),
                from = current.phase.map_or("None", |p| p.as_str()),
                to = phase.as_str(),
                reason = candidate.reason.as_deref().unwrap_or_default(),
                "Phase transition"
            );
            metrics::increment_phase_transitions(phase.as_str());
        }
    }
    Ok(true)
}
