//! # Reconciler
//!
//! Drives `ExternalService` objects through the release lifecycle.
//!
//! - `reconcile`: kube-runtime entry point and the lifecycle state machine
//! - `params`: parameter resolution from literals, YAML and references
//! - `translate`: provider status to lifecycle phase
//! - `drift`: comparison of desired and provider-echoed parameters
//! - `deletion`: cleanup finalizer
//! - `status`: status subresource writes
//! - `types`: shared context, errors and directives

pub mod deletion;
pub mod drift;
pub mod params;
pub mod reconcile;
pub mod status;
pub mod translate;
pub mod types;

pub use deletion::{DeletionGuard, FinalizerGuard};
pub use params::{resolve_params, KubeValueStore, ResolveError, ValueStore};
pub use reconcile::{reconcile, reconcile_service, LifecycleContext};
pub use status::{StatusPatcher, StatusWriter};
pub use translate::translate;
pub use types::{BackoffState, Directive, Reconciler, ReconcilerError};
