//! # Prelude
//!
//! Re-exports commonly used types and traits for convenience.
//!
//! ## Usage
//!
//! ```rust
//! use external_service_controller::prelude::*;
//! ```
//!
//! This brings into scope:
//! - All CRD types (ExternalService, ParamSource, ResourcePhase, etc.)
//! - The provider adapter trait, registry and normalized records
//! - Reconciler types and the store-facing seams
//! - Controller configuration

// CRD types - most commonly used
pub use crate::crd::*;

// Provider adapter seam
pub use crate::provider::{
    AdapterRegistry, CreatedResource, ExternalDetail, ExternalInfo, ExternalResourceAdapter,
    Params, ProviderError,
};

// Reconciler types - core controller functionality
pub use crate::controller::reconciler::{
    reconcile, reconcile_service, BackoffState, DeletionGuard, Directive, LifecycleContext,
    Reconciler, ReconcilerError, StatusWriter, ValueStore,
};

// Config types
pub use crate::config::ControllerConfig;
