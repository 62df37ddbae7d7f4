//! External Service Controller Library
//!
//! This library provides the core functionality for the External Service Controller:
//! the `ExternalService` CRD, the provider adapters, and the reconciliation
//! state machine that keeps provider-managed service releases in line with
//! the declared desired state.
//!
//! ## Quick Start
//!
//! ```rust
//! use external_service_controller::prelude::*;
//! ```
//!
//! This brings commonly used types and traits into scope. For more specific imports,
//! use the individual modules.

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod prelude;
pub mod provider;
pub mod runtime;
