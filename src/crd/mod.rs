//! # Custom Resource Definitions
//!
//! CRD types for the External Service Controller.
//!
//! ## Module Structure
//!
//! - `spec.rs` - Main CRD specification and default values
//! - `params.rs` - Parameter value sources (literals, YAML, references)
//! - `status.rs` - Observed status and the lifecycle phase enum

mod params;
mod spec;
mod status;

// Re-export all public types
pub use params::{KeyRef, ParamSource, ParamValueFrom};
pub use spec::{default_resource_type, ExternalService, ExternalServiceSpec};
pub use status::{ExternalServiceStatus, ResourcePhase};
