//! # Observability
//!
//! Prometheus metrics for the controller. Tracing is configured at start-up
//! in [`crate::runtime::initialization`].

pub mod metrics;

// Re-export for convenience
pub use metrics::*;
