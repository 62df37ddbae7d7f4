//! # CRD Generator
//!
//! Generates the Kubernetes CustomResourceDefinition YAML for `ExternalService`
//! from the Rust type definitions.
//!
//! ## Usage
//!
//! ```bash
//! # Generate CRD YAML
//! cargo run --bin crdgen > config/crd/externalservice.yaml
//!
//! # Generate and apply directly
//! cargo run --bin crdgen | kubectl apply -f -
//! ```

use anyhow::{Context, Result};
use external_service_controller::crd::ExternalService;
use kube::core::CustomResourceExt;

fn main() -> Result<()> {
    let crd = ExternalService::crd();
    let yaml = serde_yaml::to_string(&crd).context("Failed to serialize CRD to YAML")?;
    print!("{yaml}");
    Ok(())
}
