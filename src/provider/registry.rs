//! # Adapter Registry
//!
//! Explicit mapping from `spec.resourceType` tags to adapter instances.

use crate::provider::ExternalResourceAdapter;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Resource-type tag → adapter
///
/// Built once at process start and shared read-only by every reconciliation.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn ExternalResourceAdapter>>,
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("resource_types", &self.resource_types())
            .finish()
    }
}

impl AdapterRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter for a tag, replacing any previous one
    #[must_use]
    pub fn with_adapter(
        mut self,
        resource_type: impl Into<String>,
        adapter: Arc<dyn ExternalResourceAdapter>,
    ) -> Self {
        self.adapters.insert(resource_type.into(), adapter);
        self
    }

    /// Adapter registered for `resource_type`
    #[must_use]
    pub fn get(&self, resource_type: &str) -> Option<&dyn ExternalResourceAdapter> {
        self.adapters.get(resource_type).map(AsRef::as_ref)
    }

    /// Registered tags, sorted
    #[must_use]
    pub fn resource_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.adapters.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}
