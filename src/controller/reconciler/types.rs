//! # Types
//!
//! Core types for the reconciler.

use crate::config::ControllerConfig;
use crate::controller::backoff::FibonacciBackoff;
use crate::provider::{AdapterRegistry, ProviderError};
use kube::Client;
use kube_runtime::controller::Action;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("Provider operation failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("Failed to write status: {0}")]
    StatusWrite(#[source] anyhow::Error),

    #[error("Failed to update cleanup finalizer: {0}")]
    Guard(#[source] anyhow::Error),

    #[error("Failed to read parameter source: {0}")]
    ParamLookup(#[source] anyhow::Error),

    #[error("No adapter registered for resource type '{0}'")]
    UnknownResourceType(String),
}

impl ReconcilerError {
    /// Whether a store write failed because the object no longer exists
    ///
    /// Happens when the object is removed out of band, e.g. after its finalizer
    /// was stripped by hand, while a reconciliation was still in flight.
    #[must_use]
    pub fn is_object_gone(&self) -> bool {
        let source = match self {
            ReconcilerError::StatusWrite(e) | ReconcilerError::Guard(e) => e,
            _ => return false,
        };
        matches!(
            source.downcast_ref::<kube::Error>(),
            Some(kube::Error::Api(api_err)) if api_err.code == 404
        )
    }
}

/// What the trigger subsystem should do after a reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// Wait for the next change to the object
    Done,
    /// Reconcile again after the given delay
    RequeueAfter(Duration),
    /// Reconcile again right away
    RequeueNow,
}

impl Directive {
    #[must_use]
    pub fn into_action(self) -> Action {
        match self {
            Directive::Done => Action::await_change(),
            Directive::RequeueAfter(delay) => Action::requeue(delay),
            Directive::RequeueNow => Action::requeue(Duration::ZERO),
        }
    }
}

/// Backoff state for a specific resource
/// Tracks error count and backoff calculator for progressive retries
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
}

impl BackoffState {
    #[must_use]
    pub fn new(min_seconds: u64, max_seconds: u64) -> Self {
        Self {
            backoff: FibonacciBackoff::new(min_seconds, max_seconds),
            error_count: 0,
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count = self.error_count.saturating_add(1);
    }

    pub fn reset(&mut self) {
        self.error_count = 0;
        self.backoff.reset();
    }
}

/// Shared reconciler context handed to every reconciliation
#[derive(Clone)]
pub struct Reconciler {
    pub client: Client,
    pub adapters: Arc<AdapterRegistry>,
    pub config: ControllerConfig,
    // Backoff state per resource (identified by namespace/name)
    // Written by the error policy, reset after a successful reconciliation
    pub backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("adapters", &self.adapters)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    #[must_use]
    pub fn new(client: Client, adapters: AdapterRegistry, config: ControllerConfig) -> Self {
        Self {
            client,
            adapters: Arc::new(adapters),
            config,
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Fresh backoff state using the configured bounds
    #[must_use]
    pub fn new_backoff_state(&self) -> BackoffState {
        BackoffState::new(
            self.config.error_backoff_min_secs,
            self.config.error_backoff_max_secs,
        )
    }

    /// Drop the backoff state of a resource that no longer exists
    pub fn forget(&self, resource_key: &str) {
        if let Ok(mut states) = self.backoff_states.lock() {
            states.remove(resource_key);
        }
    }

    /// Clear the error backoff of one resource after a successful reconciliation
    ///
    /// Returns whether the resource had been failing.
    pub fn reset_backoff(&self, resource_key: &str) -> bool {
        match self.backoff_states.lock() {
            Ok(mut states) => states
                .remove(resource_key)
                .is_some_and(|state| state.error_count > 0),
            Err(_) => false,
        }
    }
}
