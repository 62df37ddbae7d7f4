//! # Provider Errors

use thiserror::Error;

/// Failure of a single provider operation
///
/// All variants are transient from the reconciler's point of view: the object
/// keeps its last known phase and the error policy schedules a retry.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request for '{operation}' could not be sent: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("provider rejected '{operation}' with HTTP {status}: {message}")]
    Api {
        operation: &'static str,
        status: u16,
        message: String,
    },

    #[error("malformed provider response for '{operation}': {reason}")]
    MalformedResponse {
        operation: &'static str,
        reason: String,
    },
}

impl ProviderError {
    /// Operation the error belongs to
    #[must_use]
    pub fn operation(&self) -> &'static str {
        match self {
            ProviderError::Transport { operation, .. }
            | ProviderError::Api { operation, .. }
            | ProviderError::MalformedResponse { operation, .. } => operation,
        }
    }
}
