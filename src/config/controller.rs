//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use crate::constants::{
    DEFAULT_DRIFT_CHECK_INTERVAL_SECS, DEFAULT_ERROR_BACKOFF_MAX_SECS,
    DEFAULT_ERROR_BACKOFF_MIN_SECS, DEFAULT_MAX_CONCURRENT_RECONCILIATIONS, DEFAULT_METRICS_PORT,
    DEFAULT_PROVIDER_ENDPOINT, DEFAULT_PROVIDER_TIMEOUT_SECS, DEFAULT_WATCH_RESTART_DELAY_SECS,
    MIN_PENDING_POLL_INTERVAL_SECS,
};
use std::time::Duration;

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
/// Environment variables are populated from a ConfigMap using `envFrom` in the deployment.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// HTTP port for `/metrics`, `/healthz` and `/readyz`
    pub metrics_port: u16,
    /// Base URL of the provider API
    pub provider_endpoint: String,
    /// Bearer token sent to the provider, if any
    pub provider_token: Option<String>,
    /// Per-request timeout for provider calls (seconds)
    pub provider_timeout_secs: u64,
    /// Re-poll interval while a release is Pending (seconds, never below 5)
    pub pending_poll_interval_secs: u64,
    /// Interval between drift checks once a release is Finished (seconds)
    pub drift_check_interval_secs: u64,
    /// First retry delay after a failed reconciliation (seconds)
    pub error_backoff_min_secs: u64,
    /// Ceiling for the retry delay after repeated failures (seconds)
    pub error_backoff_max_secs: u64,
    /// Watch stream restart delay after unknown errors (seconds)
    pub watch_restart_delay_secs: u64,
    /// Restrict the watch to one namespace; all namespaces when unset
    pub watch_namespace: Option<String>,
    /// Maximum concurrent reconciliations across distinct objects
    pub max_concurrent_reconciliations: u16,
    /// Log format (json, text)
    pub log_format: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            metrics_port: DEFAULT_METRICS_PORT,
            provider_endpoint: DEFAULT_PROVIDER_ENDPOINT.to_string(),
            provider_token: None,
            provider_timeout_secs: DEFAULT_PROVIDER_TIMEOUT_SECS,
            pending_poll_interval_secs: MIN_PENDING_POLL_INTERVAL_SECS,
            drift_check_interval_secs: DEFAULT_DRIFT_CHECK_INTERVAL_SECS,
            error_backoff_min_secs: DEFAULT_ERROR_BACKOFF_MIN_SECS,
            error_backoff_max_secs: DEFAULT_ERROR_BACKOFF_MAX_SECS,
            watch_restart_delay_secs: DEFAULT_WATCH_RESTART_DELAY_SECS,
            watch_namespace: None,
            max_concurrent_reconciliations: DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            log_format: "json".to_string(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    ///
    /// Unparseable values fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            metrics_port: parse_or(&lookup, "METRICS_PORT", defaults.metrics_port),
            provider_endpoint: lookup("PROVIDER_ENDPOINT")
                .filter(|v| !v.trim().is_empty())
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(defaults.provider_endpoint),
            provider_token: lookup("PROVIDER_TOKEN").filter(|v| !v.is_empty()),
            provider_timeout_secs: parse_or(
                &lookup,
                "PROVIDER_TIMEOUT_SECS",
                defaults.provider_timeout_secs,
            ),
            pending_poll_interval_secs: parse_or(
                &lookup,
                "PENDING_POLL_INTERVAL_SECS",
                defaults.pending_poll_interval_secs,
            )
            .max(MIN_PENDING_POLL_INTERVAL_SECS),
            drift_check_interval_secs: parse_or(
                &lookup,
                "DRIFT_CHECK_INTERVAL_SECS",
                defaults.drift_check_interval_secs,
            )
            .max(MIN_PENDING_POLL_INTERVAL_SECS),
            error_backoff_min_secs: parse_or(
                &lookup,
                "ERROR_BACKOFF_MIN_SECS",
                defaults.error_backoff_min_secs,
            ),
            error_backoff_max_secs: parse_or(
                &lookup,
                "ERROR_BACKOFF_MAX_SECS",
                defaults.error_backoff_max_secs,
            ),
            watch_restart_delay_secs: parse_or(
                &lookup,
                "WATCH_RESTART_DELAY_SECS",
                defaults.watch_restart_delay_secs,
            ),
            watch_namespace: lookup("WATCH_NAMESPACE").filter(|v| !v.trim().is_empty()),
            max_concurrent_reconciliations: parse_or(
                &lookup,
                "MAX_CONCURRENT_RECONCILIATIONS",
                defaults.max_concurrent_reconciliations,
            ),
            log_format: lookup("LOG_FORMAT")
                .map(|v| v.to_lowercase())
                .unwrap_or(defaults.log_format),
        }
    }

    /// Get the Pending re-poll duration
    #[must_use]
    pub fn pending_poll_interval(&self) -> Duration {
        Duration::from_secs(self.pending_poll_interval_secs.max(MIN_PENDING_POLL_INTERVAL_SECS))
    }

    /// Get the drift check duration
    ///
    /// Bounded below like the Pending re-poll so Finished releases never
    /// query the provider back to back.
    #[must_use]
    pub fn drift_check_interval(&self) -> Duration {
        Duration::from_secs(self.drift_check_interval_secs.max(MIN_PENDING_POLL_INTERVAL_SECS))
    }

    /// Get provider request timeout duration
    #[must_use]
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    /// Get watch restart delay duration
    #[must_use]
    pub fn watch_restart_delay(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_secs)
    }
}

/// Read a value and parse it, or return the default
fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
