//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! environment variables where applicable.

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default HTTP server startup timeout (how long to wait for server to be ready)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Default HTTP server readiness poll interval
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Minimum re-poll interval while a release is Pending (seconds)
/// The poll interval can be raised via configuration but never lowered below this
pub const MIN_PENDING_POLL_INTERVAL_SECS: u64 = 5;

/// Default interval between drift checks of Finished releases (seconds)
pub const DEFAULT_DRIFT_CHECK_INTERVAL_SECS: u64 = 300;

/// Default provider endpoint
pub const DEFAULT_PROVIDER_ENDPOINT: &str = "http://localhost:8080";

/// Default provider request timeout (seconds)
pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 30;

/// Default error backoff floor (seconds)
pub const DEFAULT_ERROR_BACKOFF_MIN_SECS: u64 = 5;

/// Default error backoff ceiling (seconds)
pub const DEFAULT_ERROR_BACKOFF_MAX_SECS: u64 = 300;

/// Default delay before restarting watch stream after unknown errors (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 5;

/// Default maximum number of objects reconciled at the same time
pub const DEFAULT_MAX_CONCURRENT_RECONCILIATIONS: u16 = 10;

/// Adapter tag used when `spec.resourceType` is omitted
pub const DEFAULT_RESOURCE_TYPE: &str = "ServiceRelease";

/// Finalizer that keeps the object around until the external release is deleted
pub const CLEANUP_FINALIZER: &str = "externalservice.octopilot.io/cleanup";

/// Field manager used for status and metadata patches
pub const FIELD_MANAGER: &str = "external-service-controller";

/// Initial delay before restarting a throttled watch stream (milliseconds)
pub const DEFAULT_WATCH_BACKOFF_START_MS: u64 = 1000;

/// Ceiling for the throttled watch restart delay (milliseconds)
pub const DEFAULT_WATCH_BACKOFF_MAX_MS: u64 = 30_000;
