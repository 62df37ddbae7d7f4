//! # Initialization
//!
//! Controller initialization logic including rustls setup, tracing, metrics,
//! server startup, the provider adapter registry, and Kubernetes client setup.

use crate::config::ControllerConfig;
use crate::constants::{
    DEFAULT_RESOURCE_TYPE, DEFAULT_SERVER_POLL_INTERVAL_MS, DEFAULT_SERVER_STARTUP_TIMEOUT_SECS,
};
use crate::controller::reconciler::Reconciler;
use crate::controller::server::{start_server, ServerState};
use crate::crd::ExternalService;
use crate::observability;
use crate::provider::release::ReleaseClient;
use crate::provider::AdapterRegistry;
use anyhow::{anyhow, Context, Result};
use kube::{api::Api, api::ListParams, Client};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Initialization result containing all necessary components for the controller
pub struct InitializationResult {
    /// Kubernetes client
    pub client: Client,
    /// API for the ExternalService CRD (namespaced when `WATCH_NAMESPACE` is set)
    pub services: Api<ExternalService>,
    /// Reconciler context
    pub reconciler: Arc<Reconciler>,
    /// Server state for health checks
    pub server_state: Arc<ServerState>,
    /// Controller configuration
    pub config: ControllerConfig,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("server_ready", &self.server_state.is_ready())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Initialize the controller runtime
///
/// This function handles:
/// - rustls crypto provider setup
/// - Tracing subscriber setup
/// - Metrics registration
/// - HTTP server startup
/// - Provider adapter registry
/// - Kubernetes client creation
/// - CRD availability check
///
/// # Errors
/// Returns an error if any start-up step fails
pub async fn initialize() -> Result<InitializationResult> {
    // Configure rustls crypto provider FIRST, before any other operations
    // Required for rustls 0.23+ when no default provider is set via features
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        return Err(anyhow!("Failed to install rustls crypto provider"));
    }

    let config = ControllerConfig::from_env();

    init_tracing(&config.log_format);

    info!(
        "Starting External Service Controller v{}",
        env!("CARGO_PKG_VERSION")
    );
    info!(?config, "Loaded controller configuration");

    observability::metrics::register_metrics()?;

    let server_state = Arc::new(ServerState::new());

    // Start HTTP server for metrics and probes
    let server_state_clone = Arc::clone(&server_state);
    let server_port = config.metrics_port;
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_clone).await {
            error!("HTTP server error: {}", e);
        }
    });

    wait_for_server_ready(&server_state, &server_handle).await?;

    let adapters = build_adapter_registry(&config)?;
    info!(
        resource_types = ?adapters.resource_types(),
        provider.endpoint = %config.provider_endpoint,
        "Provider adapters registered"
    );

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let services: Api<ExternalService> = match &config.watch_namespace {
        Some(namespace) => {
            info!("Watching ExternalService resources in namespace '{}'", namespace);
            Api::namespaced(client.clone(), namespace)
        }
        None => {
            info!("Watching ExternalService resources in all namespaces");
            Api::all(client.clone())
        }
    };

    check_crd_available(&services).await;

    let reconciler = Arc::new(Reconciler::new(client.clone(), adapters, config.clone()));

    info!("Controller initialized, starting watch loop...");

    Ok(InitializationResult {
        client,
        services,
        reconciler,
        server_state,
        config,
    })
}

/// Install the global tracing subscriber
///
/// `RUST_LOG` selects levels (default `external_service_controller=info`);
/// `log_format` chooses between JSON and human-readable output.
fn init_tracing(log_format: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("external_service_controller=info"));

    let result = if log_format == "text" {
        tracing_subscriber::fmt().with_env_filter(filter).try_init()
    } else {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .try_init()
    };

    if let Err(e) = result {
        warn!("Tracing subscriber already initialized: {}", e);
    }
}

/// Build the registry mapping resource-type tags to provider adapters
fn build_adapter_registry(config: &ControllerConfig) -> Result<AdapterRegistry> {
    let release_client = ReleaseClient::new(
        &config.provider_endpoint,
        config.provider_token.clone(),
        config.provider_timeout(),
    )
    .context("Failed to create service release client")?;

    Ok(AdapterRegistry::new().with_adapter(DEFAULT_RESOURCE_TYPE, Arc::new(release_client)))
}

/// Wait for the HTTP server to become ready
async fn wait_for_server_ready(
    server_state: &Arc<ServerState>,
    server_handle: &tokio::task::JoinHandle<()>,
) -> Result<()> {
    let startup_timeout = Duration::from_secs(DEFAULT_SERVER_STARTUP_TIMEOUT_SECS);
    let poll_interval = Duration::from_millis(DEFAULT_SERVER_POLL_INTERVAL_MS);
    let start_time = Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow!("HTTP server failed to start"));
        }

        if server_state.is_ready() {
            info!("HTTP server is ready and accepting connections");
            break;
        }

        if start_time.elapsed() > startup_timeout {
            return Err(anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }

        tokio::time::sleep(poll_interval).await;
    }

    Ok(())
}

/// Log whether the CRD can be listed before the watch starts
///
/// Failure is not fatal: the watch loop keeps retrying until the CRD appears.
async fn check_crd_available(services: &Api<ExternalService>) {
    match services.list(&ListParams::default().limit(1)).await {
        Ok(_) => info!("ExternalService CRD is queryable"),
        Err(e) => {
            error!("CRD is not queryable; {:?}. Is the CRD installed?", e);
            error!("Installation: cargo run --bin crdgen | kubectl apply -f -");
            warn!("Continuing despite CRD queryability check failure - controller will retry");
        }
    }
}
