//! # Watch Loop
//!
//! Controller watch loop that monitors `ExternalService` resources and triggers
//! reconciliation when changes are detected.

use crate::constants::{DEFAULT_WATCH_BACKOFF_MAX_MS, DEFAULT_WATCH_BACKOFF_START_MS};
use crate::controller::reconciler::{reconcile, Reconciler, ReconcilerError};
use crate::controller::server::ServerState;
use crate::crd::ExternalService;
use crate::runtime::error_policy::{handle_reconciliation_error, handle_watch_stream_error};
use futures::StreamExt;
use kube::api::Api;
use kube::ResourceExt;
use kube_runtime::{controller, controller::Action, watcher, Controller};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn, Instrument};

/// Run the controller watch loop
///
/// Reconciles `ExternalService` resources on every semantic change and on
/// requeue. Distinct objects run concurrently up to the configured limit;
/// kube-runtime never runs two reconciliations of the same object at once.
/// The loop restarts the watch when the stream ends and exits once a
/// shutdown signal has marked the server not ready.
///
/// # Errors
/// Currently always returns `Ok` once shutdown completes
pub async fn run_watch_loop(
    services: Api<ExternalService>,
    reconciler: Arc<Reconciler>,
    server_state: Arc<ServerState>,
) -> Result<(), anyhow::Error> {
    let backoff_duration_ms = Arc::new(AtomicU64::new(DEFAULT_WATCH_BACKOFF_START_MS));
    let watch_restart_delay = reconciler.config.watch_restart_delay();
    let concurrency = reconciler.config.max_concurrent_reconciliations;

    // Mark server not ready when SIGTERM/SIGINT is received
    let shutdown_server_state = Arc::clone(&server_state);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received shutdown signal (SIGINT/SIGTERM), initiating graceful shutdown...");
        shutdown_server_state.set_ready(false);
        info!("Marked server as not ready, waiting for in-flight reconciliations to complete...");
    });

    loop {
        if !server_state.is_ready() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        let backoff_clone = Arc::clone(&backoff_duration_ms);
        let watch_span = tracing::span!(
            tracing::Level::INFO,
            "controller.watch",
            operation = "watch_loop"
        );

        info!(concurrency, "Starting controller watch loop...");
        let controller_future = Controller::new(
            services.clone(),
            watcher::Config::default().any_semantic(),
        )
        .with_config(controller::Config::default().concurrency(concurrency))
        .shutdown_on_signal()
        .run(
            create_reconcile_fn,
            |obj, error, ctx| handle_reconciliation_error(obj, error, ctx),
            Arc::clone(&reconciler),
        )
        .filter_map(move |x| {
            let backoff = Arc::clone(&backoff_clone);
            async move {
                match &x {
                    Ok(_) => {
                        backoff.store(DEFAULT_WATCH_BACKOFF_START_MS, Ordering::Relaxed);
                        debug!("watch.event.success");
                        Some(x)
                    }
                    Err(e) => {
                        let error_string = format!("{e:?}");
                        handle_watch_stream_error(
                            &error_string,
                            &backoff,
                            DEFAULT_WATCH_BACKOFF_MAX_MS,
                            watch_restart_delay,
                        )
                        .await
                        .map(|()| x)
                    }
                }
            }
        })
        .for_each(|_| futures::future::ready(()));

        controller_future.instrument(watch_span).await;

        if !server_state.is_ready() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        warn!(
            "Controller watch stream ended, restarting in {} seconds...",
            watch_restart_delay.as_secs()
        );
        tokio::time::sleep(watch_restart_delay).await;
    }

    info!("Controller stopped gracefully");
    Ok(())
}

/// Create the reconciliation future for one triggered object
fn create_reconcile_fn(
    obj: Arc<ExternalService>,
    ctx: Arc<Reconciler>,
) -> impl std::future::Future<Output = Result<Action, ReconcilerError>> + Send {
    let name = obj.name_any();
    async move {
        let result = reconcile(obj, ctx).await;
        match &result {
            Ok(action) => {
                debug!(resource.name = name.as_str(), action = ?action, "watch.event.reconciled");
            }
            Err(e) => {
                error!(resource.name = name.as_str(), error = %e, "watch.event.reconciliation_failed");
            }
        }
        result
    }
}
