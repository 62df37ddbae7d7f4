//! Service Release REST Client
//!
//! REST implementation of [`ExternalResourceAdapter`](crate::provider::ExternalResourceAdapter)
//! for service releases in a provider's service catalog.
//!
//! Endpoints (relative to the configured base URL):
//!
//! | Operation | Request |
//! |---|---|
//! | lookup | `GET /v1/services/{serviceId}` |
//! | create | `POST /v1/services/{serviceId}/releases` |
//! | update | `PUT /v1/services/{serviceId}/releases/{id}` |
//! | delete | `DELETE /v1/services/{serviceId}/releases/{id}` |
//! | get | `GET /v1/services/{serviceId}/releases/{id}` |
//!
//! Uses reqwest with rustls (no OpenSSL dependencies).

mod operations;
mod requests;
mod responses;

pub use requests::*;
pub use responses::*;

use crate::observability::metrics;
use crate::provider::ProviderError;
use anyhow::{bail, Context, Result};
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};
use tracing::{debug, info};

pub const OPERATION_LOOKUP: &str = "lookup";
pub const OPERATION_CREATE: &str = "create";
pub const OPERATION_UPDATE: &str = "update";
pub const OPERATION_DELETE: &str = "delete";
pub const OPERATION_GET: &str = "get";

/// Service release REST client
#[derive(Clone)]
pub struct ReleaseClient {
    http_client: Client,
    base_url: Url,
    access_token: Option<String>,
}

impl std::fmt::Debug for ReleaseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReleaseClient")
            .field("base_url", &self.base_url.as_str())
            .field("access_token", &self.access_token.as_ref().map(|_| "***"))
            .finish_non_exhaustive()
    }
}

impl ReleaseClient {
    /// Create a new client for the provider at `base_url`
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid or the HTTP client cannot be built
    pub fn new(base_url: &str, access_token: Option<String>, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .with_context(|| format!("Invalid provider endpoint: {base_url}"))?;
        if base_url.cannot_be_a_base() {
            bail!("Provider endpoint must be a hierarchical URL: {base_url}");
        }

        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        info!("Initializing service release client for {}", base_url);

        Ok(Self {
            http_client,
            base_url,
            access_token,
        })
    }

    /// URL for the given path segments below the base URL
    pub(crate) fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // Checked in new(): the base URL can always carry path segments
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Build HTTP request with authentication headers
    pub(crate) fn make_request(&self, method: Method, url: Url) -> RequestBuilder {
        let request = self
            .http_client
            .request(method, url)
            .header("Accept", "application/json");

        match &self.access_token {
            Some(token) if token.starts_with("Bearer ") => {
                request.header("Authorization", token.as_str())
            }
            Some(token) => request.header("Authorization", format!("Bearer {token}")),
            None => request,
        }
    }

    /// Send a request and decode its JSON body, recording provider metrics
    pub(crate) async fn execute<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<T, ProviderError> {
        let start = Instant::now();
        let result = Self::send(operation, request).await;

        metrics::record_provider_operation(operation, start.elapsed().as_secs_f64());
        if let Err(e) = &result {
            metrics::increment_provider_operation_errors(operation);
            debug!(operation, error = %e, "provider.operation.failed");
        }
        result
    }

    async fn send<T: DeserializeOwned>(
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<T, ProviderError> {
        let response = request
            .send()
            .await
            .map_err(|source| ProviderError::Transport { operation, source })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|source| ProviderError::Transport { operation, source })?;

        if !status.is_success() {
            return Err(handle_error_response(operation, status, &body));
        }

        serde_json::from_slice(&body).map_err(|e| ProviderError::MalformedResponse {
            operation,
            reason: e.to_string(),
        })
    }
}

/// Turn a non-2xx response into a provider error
///
/// Uses the provider's `{"error": {"code", "message"}}` envelope when present.
fn handle_error_response(
    operation: &'static str,
    status: reqwest::StatusCode,
    body: &[u8],
) -> ProviderError {
    let message = match serde_json::from_slice::<ErrorEnvelope>(body) {
        Ok(envelope) => match envelope.error.code {
            Some(code) => format!("{} (code: {code})", envelope.error.message),
            None => envelope.error.message,
        },
        Err(_) => String::from_utf8_lossy(body).trim().to_string(),
    };

    ProviderError::Api {
        operation,
        status: status.as_u16(),
        message,
    }
}
