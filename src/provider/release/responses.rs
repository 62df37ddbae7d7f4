//! Service release response bodies

use crate::provider::{ExternalInfo, ProviderError};
use serde::Deserialize;

/// Service record returned by the lookup call
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceResponse {
    pub id: String,
    pub primary_key: String,
}

/// Release record returned by create, update, delete and get
///
/// All three fields are required; a response missing any of them is
/// malformed.
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseResponse {
    pub id: String,
    pub release_status: String,
    pub action: String,
    /// Id of the workload the provider deployed for the release
    #[serde(default)]
    pub external_id: Option<String>,
}

impl ReleaseResponse {
    /// Convert into the normalized form, rejecting an empty id
    pub fn into_info(self, operation: &'static str) -> Result<ExternalInfo, ProviderError> {
        if self.id.is_empty() {
            return Err(ProviderError::MalformedResponse {
                operation,
                reason: "release id is empty".to_string(),
            });
        }
        Ok(ExternalInfo {
            id: self.id,
            raw_status: self.release_status,
            action: self.action,
            resource_id: self.external_id.filter(|id| !id.is_empty()),
        })
    }
}

/// Error envelope used by the provider on non-2xx responses
#[derive(Debug, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub code: Option<i64>,
    pub message: String,
}
