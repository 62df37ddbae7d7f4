//! # ExternalService Status
//!
//! Observed status record and the closed set of lifecycle phases.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle phase of the external resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, schemars::JsonSchema)]
pub enum ResourcePhase {
    /// Desired state failed local validation; terminal until the spec is edited
    Invalid,
    /// Create or update issued, waiting for the provider to converge
    Pending,
    /// Provider reported a failure; terminal until the spec is edited
    Failed,
    /// Provider reports the release ready
    Finished,
    /// Deletion requested, waiting for the provider to confirm
    Deleting,
    /// External resource is gone; the object may be removed
    Deleted,
}

impl ResourcePhase {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourcePhase::Invalid => "Invalid",
            ResourcePhase::Pending => "Pending",
            ResourcePhase::Failed => "Failed",
            ResourcePhase::Finished => "Finished",
            ResourcePhase::Deleting => "Deleting",
            ResourcePhase::Deleted => "Deleted",
        }
    }

    /// Phases that stop provider calls until the desired state changes
    #[must_use]
    pub fn is_terminal_until_edited(&self) -> bool {
        matches!(self, ResourcePhase::Invalid | ResourcePhase::Failed)
    }
}

impl fmt::Display for ResourcePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of the ExternalService resource
///
/// Owned by the reconciler. Every reconciliation reads it as an immutable
/// snapshot and commits at most one replacement.
#[derive(Debug, Clone, Deserialize, Serialize, Default, schemars::JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExternalServiceStatus {
    /// Current lifecycle phase
    #[serde(default)]
    pub phase: Option<ResourcePhase>,
    /// Human-readable reason for the current phase
    #[serde(default)]
    pub reason: Option<String>,
    /// Provider-assigned identifier of the release; set once creation succeeded
    #[serde(default)]
    pub external_id: Option<String>,
    /// Last raw status string reported by the provider
    #[serde(default)]
    pub external_status: Option<String>,
    /// Last provider operation reported
    #[serde(default)]
    pub last_action: Option<String>,
    /// Provider-side id of the workload backing the release
    #[serde(default)]
    pub resource_id: Option<String>,
    /// Provider lookup key of the service, fetched once at creation
    #[serde(default)]
    pub primary_key: Option<String>,
    /// Generation of the spec last evaluated against the provider
    #[serde(default)]
    pub observed_generation: Option<i64>,
    /// Time of the last phase change (RFC3339)
    #[serde(default)]
    pub last_transition_time: Option<String>,
}

impl ExternalServiceStatus {
    /// Provider identifier, treating an empty string as absent
    #[must_use]
    pub fn external_id(&self) -> Option<&str> {
        self.external_id.as_deref().filter(|id| !id.is_empty())
    }

    /// Candidate status with a new phase and reason
    ///
    /// `last_transition_time` only moves when the phase actually changes.
    #[must_use]
    pub fn transition(&self, phase: ResourcePhase, reason: Option<String>) -> Self {
        let mut next = self.clone();
        if self.phase != Some(phase) {
            next.last_transition_time = Some(chrono::Utc::now().to_rfc3339());
        }
        next.phase = Some(phase);
        next.reason = reason;
        next
    }

    /// Whether committing `candidate` would change anything a reader relies on
    ///
    /// The raw provider status is carried along but does not by itself justify a write.
    #[must_use]
    pub fn requires_update(&self, candidate: &ExternalServiceStatus) -> bool {
        self.phase != candidate.phase
            || self.reason != candidate.reason
            || self.external_id != candidate.external_id
            || self.resource_id != candidate.resource_id
            || self.primary_key != candidate.primary_key
            || self.observed_generation != candidate.observed_generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_external_id_empty_is_absent() {
        let status = ExternalServiceStatus {
            external_id: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(status.external_id(), None);
    }

    #[test]
    fn test_transition_keeps_timestamp_when_phase_unchanged() {
        let status = ExternalServiceStatus {
            phase: Some(ResourcePhase::Pending),
            last_transition_time: Some("2024-01-01T00:00:00+00:00".to_string()),
            ..Default::default()
        };
        let next = status.transition(ResourcePhase::Pending, Some("Exec 'get' successfully".into()));
        assert_eq!(next.last_transition_time, status.last_transition_time);

        let finished = status.transition(ResourcePhase::Finished, None);
        assert_ne!(finished.last_transition_time, status.last_transition_time);
    }

    #[test]
    fn test_requires_update_ignores_raw_status() {
        let status = ExternalServiceStatus {
            phase: Some(ResourcePhase::Pending),
            external_status: Some("deploying".to_string()),
            ..Default::default()
        };
        let mut candidate = status.clone();
        candidate.external_status = Some("scheduling".to_string());
        assert!(!status.requires_update(&candidate));

        candidate.reason = Some("Exec 'update' successfully".to_string());
        assert!(status.requires_update(&candidate));
    }

    #[test]
    fn test_phase_serializes_as_plain_string() {
        let json = serde_json::to_value(ResourcePhase::Finished).unwrap();
        assert_eq!(json, serde_json::json!("Finished"));
    }
}
