//! # Status Translation
//!
//! Maps raw provider status strings to lifecycle phases.

use crate::crd::ResourcePhase;

/// Raw status the provider reports once a release is serving
pub const STATUS_READY: &str = "ready";

/// Raw status the provider reports when a deployment failed
pub const STATUS_DEPLOY_FAILED: &str = "deploy_failed";

/// Phase and reason for a raw provider status
///
/// Anything other than `ready` or `deploy_failed` is treated as still in
/// progress, so unrecognised statuses keep the release being polled.
#[must_use]
pub fn translate(raw_status: &str, action: &str) -> (ResourcePhase, String) {
    let phase = match raw_status {
        STATUS_READY => ResourcePhase::Finished,
        STATUS_DEPLOY_FAILED => ResourcePhase::Failed,
        _ => ResourcePhase::Pending,
    };
    (phase, action_reason(action))
}

/// Reason recorded after a provider operation
#[must_use]
pub fn action_reason(action: &str) -> String {
    format!("Exec '{action}' successfully")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_statuses() {
        assert_eq!(
            translate("ready", "create"),
            (
                ResourcePhase::Finished,
                "Exec 'create' successfully".to_string()
            )
        );
        assert_eq!(translate("deploy_failed", "update").0, ResourcePhase::Failed);
    }

    #[test]
    fn test_unknown_status_stays_pending() {
        for raw in ["", "deploying", "READY", "terminated", "rollback"] {
            assert_eq!(translate(raw, "get").0, ResourcePhase::Pending, "{raw}");
        }
    }

    #[test]
    fn test_reason_includes_action() {
        assert_eq!(translate("scheduling", "delete").1, "Exec 'delete' successfully");
    }
}
