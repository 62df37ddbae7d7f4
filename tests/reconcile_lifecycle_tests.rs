//! # Release Lifecycle Tests
//!
//! Drives the reconciliation state machine against in-memory fakes of the
//! provider, status store, finalizer and value store.

mod common;

use common::{
    deleting, service, with_status, Call, FakeGuard, Harness, DRIFT_CHECK, EXTERNAL_ID,
    PENDING_POLL, PRIMARY_KEY, RELEASE_ID,
};
use external_service_controller::controller::reconciler::{Directive, ReconcilerError};
use external_service_controller::crd::ResourcePhase;
use serde_json::json;
use std::sync::atomic::Ordering;

fn ab_params() -> serde_json::Value {
    json!({
        "a": { "int": 1 },
        "b": { "string": "x" }
    })
}

fn finished_status(observed_generation: i64) -> serde_json::Value {
    json!({
        "phase": "Finished",
        "reason": "Exec 'get' successfully",
        "externalId": EXTERNAL_ID,
        "externalStatus": "ready",
        "lastAction": "get",
        "primaryKey": PRIMARY_KEY,
        "observedGeneration": observed_generation
    })
}

#[tokio::test]
async fn test_guard_attached_before_any_provider_call() {
    let mut harness = Harness::new();
    harness.guard = FakeGuard::new(false);
    let svc = service(ab_params(), 1);

    let directive = harness.run(&svc).await.unwrap();

    assert_eq!(directive, Directive::RequeueNow);
    assert_eq!(harness.guard.adds.load(Ordering::SeqCst), 1);
    assert!(harness.adapter.calls().is_empty());
    assert!(harness.status.commits().is_empty());
}

#[tokio::test]
async fn test_create_happens_exactly_once() {
    let harness = Harness::new();
    let mut svc = service(ab_params(), 1);

    let directive = harness.step(&mut svc).await.unwrap();
    assert_eq!(directive, Directive::RequeueAfter(PENDING_POLL));

    let status = svc.status.clone().expect("status committed after create");
    assert_eq!(status.phase, Some(ResourcePhase::Pending));
    assert_eq!(status.external_id.as_deref(), Some(EXTERNAL_ID));
    assert_eq!(status.primary_key.as_deref(), Some(PRIMARY_KEY));
    assert_eq!(status.reason.as_deref(), Some("Exec 'create' successfully"));
    assert_eq!(status.observed_generation, Some(1));

    assert_eq!(
        harness.adapter.calls(),
        vec![Call::Create {
            release_id: RELEASE_ID.to_string(),
            params: serde_json::from_value(json!({"a": 1, "b": "x"})).unwrap(),
        }]
    );

    // Repeated invocations only poll
    for _ in 0..3 {
        let directive = harness.step(&mut svc).await.unwrap();
        assert_eq!(directive, Directive::RequeueAfter(PENDING_POLL));
    }
    assert_eq!(
        harness.adapter.count(|c| matches!(c, Call::Create { .. })),
        1
    );
    assert_eq!(
        harness.adapter.count(|c| matches!(c, Call::GetStatus { .. })),
        3
    );
}

#[tokio::test]
async fn test_workload_id_recorded_from_provider() {
    let harness = Harness::new();
    let mut svc = service(ab_params(), 1);

    harness.step(&mut svc).await.unwrap();
    assert_eq!(svc.status.as_ref().unwrap().resource_id, None);

    // Reported once the provider has scheduled the workload
    harness.adapter.set_resource_id("vm-7");
    harness.adapter.set_raw_status("ready");
    harness.step(&mut svc).await.unwrap();

    let status = svc.status.unwrap();
    assert_eq!(status.external_id.as_deref(), Some(EXTERNAL_ID));
    assert_eq!(status.resource_id.as_deref(), Some("vm-7"));
    assert_eq!(status.phase, Some(ResourcePhase::Finished));
}

#[tokio::test]
async fn test_pending_writes_only_on_change() {
    let harness = Harness::new();
    let mut svc = service(ab_params(), 1);

    harness.step(&mut svc).await.unwrap();
    assert_eq!(harness.status.commits().len(), 1);

    // Reason moves from create to get: one write
    harness.step(&mut svc).await.unwrap();
    assert_eq!(harness.status.commits().len(), 2);

    // Same phase, same reason, different raw status: no write
    harness.adapter.set_raw_status("scheduling");
    harness.step(&mut svc).await.unwrap();
    assert_eq!(harness.status.commits().len(), 2);
}

#[tokio::test]
async fn test_ready_release_moves_to_finished() {
    let harness = Harness::new();
    let mut svc = service(ab_params(), 1);
    harness.step(&mut svc).await.unwrap();

    harness.adapter.set_raw_status("ready");
    let directive = harness.step(&mut svc).await.unwrap();

    assert_eq!(directive, Directive::RequeueAfter(DRIFT_CHECK));
    let status = svc.status.unwrap();
    assert_eq!(status.phase, Some(ResourcePhase::Finished));
    assert_eq!(status.reason.as_deref(), Some("Exec 'get' successfully"));
    assert!(status.last_transition_time.is_some());
}

#[tokio::test]
async fn test_unknown_status_keeps_polling() {
    let harness = Harness::new();
    let mut svc = service(ab_params(), 1);
    harness.step(&mut svc).await.unwrap();

    for raw in ["rollback_in_progress", "", "READY"] {
        harness.adapter.set_raw_status(raw);
        let directive = harness.step(&mut svc).await.unwrap();
        assert_eq!(svc.status.as_ref().unwrap().phase, Some(ResourcePhase::Pending));
        match directive {
            Directive::RequeueAfter(delay) => assert!(delay >= PENDING_POLL),
            other => panic!("unexpected directive {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_deploy_failed_stops_polling() {
    let harness = Harness::new();
    let mut svc = service(ab_params(), 1);
    harness.step(&mut svc).await.unwrap();

    harness.adapter.set_raw_status("deploy_failed");
    let directive = harness.step(&mut svc).await.unwrap();
    assert_eq!(directive, Directive::Done);
    assert_eq!(svc.status.as_ref().unwrap().phase, Some(ResourcePhase::Failed));

    // No further provider calls while the spec is unchanged
    let calls = harness.adapter.calls().len();
    assert_eq!(harness.step(&mut svc).await.unwrap(), Directive::Done);
    assert_eq!(harness.adapter.calls().len(), calls);
}

#[tokio::test]
async fn test_create_failure_leaves_status_untouched() {
    let harness = Harness::new();
    harness.adapter.fail("create");
    let svc = service(ab_params(), 1);

    let err = harness.run(&svc).await.unwrap_err();

    assert!(matches!(err, ReconcilerError::Provider(_)));
    assert!(harness.status.commits().is_empty());

    harness.adapter.recover("create");
    harness.run(&svc).await.unwrap();
    assert_eq!(
        harness.adapter.count(|c| matches!(c, Call::Create { .. })),
        2
    );
}

#[tokio::test]
async fn test_drift_triggers_single_update_with_full_params() {
    let harness = Harness::new();
    harness.adapter.set_echoed_params(json!({"a": 2, "b": "x"}));
    let svc = with_status(service(ab_params(), 2), finished_status(1));

    let directive = harness.run(&svc).await.unwrap();

    assert_eq!(directive, Directive::RequeueAfter(PENDING_POLL));
    assert_eq!(
        harness.adapter.calls(),
        vec![
            Call::GetDetail {
                external_id: EXTERNAL_ID.to_string()
            },
            Call::Update {
                external_id: EXTERNAL_ID.to_string(),
                params: serde_json::from_value(json!({"a": 1, "b": "x"})).unwrap(),
            },
        ]
    );
    let status = harness.status.last().unwrap();
    assert_eq!(status.phase, Some(ResourcePhase::Pending));
    assert_eq!(status.reason.as_deref(), Some("Exec 'update' successfully"));
    assert_eq!(status.observed_generation, Some(2));
}

#[tokio::test]
async fn test_stringified_equal_params_are_not_drift() {
    let harness = Harness::new();
    harness.adapter.set_echoed_params(json!({"a": "1", "b": "x"}));
    let svc = with_status(service(ab_params(), 2), finished_status(1));

    let directive = harness.run(&svc).await.unwrap();

    assert_eq!(directive, Directive::RequeueAfter(DRIFT_CHECK));
    assert_eq!(
        harness.adapter.count(|c| matches!(c, Call::Update { .. })),
        0
    );
    let status = harness.status.last().expect("generation recorded");
    assert_eq!(status.phase, Some(ResourcePhase::Finished));
    assert_eq!(status.observed_generation, Some(2));
}

#[tokio::test]
async fn test_float_formatted_echo_is_not_drift() {
    let harness = Harness::new();
    harness.adapter.set_echoed_params(json!({"a": 1.0, "b": "x"}));
    let mut svc = with_status(service(ab_params(), 1), finished_status(1));

    for _ in 0..3 {
        let directive = harness.step(&mut svc).await.unwrap();
        assert_eq!(directive, Directive::RequeueAfter(DRIFT_CHECK));
    }

    assert_eq!(
        harness.adapter.count(|c| matches!(c, Call::Update { .. })),
        0
    );
    assert_eq!(
        harness.adapter.count(|c| matches!(c, Call::GetDetail { .. })),
        3
    );
    assert!(harness.status.commits().is_empty());
}

#[tokio::test]
async fn test_missing_echo_is_not_drift() {
    let harness = Harness::new();
    let svc = with_status(service(ab_params(), 1), finished_status(1));

    let directive = harness.run(&svc).await.unwrap();

    assert_eq!(directive, Directive::RequeueAfter(DRIFT_CHECK));
    assert_eq!(
        harness.adapter.count(|c| matches!(c, Call::Update { .. })),
        0
    );
    assert!(harness.status.commits().is_empty());
}

#[tokio::test]
async fn test_invalid_param_is_terminal() {
    let harness = Harness::new();
    let mut svc = service(json!({"a": {}}), 1);

    let directive = harness.step(&mut svc).await.unwrap();

    assert_eq!(directive, Directive::Done);
    let status = svc.status.clone().unwrap();
    assert_eq!(status.phase, Some(ResourcePhase::Invalid));
    assert!(status
        .reason
        .as_deref()
        .unwrap()
        .starts_with("The value of param 'a' is invalid"));
    assert_eq!(status.observed_generation, Some(1));
    assert!(harness.adapter.calls().is_empty());

    // Re-running does not write or call the provider again
    assert_eq!(harness.step(&mut svc).await.unwrap(), Directive::Done);
    assert_eq!(harness.status.commits().len(), 1);
    assert!(harness.adapter.calls().is_empty());
}

#[tokio::test]
async fn test_missing_required_config_map_is_invalid() {
    let harness = Harness::new();
    let svc = service(
        json!({
            "tier": {
                "valueFrom": { "configMapKeyRef": { "name": "settings", "key": "tier" } }
            }
        }),
        1,
    );

    assert_eq!(harness.run(&svc).await.unwrap(), Directive::Done);
    let status = harness.status.last().unwrap();
    assert_eq!(status.phase, Some(ResourcePhase::Invalid));
    assert_eq!(
        status.reason.as_deref(),
        Some("The value of param 'tier' is invalid: key 'tier' not found in ConfigMap 'settings'")
    );
}

#[tokio::test]
async fn test_references_are_resolved_before_create() {
    let mut harness = Harness::new();
    harness
        .values
        .config_maps
        .insert(("settings".to_string(), "tier".to_string()), "gold".to_string());
    harness
        .values
        .secrets
        .insert(("creds".to_string(), "password".to_string()), b"s3cr3t".to_vec());
    let svc = service(
        json!({
            "tier": { "valueFrom": { "configMapKeyRef": { "name": "settings", "key": "tier" } } },
            "password": { "valueFrom": { "secretKeyRef": { "name": "creds", "key": "password" } } },
            "opts": { "yaml": "pool: 10\nssl: true\n" }
        }),
        1,
    );

    harness.run(&svc).await.unwrap();

    assert_eq!(
        harness.adapter.calls(),
        vec![Call::Create {
            release_id: RELEASE_ID.to_string(),
            params: serde_json::from_value(json!({
                "tier": "gold",
                "password": "s3cr3t",
                "opts": {"pool": 10, "ssl": true}
            }))
            .unwrap(),
        }]
    );
}

#[tokio::test]
async fn test_unknown_resource_type_is_invalid() {
    let harness = Harness::new();
    let mut svc = service(ab_params(), 1);
    svc.spec.resource_type = "DatabaseCluster".to_string();

    assert_eq!(harness.run(&svc).await.unwrap(), Directive::Done);
    let status = harness.status.last().unwrap();
    assert_eq!(status.phase, Some(ResourcePhase::Invalid));
    assert_eq!(
        status.reason.as_deref(),
        Some("Unknown resource type 'DatabaseCluster'")
    );
    assert!(harness.adapter.calls().is_empty());
}

#[tokio::test]
async fn test_edited_failed_release_is_reevaluated() {
    let harness = Harness::new();
    harness.adapter.set_echoed_params(json!({"a": 1, "b": "old"}));
    let failed = json!({
        "phase": "Failed",
        "reason": "Exec 'get' successfully",
        "externalId": EXTERNAL_ID,
        "externalStatus": "deploy_failed",
        "observedGeneration": 1
    });

    // Unchanged spec: nothing happens
    let svc = with_status(service(ab_params(), 1), failed.clone());
    assert_eq!(harness.run(&svc).await.unwrap(), Directive::Done);
    assert!(harness.adapter.calls().is_empty());

    // Edited spec: drift check and update
    let svc = with_status(service(ab_params(), 2), failed);
    assert_eq!(
        harness.run(&svc).await.unwrap(),
        Directive::RequeueAfter(PENDING_POLL)
    );
    assert_eq!(
        harness.adapter.count(|c| matches!(c, Call::Update { .. })),
        1
    );
    assert_eq!(
        harness.status.last().unwrap().phase,
        Some(ResourcePhase::Pending)
    );
}

#[tokio::test]
async fn test_invalid_release_recovers_from_provider_status() {
    let harness = Harness::new();
    harness.adapter.set_echoed_params(json!({"a": 1, "b": "x"}));
    harness.adapter.set_raw_status("ready");
    let svc = with_status(
        service(ab_params(), 3),
        json!({
            "phase": "Invalid",
            "reason": "The value of param 'b' is invalid: no value source is set",
            "externalId": EXTERNAL_ID,
            "observedGeneration": 2
        }),
    );

    let directive = harness.run(&svc).await.unwrap();

    assert_eq!(directive, Directive::RequeueAfter(DRIFT_CHECK));
    let status = harness.status.last().unwrap();
    assert_eq!(status.phase, Some(ResourcePhase::Finished));
    assert_eq!(status.observed_generation, Some(3));
}

#[tokio::test]
async fn test_edit_while_pending_is_checked_once_settled() {
    let harness = Harness::new();
    harness.adapter.set_raw_status("ready");
    let svc = with_status(
        service(ab_params(), 2),
        json!({
            "phase": "Pending",
            "reason": "Exec 'create' successfully",
            "externalId": EXTERNAL_ID,
            "observedGeneration": 1
        }),
    );

    assert_eq!(harness.run(&svc).await.unwrap(), Directive::RequeueNow);
    assert_eq!(
        harness.status.last().unwrap().phase,
        Some(ResourcePhase::Finished)
    );
}

#[tokio::test]
async fn test_delete_then_release_guard() {
    let harness = Harness::new();
    let svc = deleting(with_status(service(ab_params(), 1), finished_status(1)));

    let directive = harness.run(&svc).await.unwrap();

    assert_eq!(directive, Directive::Done);
    assert_eq!(
        harness.adapter.calls(),
        vec![Call::Delete {
            external_id: EXTERNAL_ID.to_string()
        }]
    );
    let status = harness.status.last().unwrap();
    assert_eq!(status.phase, Some(ResourcePhase::Deleted));
    assert_eq!(status.reason.as_deref(), Some("Exec 'delete' successfully"));
    assert!(!harness.guard.is_held());
}

#[tokio::test]
async fn test_no_double_delete() {
    let harness = Harness::new();
    let svc = deleting(with_status(
        service(ab_params(), 1),
        json!({
            "phase": "Deleted",
            "reason": "Exec 'delete' successfully",
            "externalId": EXTERNAL_ID,
            "observedGeneration": 1
        }),
    ));

    assert_eq!(harness.run(&svc).await.unwrap(), Directive::Done);
    assert!(harness.adapter.calls().is_empty());
    assert_eq!(harness.guard.releases.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_delete_without_external_resource() {
    let harness = Harness::new();
    let svc = deleting(service(ab_params(), 1));

    assert_eq!(harness.run(&svc).await.unwrap(), Directive::Done);
    assert!(harness.adapter.calls().is_empty());
    assert!(!harness.guard.is_held());
}

#[tokio::test]
async fn test_delete_failure_keeps_guard() {
    let harness = Harness::new();
    harness.adapter.fail("delete");
    let svc = deleting(with_status(service(ab_params(), 1), finished_status(1)));

    let err = harness.run(&svc).await.unwrap_err();

    assert!(matches!(err, ReconcilerError::Provider(_)));
    assert!(harness.guard.is_held());
    let status = harness.status.last().unwrap();
    assert_eq!(status.phase, Some(ResourcePhase::Deleting));
    assert_eq!(status.reason.as_deref(), Some("Exec 'get' successfully"));
}

#[tokio::test]
async fn test_deleting_without_guard_is_noop() {
    let mut harness = Harness::new();
    harness.guard = FakeGuard::new(false);
    let svc = deleting(with_status(service(ab_params(), 1), finished_status(1)));

    assert_eq!(harness.run(&svc).await.unwrap(), Directive::Done);
    assert!(harness.adapter.calls().is_empty());
    assert_eq!(harness.guard.adds.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_status_write_failure_is_reported() {
    let harness = Harness::new();
    harness.status.set_failing(true);
    let svc = service(json!({"a": {}}), 1);

    let err = harness.run(&svc).await.unwrap_err();
    assert!(matches!(err, ReconcilerError::StatusWrite(_)));
}
