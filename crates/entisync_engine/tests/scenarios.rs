//! End-to-end mutation scenarios against the scripted remote.

use entisync_engine::{
    ActionKind, DrainStopReason, ErrorCategory, MutationOutcome, MutationRequest, MutationState,
    OfflineAction, RemoteError, SyncError, SyncEvent,
};
use entisync_testkit::{avatar, init_tracing, Avatar, RemoteCall, TestHarness};
use serde_json::json;
use std::time::Duration;
use tokio::sync::broadcast;

async fn next_matching<F>(events: &mut broadcast::Receiver<SyncEvent>, mut pred: F) -> SyncEvent
where
    F: FnMut(&SyncEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = events.recv().await.expect("event channel closed");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

#[tokio::test]
async fn scenario_a_conflict_rolls_back() {
    init_tracing();
    let harness = TestHarness::new();
    harness.seed([avatar("x", "u1", "original")]).await;
    let before = harness.coordinator.store_view();

    harness
        .remote
        .fail_next(RemoteError::conflict("version mismatch"));
    let err = harness
        .coordinator
        .update_entity(avatar("x", "u1", "V1"))
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::MutationRolledBack { .. }));
    assert_eq!(err.category(), Some(ErrorCategory::Conflict));
    assert_eq!(
        harness.coordinator.get(&"x".into()).map(|a| a.name),
        Some("original".to_string())
    );
    assert_eq!(harness.coordinator.store_view(), before);
    assert!(harness.coordinator.snapshot_timestamps().is_empty());
    assert_eq!(harness.coordinator.pending_count(), 0);
    // Conflicts are permanent: one attempt only.
    assert_eq!(harness.remote.calls_for("x"), 1);
    assert_eq!(harness.remote.row("x").unwrap().name, "original");
}

#[tokio::test]
async fn scenario_b_transient_failures_then_commit() {
    let harness = TestHarness::new();
    harness.seed([avatar("x", "u1", "original")]).await;

    harness
        .remote
        .fail_next_n(2, RemoteError::connectivity("request timed out"));
    let outcome = harness
        .coordinator
        .update_entity(avatar("x", "u1", "V1"))
        .await
        .unwrap();

    assert_eq!(outcome, MutationOutcome::Committed);
    assert_eq!(harness.remote.calls_for("x"), 3);
    assert_eq!(harness.remote.row("x").unwrap().name, "V1");
    assert_eq!(harness.coordinator.get(&"x".into()).unwrap().name, "V1");
    assert_eq!(harness.coordinator.stats().mutations_rolled_back, 0);
    assert_eq!(harness.coordinator.stats().retries, 2);
    assert!(harness.coordinator.queue().is_empty());
}

#[tokio::test]
async fn scenario_b_budget_is_three_attempts_total() {
    let harness = TestHarness::new();
    harness.seed([avatar("x", "u1", "original")]).await;

    // A fourth call would succeed; it must never be made.
    harness
        .remote
        .fail_next_n(3, RemoteError::connectivity("request timed out"));
    let outcome = harness
        .coordinator
        .update_entity(avatar("x", "u1", "V1"))
        .await
        .unwrap();

    assert_eq!(outcome, MutationOutcome::QueuedOffline);
    assert_eq!(harness.remote.calls_for("x"), 3);
    assert_eq!(harness.remote.row("x").unwrap().name, "original");
    assert_eq!(harness.coordinator.get(&"x".into()).unwrap().name, "original");
    assert_eq!(harness.coordinator.queue().size(), 1);
    assert!(!harness.monitor.is_online());
}

#[tokio::test]
async fn scenario_c_offline_mutation_is_queued_without_remote_call() {
    let harness = TestHarness::new();
    harness.seed([avatar("x", "u1", "original")]).await;
    let calls_before = harness.remote.call_count();
    harness.go_offline();

    let mut events = harness.coordinator.subscribe_events();
    let outcome = harness
        .coordinator
        .update_entity(avatar("x", "u1", "V1"))
        .await
        .unwrap();

    assert_eq!(outcome, MutationOutcome::QueuedOffline);
    assert_eq!(harness.remote.call_count(), calls_before);
    assert_eq!(harness.coordinator.get(&"x".into()).unwrap().name, "original");
    assert!(harness.coordinator.snapshot_timestamps().is_empty());

    let queued = harness.coordinator.queue().contents();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].kind, ActionKind::Update);
    assert_eq!(queued[0].payload["name"], "V1");

    match events.try_recv().unwrap() {
        SyncEvent::Mutation { state, .. } => assert_eq!(state, MutationState::QueuedOffline),
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn scenario_d_rejected_replay_halts_drain() {
    init_tracing();
    let harness = TestHarness::new();
    harness.go_offline();

    let first = OfflineAction::new(ActionKind::Comment, "locked-post", json!({"text": "hi"}));
    let second = OfflineAction::new(ActionKind::Like, "open-post", json!({}));
    for action in [first.clone(), second.clone()] {
        let outcome = harness
            .coordinator
            .mutate(MutationRequest::new(action, |_| {}))
            .await
            .unwrap();
        assert_eq!(outcome, MutationOutcome::QueuedOffline);
    }
    harness
        .remote
        .fail_key("locked-post", RemoteError::authorization("row-level security"));

    let mut events = harness.coordinator.subscribe_events();
    let tasks = harness.coordinator.start();
    harness.go_online();

    let halted = next_matching(&mut events, |event| {
        matches!(event, SyncEvent::DrainHalted { .. })
    })
    .await;
    match halted {
        SyncEvent::DrainHalted {
            action,
            error,
            reason,
        } => {
            assert_eq!(action.id, first.id);
            assert_eq!(error.category(), ErrorCategory::Authorization);
            assert_eq!(reason, DrainStopReason::Rejected);
        }
        other => panic!("unexpected event {other:?}"),
    }

    let remaining = harness.coordinator.queue().contents();
    assert_eq!(remaining.len(), 2);
    assert_eq!(remaining[0].id, first.id);
    assert_eq!(harness.remote.calls_for("locked-post"), 1);
    assert_eq!(harness.remote.calls_for("open-post"), 0);
    assert_eq!(harness.coordinator.stats().drains_halted, 1);

    tasks.shutdown();
}

#[tokio::test]
async fn offline_mutations_replay_after_reconnect() {
    let harness = TestHarness::new();
    harness.seed([avatar("x", "u1", "original")]).await;
    harness.go_offline();

    harness
        .coordinator
        .update_entity(avatar("x", "u1", "V1"))
        .await
        .unwrap();
    harness
        .coordinator
        .update_entity(avatar("x", "u1", "V2"))
        .await
        .unwrap();

    let mut events = harness.coordinator.subscribe_events();
    let tasks = harness.coordinator.start();
    harness.go_online();

    next_matching(&mut events, |event| {
        matches!(event, SyncEvent::DrainFinished { remaining: 0, .. })
    })
    .await;

    assert!(harness.coordinator.queue().is_empty());
    assert_eq!(harness.remote.row("x").unwrap().name, "V2");
    let replayed: Vec<RemoteCall> = harness
        .remote
        .calls()
        .into_iter()
        .filter(|call| matches!(call, RemoteCall::ApplyAction { .. }))
        .collect();
    assert_eq!(replayed.len(), 2);

    tasks.shutdown();
}

#[tokio::test]
async fn rejected_create_removes_optimistic_entity() {
    let harness = TestHarness::new();
    harness
        .remote
        .fail_key("new", RemoteError::validation("name too long"));

    let err = harness
        .coordinator
        .create_entity(avatar("new", "u1", "Zed"))
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::MutationRolledBack { .. }));
    assert!(harness.coordinator.get(&"new".into()).is_none());
    assert!(harness.coordinator.owned_by(&"u1".into()).is_empty());
}

#[tokio::test]
async fn rejected_set_active_restores_previous_selection() {
    let harness = TestHarness::new();
    let first = avatar("a1", "u1", "Ada");
    let second = avatar("a2", "u1", "Bea");
    harness.seed([first.clone(), second.clone()]).await;

    harness.coordinator.set_active(first.clone()).await.unwrap();
    assert_eq!(harness.coordinator.active(), Some(first.clone()));

    harness
        .remote
        .fail_next(RemoteError::authorization("not your avatar"));
    let err = harness
        .coordinator
        .set_active(second.renamed("Bea 2"))
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::MutationRolledBack { .. }));
    assert_eq!(harness.coordinator.active(), Some(first));
    assert_eq!(harness.coordinator.get(&"a2".into()), Some(second));
}

#[tokio::test]
async fn update_of_missing_row_reports_not_found() {
    let harness = TestHarness::new();
    harness.seed([avatar("x", "u1", "original")]).await;
    harness.remote.delete_row("x");

    let err = harness
        .coordinator
        .update_entity(avatar("x", "u1", "V1"))
        .await
        .unwrap_err();

    assert_eq!(err.category(), Some(ErrorCategory::NotFound));
    assert_eq!(harness.coordinator.get(&"x".into()).unwrap().name, "original");
}

#[tokio::test]
async fn view_mode_change_rolls_back() {
    let harness = TestHarness::new();
    harness.seed([avatar("x", "u1", "original")]).await;
    harness
        .coordinator
        .set_view_mode("x".into(), entisync_engine::ViewMode::Followers)
        .await
        .unwrap();

    harness.remote.fail_next(RemoteError::authorization("denied"));
    let result = harness
        .coordinator
        .set_view_mode("x".into(), entisync_engine::ViewMode::Private)
        .await;

    assert!(result.is_err());
    assert_eq!(
        harness.coordinator.view_mode(&"x".into()),
        Some(entisync_engine::ViewMode::Followers)
    );
}

#[tokio::test]
async fn delete_rejected_restores_entity() {
    let harness = TestHarness::new();
    let row: Avatar = avatar("x", "u1", "original");
    harness.seed([row.clone()]).await;

    harness.remote.fail_next(RemoteError::authorization("denied"));
    assert!(harness.coordinator.delete_entity("x".into()).await.is_err());
    assert_eq!(harness.coordinator.get(&"x".into()), Some(row));

    harness.coordinator.delete_entity("x".into()).await.unwrap();
    assert!(harness.coordinator.get(&"x".into()).is_none());
    assert!(harness.remote.row("x").is_none());
}
