mod support;

use std::sync::Arc;

use sotto_engine::{StopOutcome, SubmitOutcome};

use support::{ScriptedProvider, StreamScript, fixture};

#[tokio::test(start_paused = true)]
async fn stop_without_active_request_reports_idle() {
    let fixture = fixture(vec![Arc::new(ScriptedProvider::new(StreamScript::Complete(
        vec![],
    )))]);
    let engine = &fixture.engine;

    assert_eq!(engine.stop().await, StopOutcome::Idle);
    assert_eq!(engine.status_message().await, "No active request to stop");
    assert!(engine.transcript().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn stop_before_any_output_leaves_a_placeholder() {
    let fixture = fixture(vec![Arc::new(ScriptedProvider::new(StreamScript::ThenHang(
        vec![],
    )))]);
    let engine = &fixture.engine;

    assert!(matches!(
        engine.submit("question").await,
        SubmitOutcome::Started(_)
    ));
    assert_eq!(engine.stop().await, StopOutcome::Stopped);

    let snapshot = engine.snapshot().await;
    assert_eq!(snapshot.transcript.len(), 2);
    assert_eq!(snapshot.transcript[1].content, "[Request stopped]");
    assert_eq!(snapshot.status_message, "Request stopped");
    assert!(!snapshot.is_active);
    assert_eq!(snapshot.queue_len, 0);
}

#[tokio::test(start_paused = true)]
async fn stop_with_partial_output_keeps_the_text() {
    let fixture = fixture(vec![Arc::new(ScriptedProvider::new(StreamScript::ThenHang(
        vec!["partial thought"],
    )))]);
    let engine = &fixture.engine;

    engine.submit("question").await;

    let mut snapshots = engine.watch_snapshot();
    snapshots
        .wait_for(|snapshot| snapshot.transcript.len() == 2)
        .await
        .expect("snapshot channel stays open");

    assert_eq!(engine.stop().await, StopOutcome::Stopped);

    let transcript = engine.transcript().await;
    assert_eq!(transcript.len(), 2);
    assert_eq!(transcript[1].content, "partial thought");
    assert_eq!(engine.status_message().await, "Request stopped");
}

#[tokio::test(start_paused = true)]
async fn reset_clears_conversation_queue_and_active_request() {
    let fixture = fixture(vec![Arc::new(ScriptedProvider::new(StreamScript::ThenHang(
        vec![],
    )))]);
    let engine = &fixture.engine;

    engine.submit("first").await;
    engine.submit("second").await;
    engine.reset().await;

    let snapshot = engine.snapshot().await;
    assert!(snapshot.transcript.is_empty());
    assert_eq!(snapshot.queue_len, 0);
    assert!(!snapshot.is_active);
    assert_eq!(snapshot.active_request_id, None);
    assert_eq!(snapshot.status_message, "Conversation cleared");
}
