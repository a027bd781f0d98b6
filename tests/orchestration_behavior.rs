//! Behavior-driven tests for client orchestration.
//!
//! These tests verify HOW the client coordinates the execution call with
//! the advisory progress stream: the execution result always settles the
//! outcome, and stream trouble only ever surfaces as a warning.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use webrelay_core::{Client, ClientError, ExecutionRequest, ExecutionTarget, ProgressCallback, StreamEvent};
use webrelay_tests::{test_config, MockFetch};

fn cloud_run() -> ExecutionRequest {
    ExecutionRequest::run(json!({ "input": "collect today's headlines" }))
        .with_target(ExecutionTarget::Cloud)
}

fn recording_callback() -> (ProgressCallback, Arc<Mutex<Vec<StreamEvent>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let callback: ProgressCallback = Box::new(move |event| {
        sink.lock().unwrap().push(event);
    });
    (callback, events)
}

// =============================================================================
// Trajectory coordinates and progress opt-in
// =============================================================================

#[tokio::test]
async fn when_no_trajectory_is_given_the_client_assigns_one() {
    // Given: a cloud success
    let fetch = Arc::new(MockFetch::new());
    fetch.push_response(200, &json!({ "output": "done" }));

    let client = Client::with_fetch(test_config("wrk_test"), fetch.clone());

    // When: a task runs without trajectory coordinates
    let cancel = CancellationToken::new();
    let outcome = client
        .run(&cloud_run(), &cancel, None)
        .await
        .expect("execution succeeds");

    // Then: a trajectory was assigned and merged into the payload
    assert!(!outcome.trajectory_id.is_empty());
    assert_eq!(outcome.phase, 1);

    let calls = fetch.calls();
    let body: serde_json::Value =
        serde_json::from_str(calls[0].body.as_deref().expect("body")).expect("json body");
    assert_eq!(body["options"]["emitProgressEvents"], true);
    assert_eq!(body["options"]["trajectoryId"], outcome.trajectory_id.as_str());
    assert_eq!(body["options"]["phase"], 1);
}

#[tokio::test]
async fn when_a_trajectory_is_given_it_is_reused_for_the_stream() {
    // Given: a stream and a delayed execution answer
    let fetch = Arc::new(MockFetch::new());
    fetch.push_stream(200, vec![Ok(Bytes::from_static(b"data: {\"step\":1}\n\n"))]);
    fetch.push_delayed_response(Duration::from_millis(100), 200, &json!({ "output": "done" }));

    let client = Client::with_fetch(test_config("wrk_test"), fetch.clone());

    // When: the task resumes an existing trajectory with progress enabled
    let (callback, events) = recording_callback();
    let cancel = CancellationToken::new();
    let request = cloud_run().with_trajectory("traj-42", 3);
    let outcome = client
        .run(&request, &cancel, Some(callback))
        .await
        .expect("execution succeeds");

    // Then: the stream was opened on the caller's coordinates
    assert_eq!(outcome.trajectory_id, "traj-42");
    assert_eq!(outcome.phase, 3);
    let stream_calls = fetch.stream_calls();
    assert_eq!(stream_calls.len(), 1);
    assert!(stream_calls[0].url.contains("/cli/executions/traj-42/events"));
    assert!(stream_calls[0].url.contains("phase=3"));

    // And: the event reached the callback before the execution settled
    assert_eq!(events.lock().unwrap().len(), 1);
    assert!(outcome.stream_warning.is_none());
}

#[tokio::test]
async fn when_no_callback_is_given_no_stream_is_opened() {
    // Given: a cloud success
    let fetch = Arc::new(MockFetch::new());
    fetch.push_response(200, &json!({ "output": "done" }));

    let client = Client::with_fetch(test_config("wrk_test"), fetch.clone());

    // When / Then: the run never touches the stream endpoint
    let cancel = CancellationToken::new();
    client
        .run(&cloud_run(), &cancel, None)
        .await
        .expect("execution succeeds");
    assert_eq!(fetch.stream_call_count(), 0);
}

// =============================================================================
// The execution result is authoritative
// =============================================================================

#[tokio::test]
async fn when_the_stream_fails_a_successful_execution_still_succeeds() {
    // Given: a broken stream endpoint and a slow execution success
    let fetch = Arc::new(MockFetch::new());
    fetch.push_stream_failure("stream endpoint unreachable");
    fetch.push_delayed_response(Duration::from_millis(100), 200, &json!({ "output": "done" }));

    let client = Client::with_fetch(test_config("wrk_test"), fetch.clone());

    // When: the task runs with progress enabled
    let (callback, events) = recording_callback();
    let cancel = CancellationToken::new();
    let outcome = client
        .run(&cloud_run(), &cancel, Some(callback))
        .await
        .expect("stream failure must not fail the execution");

    // Then: the result stands and the stream failure is only a warning
    assert_eq!(outcome.result["output"], "done");
    let warning = outcome.stream_warning.expect("warning present");
    assert!(warning.contains("unreachable"), "warning explains itself: {warning}");
    assert!(events.lock().unwrap().is_empty());
}

#[tokio::test]
async fn when_the_execution_fails_the_stream_cannot_save_it() {
    // Given: a healthy stream and a failing execution
    let fetch = Arc::new(MockFetch::new());
    fetch.push_stream(200, vec![Ok(Bytes::from_static(b"data: {\"step\":1}\n\n"))]);
    fetch.push_response(400, &json!({ "message": "bad payload" }));

    let client = Client::with_fetch(test_config("wrk_test"), fetch.clone());

    // When: the task runs
    let (callback, _) = recording_callback();
    let cancel = CancellationToken::new();
    let error = client
        .run(&cloud_run(), &cancel, Some(callback))
        .await
        .expect_err("execution failure is the outcome");

    // Then: the transport error is returned as-is
    match error {
        ClientError::Transport(transport) => assert_eq!(transport.status, Some(400)),
        other => panic!("unexpected error: {other}"),
    }
}
