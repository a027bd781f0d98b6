//! Behavior-driven tests for the progress event stream.
//!
//! These tests verify HOW the stream loop frames events across arbitrary
//! chunk boundaries, reconnects while the server is not ready, and reacts
//! to cancellation and failures.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use webrelay_core::sse::{stream_events, StreamEvent, StreamParams};
use webrelay_core::{ClientConfig, ClientError, RetryPolicy};
use webrelay_tests::MockFetch;

fn stream_config(grace: Duration) -> ClientConfig {
    ClientConfig::builder()
        .with_api_key("wrk_test")
        .with_mcp_base_url("https://hub.test/mcp")
        .with_retry(RetryPolicy::new(1, 1, 2))
        .with_stream_grace(grace)
        .with_stream_retry_interval(Duration::from_millis(5))
        .build()
        .expect("valid config")
}

async fn collect_events(
    fetch: &MockFetch,
    config: &ClientConfig,
    params: &StreamParams,
) -> (Result<(), ClientError>, Vec<StreamEvent>) {
    let mut events = Vec::new();
    let cancel = CancellationToken::new();
    let result = stream_events(fetch, config, params, &cancel, |event| events.push(event)).await;
    (result, events)
}

// =============================================================================
// Framing: events survive arbitrary chunk boundaries
// =============================================================================

#[tokio::test]
async fn when_blocks_are_split_across_chunks_events_arrive_in_order() {
    // Given: two events split awkwardly across three chunks
    let fetch = MockFetch::new();
    fetch.push_stream(
        200,
        vec![
            Ok(Bytes::from_static(b"id: 1\nevent: progress\ndata: {\"st")),
            Ok(Bytes::from_static(b"ep\":1}\n\ndata: pla")),
            Ok(Bytes::from_static(b"in\n\n")),
        ],
    );

    let config = stream_config(Duration::from_millis(100));
    let params = StreamParams::new("t-1", 1);

    // When: the stream is followed to its end
    let (result, events) = collect_events(&fetch, &config, &params).await;

    // Then: both events arrive, typed and parsed
    result.expect("clean end of stream");
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].event, "progress");
    assert_eq!(events[0].data, json!({ "step": 1 }));
    assert_eq!(events[1].event, "message");
    assert_eq!(events[1].data, json!("plain"));
}

#[tokio::test]
async fn when_the_stream_ends_mid_block_the_partial_is_flushed_once() {
    // Given: a stream that ends without a trailing blank line
    let fetch = MockFetch::new();
    fetch.push_stream(
        200,
        vec![Ok(Bytes::from_static(b"data: first\n\ndata: unterminated"))],
    );

    let config = stream_config(Duration::from_millis(100));
    let params = StreamParams::new("t-1", 1);

    // When / Then: the trailing block still comes through
    let (result, events) = collect_events(&fetch, &config, &params).await;
    result.expect("clean end of stream");
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].data, json!("unterminated"));
}

#[tokio::test]
async fn when_only_comments_arrive_no_events_are_emitted() {
    // Given: keep-alive comments and a field-less line
    let fetch = MockFetch::new();
    fetch.push_stream(
        200,
        vec![Ok(Bytes::from_static(b": keep-alive\n\nnoise\n\n"))],
    );

    let config = stream_config(Duration::from_millis(100));
    let params = StreamParams::new("t-1", 1);

    // When / Then: the stream ends cleanly with nothing delivered
    let (result, events) = collect_events(&fetch, &config, &params).await;
    result.expect("clean end of stream");
    assert!(events.is_empty());
}

// =============================================================================
// Startup grace: not-ready answers reconnect, others fail
// =============================================================================

#[tokio::test]
async fn when_the_stream_is_not_ready_yet_it_reconnects_within_the_grace_window() {
    // Given: a 404 answer followed by a working stream
    let fetch = MockFetch::new();
    fetch.push_stream(404, vec![]);
    fetch.push_stream(200, vec![Ok(Bytes::from_static(b"data: ready\n\n"))]);

    let config = stream_config(Duration::from_secs(5));
    let params = StreamParams::new("t-1", 1);

    // When: the stream is followed
    let (result, events) = collect_events(&fetch, &config, &params).await;

    // Then: the second connection delivered the event
    result.expect("reconnect succeeds");
    assert_eq!(fetch.stream_call_count(), 2);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].data, json!("ready"));
}

#[tokio::test]
async fn when_the_grace_window_is_exhausted_not_ready_becomes_fatal() {
    // Given: a zero grace window and a not-ready answer
    let fetch = MockFetch::new();
    fetch.push_stream(404, vec![]);

    let config = stream_config(Duration::ZERO);
    let params = StreamParams::new("t-1", 1);

    // When / Then: the stream fails instead of looping
    let (result, events) = collect_events(&fetch, &config, &params).await;
    assert!(matches!(result, Err(ClientError::Stream(_))));
    assert!(events.is_empty());
    assert_eq!(fetch.stream_call_count(), 1);
}

#[tokio::test]
async fn when_the_server_rejects_the_stream_it_fails_immediately() {
    // Given: a 500 inside a generous grace window
    let fetch = MockFetch::new();
    fetch.push_stream(500, vec![]);

    let config = stream_config(Duration::from_secs(5));
    let params = StreamParams::new("t-1", 1);

    // When / Then: 500 is not a not-ready status, no reconnect happens
    let (result, _) = collect_events(&fetch, &config, &params).await;
    assert!(matches!(result, Err(ClientError::Stream(_))));
    assert_eq!(fetch.stream_call_count(), 1);
}

// =============================================================================
// Failure and cancellation
// =============================================================================

#[tokio::test]
async fn when_a_read_fails_mid_stream_the_stream_is_declared_failed() {
    // Given: one good chunk then a read error
    let fetch = MockFetch::new();
    fetch.push_stream(
        200,
        vec![
            Ok(Bytes::from_static(b"data: one\n\n")),
            Err(webrelay_core::FetchError::new("connection reset")),
        ],
    );

    let config = stream_config(Duration::from_millis(100));
    let params = StreamParams::new("t-1", 1);

    // When / Then: the delivered event stands, the stream reports failure
    let (result, events) = collect_events(&fetch, &config, &params).await;
    assert_eq!(events.len(), 1);
    assert!(matches!(result, Err(ClientError::Stream(_))));
}

#[tokio::test]
async fn when_cancelled_mid_stream_the_loop_halts_cleanly() {
    // Given: a stream that delivers one event and then stays open
    let fetch = MockFetch::new();
    fetch.push_hanging_stream(200, vec![Ok(Bytes::from_static(b"data: one\n\n"))]);

    let config = stream_config(Duration::from_millis(100));
    let params = StreamParams::new("t-1", 1);
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    // When: the stream is followed until cancellation
    let mut events = Vec::new();
    let result = stream_events(&fetch, &config, &params, &cancel, |event| events.push(event)).await;

    // Then: what arrived before the cancel stands, and no error is raised
    result.expect("cancellation is not an error");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].data, json!("one"));
}

#[tokio::test]
async fn when_the_token_is_cancelled_up_front_the_stream_ends_cleanly() {
    // Given: a cancelled token before the first connection
    let fetch = MockFetch::new();

    let config = stream_config(Duration::from_secs(5));
    let params = StreamParams::new("t-1", 1);
    let cancel = CancellationToken::new();
    cancel.cancel();

    // When / Then: no connection is made and no error is raised
    let mut events = Vec::new();
    let result = stream_events(&fetch, &config, &params, &cancel, |event| events.push(event)).await;
    result.expect("cancellation is not an error");
    assert!(events.is_empty());
    assert_eq!(fetch.stream_call_count(), 0);
}

// =============================================================================
// Connection parameters
// =============================================================================

#[tokio::test]
async fn when_a_cursor_is_supplied_the_connection_resumes_from_it() {
    // Given: a working stream and a resume cursor
    let fetch = MockFetch::new();
    fetch.push_stream(200, vec![]);

    let config = stream_config(Duration::from_millis(100));
    let mut params = StreamParams::new("t-1", 2);
    params.since = Some(String::from("ev-5"));
    params.include_output = true;

    // When: the stream connects
    let (result, _) = collect_events(&fetch, &config, &params).await;
    result.expect("empty stream ends cleanly");

    // Then: the request carried the cursor and flags
    let calls = fetch.stream_calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].url.contains("/cli/executions/t-1/events"));
    assert!(calls[0].url.contains("phase=2"));
    assert!(calls[0].url.contains("includeOutput=true"));
    assert!(calls[0].url.contains("since=ev-5"));
    assert_eq!(
        calls[0].headers.get("accept").map(String::as_str),
        Some("text/event-stream")
    );
}
