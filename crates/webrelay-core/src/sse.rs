//! Server-sent-events parsing and the progress-stream loop.
//!
//! [`SseParser`] is a pure incremental framer: bytes in, events out,
//! regardless of where chunk boundaries fall. [`stream_events`] drives it
//! against the hub's event endpoint, reconnecting while the stream is not
//! ready yet and handing each event to the caller's callback.
//!
//! The stream is advisory. Callers that need the execution result must not
//! treat stream failure as execution failure.

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::transport::{FetchRequest, HttpFetch};

use futures::StreamExt;

/// Statuses that mean "stream not ready yet" during the startup grace
/// window.
const STARTUP_RETRY_STATUS: [u16; 3] = [404, 409, 425];

/// One parsed server-sent event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamEvent {
    /// Last `id:` field of the block, used as the reconnect cursor.
    pub id: Option<String>,
    /// Event type; `message` when the block carries no `event:` field.
    pub event: String,
    /// Parsed JSON when the data lines form valid JSON, else the raw string.
    pub data: Value,
}

/// Incremental SSE framer.
///
/// Feed arbitrary byte chunks; complete blank-line-terminated blocks come
/// out as events. A trailing partial block is flushed once by [`finish`].
///
/// [`finish`]: SseParser::finish
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a chunk, returning every event completed by it.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        loop {
            let Some((block_end, separator_len)) = find_block_boundary(&self.buffer) else {
                break;
            };
            let block: Vec<u8> = self.buffer.drain(..block_end + separator_len).collect();
            if let Some(event) = parse_block(&block[..block_end]) {
                events.push(event);
            }
        }
        events
    }

    /// Flush the trailing partial block, if any. Call once at end of stream.
    pub fn finish(&mut self) -> Option<StreamEvent> {
        if self.buffer.is_empty() {
            return None;
        }
        let block = std::mem::take(&mut self.buffer);
        parse_block(&block)
    }
}

/// Position of the first blank-line block separator (`\n\n` or `\n\r\n`),
/// returning (block length, separator length).
fn find_block_boundary(buffer: &[u8]) -> Option<(usize, usize)> {
    let mut index = 0;
    while index + 1 < buffer.len() {
        if buffer[index] == b'\n' {
            if buffer[index + 1] == b'\n' {
                return Some((index + 1, 1));
            }
            if index + 2 < buffer.len() && buffer[index + 1] == b'\r' && buffer[index + 2] == b'\n' {
                return Some((index + 1, 2));
            }
        }
        index += 1;
    }
    None
}

/// Parse one block. Comment lines (leading `:`) and field-less lines are
/// ignored; blocks with no data lines produce no event.
fn parse_block(block: &[u8]) -> Option<StreamEvent> {
    let text = String::from_utf8_lossy(block);

    let mut id = None;
    let mut event_type: Option<String> = None;
    let mut data_lines: Vec<&str> = Vec::new();

    for line in text.lines() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.starts_with(':') {
            continue;
        }
        let Some((field, rest)) = line.split_once(':') else {
            continue;
        };
        let value = rest.strip_prefix(' ').unwrap_or(rest);
        match field {
            "id" => id = Some(value.to_string()),
            "event" => event_type = Some(value.to_string()),
            "data" => data_lines.push(value),
            _ => {}
        }
    }

    if data_lines.is_empty() {
        return None;
    }

    let raw = data_lines.join("\n");
    let data = serde_json::from_str::<Value>(&raw).unwrap_or(Value::String(raw));

    Some(StreamEvent {
        id,
        event: event_type.unwrap_or_else(|| String::from("message")),
        data,
    })
}

/// Query parameters for the event stream.
#[derive(Debug, Clone)]
pub struct StreamParams {
    pub trajectory_id: String,
    pub phase: u32,
    /// Resume cursor; empty means from the beginning.
    pub since: Option<String>,
    pub include_output: bool,
}

impl StreamParams {
    pub fn new(trajectory_id: impl Into<String>, phase: u32) -> Self {
        Self {
            trajectory_id: trajectory_id.into(),
            phase,
            since: None,
            include_output: false,
        }
    }
}

fn stream_url(config: &ClientConfig, params: &StreamParams) -> String {
    let mut url = format!(
        "{}/cli/executions/{}/events?phase={}&includeOutput={}",
        config.mcp_base_url,
        urlencoding::encode(&params.trajectory_id),
        params.phase,
        params.include_output,
    );
    if let Some(since) = &params.since {
        url.push_str("&since=");
        url.push_str(&urlencoding::encode(since));
    }
    url
}

/// Follow the progress stream for one execution, invoking `on_event` per
/// event.
///
/// While the startup grace window is open, a 404/409/425 response means the
/// server has not registered the execution yet; wait and reconnect from the
/// same cursor. After the window, or on any other failure status, the
/// stream is declared failed. Cancellation ends the stream cleanly.
pub async fn stream_events<F>(
    fetch: &dyn HttpFetch,
    config: &ClientConfig,
    params: &StreamParams,
    cancel: &CancellationToken,
    mut on_event: F,
) -> Result<(), ClientError>
where
    F: FnMut(StreamEvent),
{
    let started = Instant::now();
    let mut cursor = params.since.clone();

    loop {
        if cancel.is_cancelled() {
            return Ok(());
        }

        let connect_params = StreamParams {
            since: cursor.clone(),
            ..params.clone()
        };
        let request = FetchRequest::get(stream_url(config, &connect_params))
            .with_header("accept", "text/event-stream")
            .with_bearer(&config.api_key);

        let stream = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            outcome = fetch.execute_stream(request) => match outcome {
                Ok(stream) => stream,
                Err(error) => {
                    return Err(ClientError::Stream(format!(
                        "event stream connection failed: {error}"
                    )));
                }
            },
        };

        if STARTUP_RETRY_STATUS.contains(&stream.status) {
            if started.elapsed() < config.stream_grace {
                debug!(
                    status = stream.status,
                    trajectory_id = %params.trajectory_id,
                    "event stream not ready, reconnecting"
                );
                tokio::select! {
                    _ = cancel.cancelled() => return Ok(()),
                    _ = tokio::time::sleep(config.stream_retry_interval) => {}
                }
                continue;
            }
            return Err(ClientError::Stream(format!(
                "event stream never became ready (HTTP {})",
                stream.status
            )));
        }

        if !(200..300).contains(&stream.status) {
            return Err(ClientError::Stream(format!(
                "event stream rejected with HTTP {}",
                stream.status
            )));
        }

        return read_stream(stream.chunks, cancel, &mut cursor, &mut on_event).await;
    }
}

async fn read_stream<F>(
    mut chunks: futures::stream::BoxStream<'static, Result<bytes::Bytes, crate::transport::FetchError>>,
    cancel: &CancellationToken,
    cursor: &mut Option<String>,
    on_event: &mut F,
) -> Result<(), ClientError>
where
    F: FnMut(StreamEvent),
{
    let mut parser = SseParser::new();

    loop {
        let chunk = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            chunk = chunks.next() => chunk,
        };

        match chunk {
            Some(Ok(bytes)) => {
                for event in parser.feed(&bytes) {
                    if let Some(id) = &event.id {
                        *cursor = Some(id.clone());
                    }
                    on_event(event);
                }
            }
            Some(Err(error)) => {
                // Mid-stream read failure is fatal for the stream; the
                // caller decides whether that matters for the execution.
                warn!(error = %error, "event stream read failed");
                return Err(ClientError::Stream(format!(
                    "event stream read failed: {error}"
                )));
            }
            None => {
                if let Some(event) = parser.finish() {
                    if let Some(id) = &event.id {
                        *cursor = Some(id.clone());
                    }
                    on_event(event);
                }
                return Ok(());
            }
        }
    }
}
