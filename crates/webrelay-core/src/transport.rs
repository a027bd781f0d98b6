//! HTTP transport: an injectable fetch primitive plus the retrying JSON
//! request loop every component above it goes through.
//!
//! The [`HttpFetch`] trait is the only seam to the network. Production code
//! uses [`ReqwestFetch`]; tests substitute scripted implementations so that
//! retry, routing, and streaming behavior can be verified without sockets.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::TransportError;
use crate::retry::RetryPolicy;

/// Internal per-request timeout, independent of caller cancellation.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(540);

/// HTTP method set needed by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// Request envelope handed to the fetch primitive. Header names are stored
/// lowercased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
}

impl FetchRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: BTreeMap::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, url)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_bearer(self, token: &str) -> Self {
        self.with_header("authorization", format!("Bearer {token}"))
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// Buffered response from the fetch primitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl FetchResponse {
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

/// Streaming response: status and headers up front, body as a chunk stream.
pub struct FetchStream {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub chunks: BoxStream<'static, Result<Bytes, FetchError>>,
}

/// Failure inside the fetch primitive itself (DNS, connect, read).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    message: String,
}

impl FetchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for FetchError {}

/// The injectable network primitive.
pub trait HttpFetch: Send + Sync {
    fn execute<'a>(
        &'a self,
        request: FetchRequest,
    ) -> Pin<Box<dyn Future<Output = Result<FetchResponse, FetchError>> + Send + 'a>>;

    fn execute_stream<'a>(
        &'a self,
        request: FetchRequest,
    ) -> Pin<Box<dyn Future<Output = Result<FetchStream, FetchError>> + Send + 'a>>;
}

/// Production fetch built on reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestFetch {
    client: Arc<reqwest::Client>,
}

impl ReqwestFetch {
    pub fn new() -> Self {
        Self {
            client: Arc::new(
                reqwest::Client::builder()
                    .user_agent("webrelay/0.1.0")
                    .build()
                    .unwrap_or_else(|_| reqwest::Client::new()),
            ),
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    fn builder(&self, request: &FetchRequest) -> reqwest::RequestBuilder {
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }
        builder
    }
}

impl Default for ReqwestFetch {
    fn default() -> Self {
        Self::new()
    }
}

fn collect_headers(response: &reqwest::Response) -> BTreeMap<String, String> {
    response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_ascii_lowercase(), value.to_string()))
        })
        .collect()
}

impl HttpFetch for ReqwestFetch {
    fn execute<'a>(
        &'a self,
        request: FetchRequest,
    ) -> Pin<Box<dyn Future<Output = Result<FetchResponse, FetchError>> + Send + 'a>> {
        Box::pin(async move {
            let response = self
                .builder(&request)
                .send()
                .await
                .map_err(|error| FetchError::new(format!("request failed: {error}")))?;

            let status = response.status().as_u16();
            let headers = collect_headers(&response);
            let body = response
                .text()
                .await
                .map_err(|error| FetchError::new(format!("failed to read response body: {error}")))?;

            Ok(FetchResponse {
                status,
                headers,
                body,
            })
        })
    }

    fn execute_stream<'a>(
        &'a self,
        request: FetchRequest,
    ) -> Pin<Box<dyn Future<Output = Result<FetchStream, FetchError>> + Send + 'a>> {
        Box::pin(async move {
            let response = self
                .builder(&request)
                .send()
                .await
                .map_err(|error| FetchError::new(format!("request failed: {error}")))?;

            let status = response.status().as_u16();
            let headers = collect_headers(&response);
            let chunks = response
                .bytes_stream()
                .map(|chunk| {
                    chunk.map_err(|error| FetchError::new(format!("stream read failed: {error}")))
                })
                .boxed();

            Ok(FetchStream {
                status,
                headers,
                chunks,
            })
        })
    }
}

/// Parsed JSON response plus the transport context the routing layer surfaces.
#[derive(Debug, Clone)]
pub struct JsonResponse {
    pub payload: Value,
    pub request_id: Option<String>,
    /// 1-based attempt number that produced this response.
    pub attempt: u32,
}

/// JSON request executor with bearer auth, timeout, and retry/backoff.
///
/// Immutable after construction; safe to share across concurrent calls.
pub struct Transport {
    fetch: Arc<dyn HttpFetch>,
    api_key: String,
    retry: RetryPolicy,
    request_timeout: Duration,
}

impl Transport {
    pub fn new(
        fetch: Arc<dyn HttpFetch>,
        api_key: impl Into<String>,
        retry: RetryPolicy,
        request_timeout: Duration,
    ) -> Self {
        Self {
            fetch,
            api_key: api_key.into(),
            retry,
            request_timeout,
        }
    }

    pub fn fetch(&self) -> Arc<dyn HttpFetch> {
        self.fetch.clone()
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Execute a JSON request with retry. Retries network-level errors and
    /// retriable HTTP statuses; never retries past an aborted cancellation.
    pub async fn request_json(
        &self,
        url: &str,
        method: HttpMethod,
        body: Option<&Value>,
        headers: &[(&str, &str)],
        cancel: &CancellationToken,
    ) -> Result<JsonResponse, TransportError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            if cancel.is_cancelled() {
                return Err(TransportError::network("request cancelled"));
            }

            match self.attempt_once(url, method, body, headers, cancel, attempt).await {
                Ok(response) => return Ok(response),
                Err(error) => {
                    let retriable = self.retry.should_retry(&error);
                    if attempt >= self.retry.max_attempts() || !retriable || cancel.is_cancelled() {
                        return Err(error);
                    }

                    let delay = self.retry.delay_for_attempt(attempt);
                    warn!(
                        url,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "transport attempt failed, retrying"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(error),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    async fn attempt_once(
        &self,
        url: &str,
        method: HttpMethod,
        body: Option<&Value>,
        headers: &[(&str, &str)],
        cancel: &CancellationToken,
        attempt: u32,
    ) -> Result<JsonResponse, TransportError> {
        let mut request = FetchRequest::new(method, url)
            .with_header("accept", "application/json")
            .with_bearer(&self.api_key);
        if let Some(body) = body {
            request = request
                .with_header("content-type", "application/json")
                .with_body(body.to_string());
        }
        for (name, value) in headers {
            request = request.with_header(*name, *value);
        }

        debug!(url, attempt, "transport request");

        let response = tokio::select! {
            _ = cancel.cancelled() => {
                return Err(TransportError::network("request cancelled"));
            }
            outcome = tokio::time::timeout(self.request_timeout, self.fetch.execute(request)) => {
                match outcome {
                    Err(_) => {
                        return Err(TransportError::network(format!(
                            "request timed out after {}s",
                            self.request_timeout.as_secs()
                        )));
                    }
                    Ok(Err(error)) => {
                        return Err(TransportError::network_with_cause(
                            format!("transport failure: {error}"),
                            error,
                        ));
                    }
                    Ok(Ok(response)) => response,
                }
            }
        };

        let request_id = response.header("x-request-id").map(str::to_string);

        if !response.is_success() {
            let payload = serde_json::from_str::<Value>(&response.body).ok();
            let message = extract_error_message(payload.as_ref(), response.status);
            let code = extract_error_code(payload.as_ref());
            let details = payload.unwrap_or_else(|| Value::String(response.body.clone()));
            return Err(TransportError::http(response.status, message)
                .with_request_id(request_id)
                .with_code(code)
                .with_details(details));
        }

        let mut payload = if response.body.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str::<Value>(&response.body).map_err(|error| {
                TransportError::network_with_cause("response was not valid JSON", error)
                    .with_request_id(request_id.clone())
            })?
        };

        enrich_metadata(&mut payload, request_id.as_deref(), attempt);

        Ok(JsonResponse {
            payload,
            request_id,
            attempt,
        })
    }
}

/// Error-message cascade for non-2xx payloads: `message`, then
/// `error.message`, then `error` as a string, else `"HTTP {status}"`.
fn extract_error_message(payload: Option<&Value>, status: u16) -> String {
    if let Some(payload) = payload {
        if let Some(message) = payload.get("message").and_then(Value::as_str) {
            return message.to_string();
        }
        if let Some(message) = payload
            .get("error")
            .and_then(|error| error.get("message"))
            .and_then(Value::as_str)
        {
            return message.to_string();
        }
        if let Some(message) = payload.get("error").and_then(Value::as_str) {
            return message.to_string();
        }
    }
    format!("HTTP {status}")
}

fn extract_error_code(payload: Option<&Value>) -> Option<String> {
    let payload = payload?;
    payload
        .get("code")
        .and_then(Value::as_str)
        .or_else(|| {
            payload
                .get("error")
                .and_then(|error| error.get("code"))
                .and_then(Value::as_str)
        })
        .map(str::to_string)
}

/// For object payloads, fill `metadata.requestId` / `metadata.attempt`
/// without overwriting server-set values. Arrays and primitives pass
/// through untouched.
fn enrich_metadata(payload: &mut Value, request_id: Option<&str>, attempt: u32) {
    let Value::Object(map) = payload else {
        return;
    };
    let metadata = map
        .entry("metadata")
        .or_insert_with(|| Value::Object(Map::new()));
    let Value::Object(metadata) = metadata else {
        return;
    };
    if let Some(request_id) = request_id {
        metadata
            .entry("requestId")
            .or_insert_with(|| Value::String(request_id.to_string()));
    }
    metadata
        .entry("attempt")
        .or_insert_with(|| Value::Number(attempt.into()));
}
