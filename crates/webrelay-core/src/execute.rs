//! The public client: orchestration of routed execution plus the advisory
//! progress stream.
//!
//! One [`Client`] holds immutable configuration and the shared transport;
//! independent calls may run concurrently on it. For every `run_*` call the
//! client assigns (or accepts) a trajectory id, spawns the progress stream
//! alongside the execution, and always lets the execution result settle the
//! outcome. A broken stream only degrades to a warning on an otherwise
//! successful call.

use std::sync::Arc;

use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::control::ControlPlane;
use crate::devices::DeviceListResult;
use crate::error::ClientError;
use crate::routing::{ExecutionOutcome, ExecutionRequest, RoutingMetadata, TaskRouter};
use crate::sse::{stream_events, StreamEvent, StreamParams};
use crate::transport::{HttpFetch, ReqwestFetch, Transport};

/// Final result of an orchestrated call.
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    /// The execution result, exactly as the routed channel returned it.
    pub result: Value,
    pub routing: RoutingMetadata,
    pub trajectory_id: String,
    pub phase: u32,
    /// Present when the progress stream failed but the execution succeeded.
    pub stream_warning: Option<String>,
}

/// Progress callback invoked per stream event. Events are advisory.
pub type ProgressCallback = Box<dyn FnMut(StreamEvent) + Send>;

/// Shared, immutable client handle.
pub struct Client {
    config: Arc<ClientConfig>,
    fetch: Arc<dyn HttpFetch>,
    transport: Arc<Transport>,
    router: TaskRouter,
    control: ControlPlane,
}

impl Client {
    pub fn new(config: ClientConfig) -> Self {
        Self::with_fetch(config, Arc::new(ReqwestFetch::new()))
    }

    /// Construct with an injected fetch primitive. The seam tests use.
    pub fn with_fetch(config: ClientConfig, fetch: Arc<dyn HttpFetch>) -> Self {
        let config = Arc::new(config);
        let transport = Arc::new(Transport::new(
            fetch.clone(),
            config.api_key.clone(),
            config.retry.clone(),
            config.request_timeout,
        ));
        let router = TaskRouter::new(config.clone(), transport.clone());
        let control = ControlPlane::new(transport.clone(), config.clone());
        Self {
            config,
            fetch,
            transport,
            router,
            control,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn control(&self) -> &ControlPlane {
        &self.control
    }

    pub fn transport(&self) -> &Arc<Transport> {
        &self.transport
    }

    /// Execute a task without following its progress stream.
    pub async fn execute(
        &self,
        request: &ExecutionRequest,
        cancel: &CancellationToken,
    ) -> Result<ExecutionOutcome, ClientError> {
        self.router.execute(request, cancel).await
    }

    /// List the extension devices currently reachable through the hub.
    pub async fn list_devices(
        &self,
        cancel: &CancellationToken,
    ) -> Result<DeviceListResult, ClientError> {
        Ok(self.router.directory().list_devices(cancel).await?)
    }

    /// Execute a task while following its progress stream.
    ///
    /// The stream runs concurrently with the execution and is cancelled as
    /// soon as the execution settles. Stream failure on a successful
    /// execution is reported through [`TaskOutcome::stream_warning`], never
    /// as an error.
    pub async fn run(
        &self,
        request: &ExecutionRequest,
        cancel: &CancellationToken,
        on_event: Option<ProgressCallback>,
    ) -> Result<TaskOutcome, ClientError> {
        request.validate()?;

        let trajectory_id = request
            .trajectory_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let phase = request.phase.unwrap_or(1);

        let mut routed = request.clone();
        routed.trajectory_id = Some(trajectory_id.clone());
        routed.phase = Some(phase);
        routed.payload = merge_progress_options(routed.payload, &trajectory_id, phase);

        let stream_cancel = cancel.child_token();
        let stream_handle = on_event.map(|mut callback| {
            let fetch = self.fetch.clone();
            let config = self.config.clone();
            let params = StreamParams {
                trajectory_id: trajectory_id.clone(),
                phase,
                since: None,
                include_output: false,
            };
            let token = stream_cancel.clone();
            tokio::spawn(async move {
                stream_events(fetch.as_ref(), &config, &params, &token, |event| {
                    callback(event);
                })
                .await
            })
        });

        let executed = self.router.execute(&routed, cancel).await;

        // The execution result is authoritative; stop the stream now.
        stream_cancel.cancel();
        let stream_result = match stream_handle {
            Some(handle) => match handle.await {
                Ok(result) => result,
                Err(join_error) => Err(ClientError::Stream(format!(
                    "event stream task failed: {join_error}"
                ))),
            },
            None => Ok(()),
        };

        let outcome = executed?;

        let stream_warning = match stream_result {
            Ok(()) => None,
            Err(error) => {
                let warning = error.to_string();
                warn!(warning = %warning, "progress stream failed on a successful execution");
                Some(warning)
            }
        };

        debug!(
            trajectory_id = %trajectory_id,
            phase,
            selected = %outcome.routing.selected_mode,
            "execution settled"
        );

        Ok(TaskOutcome {
            result: outcome.result,
            routing: outcome.routing,
            trajectory_id,
            phase,
            stream_warning,
        })
    }
}

/// Merge the progress-emission flag and trajectory coordinates into the
/// payload's `options` object. Caller-set keys always win.
fn merge_progress_options(payload: Value, trajectory_id: &str, phase: u32) -> Value {
    let mut map = match payload {
        Value::Object(map) => map,
        other if other.is_null() => Map::new(),
        other => {
            // Non-object payloads already failed validation upstream; pass
            // through untouched for safety.
            return other;
        }
    };

    let options = map
        .entry("options")
        .or_insert_with(|| Value::Object(Map::new()));
    if let Value::Object(options) = options {
        options
            .entry("emitProgressEvents")
            .or_insert(Value::Bool(true));
        options
            .entry("trajectoryId")
            .or_insert_with(|| Value::String(trajectory_id.to_string()));
        options
            .entry("phase")
            .or_insert_with(|| Value::Number(phase.into()));
    }

    Value::Object(map)
}
