//! Channel routing: cloud vs. extension, decided per call.
//!
//! The router holds no cross-call state. Every call produces a
//! [`RoutingMetadata`] whose `selected_mode` is always concrete (`cloud` or
//! `extension`, never `auto`) while `requested_mode` preserves what the
//! caller asked for.
//!
//! # Decision paths
//!
//! | Requested | Behavior |
//! |-----------|----------|
//! | `cloud` | direct cloud endpoint |
//! | `extension` | direct hub tool call; server aliasing reported truthfully |
//! | `auto` + hard local requirement | probe unless an explicit device was given; no devices is fatal; aliasing is an error |
//! | `auto` (soft) | probe, try extension when online, fall back to cloud only on device-unavailability |
//!
//! Fallback only ever flows extension → cloud, and only on the soft path.

use std::fmt::{Display, Formatter};
use std::sync::Arc;

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::auth::{ensure_scope, EndpointClass};
use crate::config::ClientConfig;
use crate::devices::DeviceDirectory;
use crate::error::{ClientError, TransportError};
use crate::tools::{
    is_cloud_tool, TOOL_RUN_CLOUD, TOOL_RUN_EXTENSION, TOOL_SCRAPE_CLOUD, TOOL_SCRAPE_EXTENSION,
};
use crate::transport::{HttpMethod, JsonResponse, Transport};

/// Task family, determining the cloud endpoint and the hub tool pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Run,
    Scrape,
}

impl TaskKind {
    pub const fn cloud_path(self) -> &'static str {
        match self {
            Self::Run => "/agent",
            Self::Scrape => "/scrape",
        }
    }

    pub const fn extension_tool(self) -> &'static str {
        match self {
            Self::Run => TOOL_RUN_EXTENSION,
            Self::Scrape => TOOL_SCRAPE_EXTENSION,
        }
    }

    pub const fn cloud_tool(self) -> &'static str {
        match self {
            Self::Run => TOOL_RUN_CLOUD,
            Self::Scrape => TOOL_SCRAPE_CLOUD,
        }
    }

    const fn required_field(self) -> &'static str {
        match self {
            Self::Run => "input",
            Self::Scrape => "urls",
        }
    }
}

/// Channel requested by the caller (or configured default).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionTarget {
    #[default]
    Auto,
    Cloud,
    Extension,
}

impl ExecutionTarget {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Cloud => "cloud",
            Self::Extension => "extension",
        }
    }
}

impl Display for ExecutionTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Channel that actually executed the call. Never `auto`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectedMode {
    Cloud,
    Extension,
}

impl SelectedMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cloud => "cloud",
            Self::Extension => "extension",
        }
    }
}

impl Display for SelectedMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One execution call. Immutable input, created per call by the caller.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub kind: TaskKind,
    /// Opaque task payload (input/urls, schema, files, settings, webhooks).
    pub payload: Value,
    pub target: Option<ExecutionTarget>,
    pub device_id: Option<String>,
    pub prefer_extension: bool,
    pub require_local_session: bool,
    pub trajectory_id: Option<String>,
    pub phase: Option<u32>,
}

impl ExecutionRequest {
    pub fn run(payload: Value) -> Self {
        Self::new(TaskKind::Run, payload)
    }

    pub fn scrape(payload: Value) -> Self {
        Self::new(TaskKind::Scrape, payload)
    }

    fn new(kind: TaskKind, payload: Value) -> Self {
        Self {
            kind,
            payload,
            target: None,
            device_id: None,
            prefer_extension: false,
            require_local_session: false,
            trajectory_id: None,
            phase: None,
        }
    }

    pub fn with_target(mut self, target: ExecutionTarget) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    pub fn with_prefer_extension(mut self, prefer: bool) -> Self {
        self.prefer_extension = prefer;
        self
    }

    pub fn with_require_local_session(mut self, required: bool) -> Self {
        self.require_local_session = required;
        self
    }

    pub fn with_trajectory(mut self, trajectory_id: impl Into<String>, phase: u32) -> Self {
        self.trajectory_id = Some(trajectory_id.into());
        self.phase = Some(phase);
        self
    }

    /// An explicit device always counts as a hard local-session requirement.
    pub fn requires_local_session(&self) -> bool {
        self.require_local_session || self.device_id.is_some()
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        let field = self.kind.required_field();
        let present = match self.kind {
            TaskKind::Run => self
                .payload
                .get(field)
                .and_then(Value::as_str)
                .is_some_and(|input| !input.trim().is_empty()),
            TaskKind::Scrape => self
                .payload
                .get(field)
                .and_then(Value::as_array)
                .is_some_and(|urls| !urls.is_empty()),
        };
        if present {
            Ok(())
        } else {
            Err(ClientError::Validation(format!(
                "request payload is missing required field '{field}'"
            )))
        }
    }
}

/// How a call was routed. Computed once per call and returned alongside the
/// result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingMetadata {
    pub selected_mode: SelectedMode,
    pub requested_mode: ExecutionTarget,
    pub fallback_applied: bool,
    pub fallback_reason: Option<String>,
    pub device_id: Option<String>,
    pub request_id: Option<String>,
    pub attempt: u32,
}

/// Result of a routed execution call.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub result: Value,
    pub routing: RoutingMetadata,
}

/// Per-call routing engine.
pub struct TaskRouter {
    config: Arc<ClientConfig>,
    transport: Arc<Transport>,
    directory: DeviceDirectory,
}

impl TaskRouter {
    pub fn new(config: Arc<ClientConfig>, transport: Arc<Transport>) -> Self {
        let directory = DeviceDirectory::new(transport.clone(), config.mcp_base_url.clone());
        Self {
            config,
            transport,
            directory,
        }
    }

    pub fn directory(&self) -> &DeviceDirectory {
        &self.directory
    }

    /// Route and execute one call.
    pub async fn execute(
        &self,
        request: &ExecutionRequest,
        cancel: &CancellationToken,
    ) -> Result<ExecutionOutcome, ClientError> {
        request.validate()?;

        let requested = request.target.unwrap_or(if request.prefer_extension {
            ExecutionTarget::Auto
        } else {
            self.config.default_target
        });

        debug!(requested = %requested, kind = ?request.kind, "routing execution call");

        match requested {
            ExecutionTarget::Cloud => self.execute_cloud(request, requested, false, None, cancel).await,
            ExecutionTarget::Extension => self.execute_extension_direct(request, requested, cancel).await,
            ExecutionTarget::Auto => self.execute_auto(request, cancel).await,
        }
    }

    async fn execute_cloud(
        &self,
        request: &ExecutionRequest,
        requested: ExecutionTarget,
        fallback_applied: bool,
        fallback_reason: Option<String>,
        cancel: &CancellationToken,
    ) -> Result<ExecutionOutcome, ClientError> {
        ensure_scope(self.transport.api_key(), EndpointClass::Cloud)?;

        let url = format!("{}{}", self.config.cloud_base_url, request.kind.cloud_path());
        let response = self
            .transport
            .request_json(&url, HttpMethod::Post, Some(&request.payload), &[], cancel)
            .await?;

        info!(
            selected = %SelectedMode::Cloud,
            requested = %requested,
            fallback_applied,
            "execution routed"
        );

        Ok(ExecutionOutcome {
            routing: RoutingMetadata {
                selected_mode: SelectedMode::Cloud,
                requested_mode: requested,
                fallback_applied,
                fallback_reason,
                device_id: None,
                request_id: response.request_id.clone(),
                attempt: response.attempt,
            },
            result: response.payload,
        })
    }

    /// Explicit `extension` target: execute directly and report server-side
    /// aliasing truthfully. Not a client-side retry.
    async fn execute_extension_direct(
        &self,
        request: &ExecutionRequest,
        requested: ExecutionTarget,
        cancel: &CancellationToken,
    ) -> Result<ExecutionOutcome, ClientError> {
        let (response, result) = self.call_extension_tool(request, cancel).await?;
        let resolved = resolved_cloud_tool(&response.payload, request.kind);

        let (selected, fallback_applied, fallback_reason) = match resolved {
            Some(tool) => (
                SelectedMode::Cloud,
                true,
                Some(format!("server resolved the call to '{tool}'")),
            ),
            None => (SelectedMode::Extension, false, None),
        };

        info!(selected = %selected, requested = %requested, fallback_applied, "execution routed");

        Ok(ExecutionOutcome {
            routing: RoutingMetadata {
                selected_mode: selected,
                requested_mode: requested,
                fallback_applied,
                fallback_reason,
                device_id: request.device_id.clone(),
                request_id: response.request_id.clone(),
                attempt: response.attempt,
            },
            result,
        })
    }

    async fn execute_auto(
        &self,
        request: &ExecutionRequest,
        cancel: &CancellationToken,
    ) -> Result<ExecutionOutcome, ClientError> {
        let requested = ExecutionTarget::Auto;

        if request.requires_local_session() {
            // Hard path: the caller demanded a local session. No fallback.
            if request.device_id.is_none() {
                let devices = self.directory.list_devices(cancel).await?;
                if !devices.any_online() {
                    return Err(ClientError::NoDevice(String::from(
                        "no online extension device for a required local session",
                    )));
                }
            }

            let (response, result) = self.call_extension_tool(request, cancel).await?;
            if let Some(tool) = resolved_cloud_tool(&response.payload, request.kind) {
                return Err(ClientError::LocalSessionNotHonored(tool));
            }

            info!(selected = %SelectedMode::Extension, requested = %requested, "execution routed");

            return Ok(ExecutionOutcome {
                routing: RoutingMetadata {
                    selected_mode: SelectedMode::Extension,
                    requested_mode: requested,
                    fallback_applied: false,
                    fallback_reason: None,
                    device_id: request.device_id.clone(),
                    request_id: response.request_id.clone(),
                    attempt: response.attempt,
                },
                result,
            });
        }

        // Soft path: probe the directory, prefer the extension when a
        // device is reachable, fall back to cloud only when the extension
        // attempt failed for device unavailability.
        let devices = self.directory.list_devices(cancel).await?;
        if devices.any_online() {
            match self.call_extension_tool(request, cancel).await {
                Ok((response, result)) => {
                    let resolved = resolved_cloud_tool(&response.payload, request.kind);
                    let (selected, fallback_applied, fallback_reason) = match resolved {
                        Some(tool) => (
                            SelectedMode::Cloud,
                            true,
                            Some(format!("server resolved the call to '{tool}'")),
                        ),
                        None => (SelectedMode::Extension, false, None),
                    };

                    info!(selected = %selected, requested = %requested, fallback_applied, "execution routed");

                    return Ok(ExecutionOutcome {
                        routing: RoutingMetadata {
                            selected_mode: selected,
                            requested_mode: requested,
                            fallback_applied,
                            fallback_reason,
                            device_id: None,
                            request_id: response.request_id.clone(),
                            attempt: response.attempt,
                        },
                        result,
                    });
                }
                Err(error) if error.is_device_unavailable() => {
                    let reason = format!("extension unavailable: {error}");
                    warn!(reason = %reason, "falling back to cloud");
                    return self
                        .execute_cloud(request, requested, true, Some(reason), cancel)
                        .await;
                }
                Err(error) => return Err(error),
            }
        }

        // No device was ever online: go straight to cloud, no wasted round
        // trip and no fallback flag.
        self.execute_cloud(request, requested, false, None, cancel).await
    }

    /// Issue the hub tool call for this task and unwrap its envelope.
    async fn call_extension_tool(
        &self,
        request: &ExecutionRequest,
        cancel: &CancellationToken,
    ) -> Result<(JsonResponse, Value), ClientError> {
        ensure_scope(self.transport.api_key(), EndpointClass::Hub)?;

        let mut body = json!({
            "tool": request.kind.extension_tool(),
            "params": request.payload,
        });
        if let Some(device_id) = &request.device_id {
            body["deviceId"] = Value::String(device_id.clone());
        }

        let response = self
            .transport
            .request_json(
                &self.config.mcp_base_url,
                HttpMethod::Post,
                Some(&body),
                &[],
                cancel,
            )
            .await?;

        let success = response
            .payload
            .get("success")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if !success {
            let message = extract_envelope_error(&response.payload);
            return Err(ClientError::Transport(
                TransportError::network(message)
                    .with_request_id(response.request_id.clone())
                    .with_details(response.payload),
            ));
        }

        let result = response
            .payload
            .get("data")
            .cloned()
            .unwrap_or(Value::Null);
        Ok((response, result))
    }
}

/// Error message from a hub envelope: `error` as a string, then
/// `error.message`, else a generic fallback.
fn extract_envelope_error(payload: &Value) -> String {
    if let Some(message) = payload.get("error").and_then(Value::as_str) {
        return message.to_string();
    }
    if let Some(message) = payload
        .get("error")
        .and_then(|error| error.get("message"))
        .and_then(Value::as_str)
    {
        return message.to_string();
    }
    String::from("hub tool call failed")
}

/// Tool id the server reports having resolved the call to, when it names
/// the cloud-side variant of this task's tool.
fn resolved_cloud_tool(payload: &Value, kind: TaskKind) -> Option<String> {
    let resolved = payload
        .get("metadata")
        .and_then(|metadata| metadata.get("resolvedTool"))
        .and_then(Value::as_str)?;
    if is_cloud_tool(resolved) || resolved == kind.cloud_tool() {
        Some(resolved.to_string())
    } else {
        None
    }
}
