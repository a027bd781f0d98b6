//! # Webrelay Core
//!
//! Client SDK for routing browser-automation tasks to a managed cloud
//! backend or a locally installed browser extension.
//!
//! ## Overview
//!
//! This crate provides the foundational components for Webrelay:
//!
//! - **Channel routing** between the cloud backend and the extension hub,
//!   including automatic selection with cloud fallback
//! - **Retrying HTTP transport** with exponential backoff and jitter behind
//!   an injectable fetch trait
//! - **Progress streaming** over server-sent events, advisory by design
//! - **Device directory** queries for reachable extension endpoints
//! - **Control-plane reads** for profile, capabilities, and Google auth
//! - **Token scope checks** that fail fast before any network call
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`auth`] | API-key scope classification and enforcement |
//! | [`config`] | Client configuration and builder |
//! | [`control`] | Control-plane reads (profile, capabilities) |
//! | [`devices`] | Extension device directory |
//! | [`error`] | Error types |
//! | [`execute`] | Client orchestration (execution + progress stream) |
//! | [`payload`] | Out-of-line result payload resolution |
//! | [`retry`] | Retry policy with backoff and jitter |
//! | [`routing`] | Channel selection and fallback |
//! | [`sse`] | Server-sent-events parsing and the stream loop |
//! | [`tools`] | Hub tool identifiers and aliases |
//! | [`transport`] | HTTP transport and the injectable fetch seam |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tokio_util::sync::CancellationToken;
//! use webrelay_core::{Client, ClientConfig, ExecutionRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::builder().from_env().build()?;
//!     let client = Client::new(config);
//!
//!     let request = ExecutionRequest::run(serde_json::json!({
//!         "input": "find the cheapest flight to Lisbon next weekend",
//!     }));
//!
//!     let cancel = CancellationToken::new();
//!     let outcome = client.run(&request, &cancel, None).await?;
//!     println!("routed via {}: {}", outcome.routing.selected_mode, outcome.result);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  CLI / Caller   │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │  Client         │────▶│ Progress Stream  │
//! │  (orchestrator) │     │ (SSE, advisory)  │
//! └────────┬────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │  Task Router    │────▶│ Device Directory │
//! └────────┬────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │  Transport      │────▶│ HttpFetch        │
//! │  (retry/backoff)│     │ (reqwest/mock)   │
//! └─────────────────┘     └──────────────────┘
//! ```
//!
//! ## Security
//!
//! - API keys are read from environment variables only (never logged)
//! - Scope checks run client-side before any request leaves the process

pub mod auth;
pub mod config;
pub mod control;
pub mod devices;
pub mod error;
pub mod execute;
pub mod payload;
pub mod retry;
pub mod routing;
pub mod sse;
pub mod tools;
pub mod transport;

// Re-export commonly used types at crate root for convenience

// Auth
pub use auth::{ensure_scope, EndpointClass, TokenScope};

// Configuration
pub use config::{ClientConfig, ClientConfigBuilder};

// Control plane
pub use control::{Capabilities, ControlPlane, GoogleAuthStatus, Profile};

// Device directory
pub use devices::{DeviceDirectory, DeviceEntry, DeviceListResult};

// Error types
pub use error::{ClientError, TransportError};

// Client orchestration
pub use execute::{Client, ProgressCallback, TaskOutcome};

// Payload resolution
pub use payload::{find_payload_ref, resolve_output, INLINE_PAYLOAD_LIMIT};

// Retry policy
pub use retry::RetryPolicy;

// Routing types
pub use routing::{
    ExecutionOutcome, ExecutionRequest, ExecutionTarget, RoutingMetadata, SelectedMode, TaskKind,
    TaskRouter,
};

// Streaming
pub use sse::{stream_events, SseParser, StreamEvent, StreamParams};

// Tool identifiers
pub use tools::{
    normalize_tool_name, TOOL_LIST_DEVICES, TOOL_RUN_CLOUD, TOOL_RUN_EXTENSION, TOOL_SCRAPE_CLOUD,
    TOOL_SCRAPE_EXTENSION,
};

// Transport
pub use transport::{
    FetchError, FetchRequest, FetchResponse, FetchStream, HttpFetch, HttpMethod, JsonResponse,
    ReqwestFetch, Transport,
};
