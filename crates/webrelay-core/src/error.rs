//! Error taxonomy for the webrelay client.
//!
//! Two layers: [`TransportError`] is the uniform wire-level failure (network
//! errors carry no status, HTTP errors do), and [`ClientError`] is the
//! caller-facing taxonomy built on top of it.
//!
//! | Variant | Retried | Notes |
//! |---------|---------|-------|
//! | `Validation` | never | missing required request fields, fails fast |
//! | `AuthScope` | never | wrong token prefix, no network call is made |
//! | `Transport` (no status) | per policy | network-level failure |
//! | `Transport` (status) | per policy | only when status is in the retriable set |
//! | `NoDevice` | never | special-cased only inside soft-auto fallback |
//! | `LocalSessionNotHonored` | never | hard local-session requirement violated |
//! | `Stream` | never | always downgraded to a warning by orchestration |

use serde_json::Value;

/// Uniform transport failure carrying optional HTTP status, request id,
/// machine code, and the raw error payload for machine consumers.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
    /// HTTP status when the server answered; `None` for network-level failures.
    pub status: Option<u16>,
    /// Request id surfaced from the `x-request-id` response header.
    pub request_id: Option<String>,
    pub code: Option<String>,
    /// Raw error payload, preserved verbatim.
    pub details: Option<Value>,
    #[source]
    pub cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl TransportError {
    /// Network-level failure with no HTTP status.
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
            request_id: None,
            code: None,
            details: None,
            cause: None,
        }
    }

    pub fn network_with_cause(
        message: impl Into<String>,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            cause: Some(Box::new(cause)),
            ..Self::network(message)
        }
    }

    /// HTTP-level failure for a non-2xx response.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            ..Self::network(message)
        }
    }

    pub fn with_request_id(mut self, request_id: Option<String>) -> Self {
        self.request_id = request_id;
        self
    }

    pub fn with_code(mut self, code: Option<String>) -> Self {
        self.code = code;
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// True when the failure never reached the server.
    pub const fn is_network(&self) -> bool {
        self.status.is_none()
    }
}

/// Caller-facing error taxonomy.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Missing or malformed required request fields. Never retried.
    #[error("invalid request: {0}")]
    Validation(String),

    /// Token prefix does not grant access to this endpoint class.
    /// Raised before any network call.
    #[error("token prefix '{prefix}' is not authorized for {endpoint} endpoints")]
    AuthScope {
        prefix: String,
        endpoint: &'static str,
    },

    /// Wire-level failure; retry/backoff already exhausted inside Transport.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// No online extension device for a call that requires one.
    #[error("no online extension device: {0}")]
    NoDevice(String),

    /// A hard local-session requirement was aliased to the cloud tool.
    #[error("local session required but the server resolved the call to '{0}'")]
    LocalSessionNotHonored(String),

    /// Progress stream failure; orchestration reports this as a warning,
    /// never as the call outcome.
    #[error("event stream failed: {0}")]
    Stream(String),
}

impl ClientError {
    /// Whether this error reports the extension device being unavailable.
    ///
    /// Matched on the message because the hub does not emit a structured
    /// code for this condition.
    pub fn is_device_unavailable(&self) -> bool {
        match self {
            Self::NoDevice(_) => true,
            Self::Transport(error) => is_device_unavailable_message(&error.message),
            _ => false,
        }
    }
}

/// Heuristic match for the hub's known "device unavailable" message shapes:
/// "no online … device", "device … not online", "device … not found".
pub fn is_device_unavailable_message(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    if message.contains("no online") && message.contains("device") {
        return true;
    }
    message.contains("device") && (message.contains("not online") || message.contains("not found"))
}
