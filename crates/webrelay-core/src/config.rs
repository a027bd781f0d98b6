//! Client configuration.
//!
//! All knobs live in one immutable [`ClientConfig`] built once and shared
//! via `Arc`; concurrent independent clients never share mutable state.
//!
//! # Environment Variables
//!
//! | Variable | Default |
//! |----------|---------|
//! | `WEBRELAY_API_KEY` | (required) |
//! | `WEBRELAY_CLOUD_BASE_URL` | `https://api.webrelay.dev` |
//! | `WEBRELAY_MCP_BASE_URL` | `https://hub.webrelay.dev/mcp` |
//! | `WEBRELAY_CONTROL_BASE_URL` | `https://api.webrelay.dev` |

use std::env;
use std::time::Duration;

use crate::error::ClientError;
use crate::retry::RetryPolicy;
use crate::routing::ExecutionTarget;
use crate::transport::DEFAULT_REQUEST_TIMEOUT;

pub const DEFAULT_CLOUD_BASE_URL: &str = "https://api.webrelay.dev";
pub const DEFAULT_MCP_BASE_URL: &str = "https://hub.webrelay.dev/mcp";
pub const DEFAULT_CONTROL_BASE_URL: &str = "https://api.webrelay.dev";
/// Startup grace window during which a not-ready event stream reconnects.
pub const DEFAULT_STREAM_GRACE: Duration = Duration::from_secs(20);
/// Fixed wait between reconnect attempts inside the grace window.
pub const DEFAULT_STREAM_RETRY_INTERVAL: Duration = Duration::from_secs(2);

/// Immutable client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub cloud_base_url: String,
    pub mcp_base_url: String,
    pub control_base_url: String,
    pub api_key: String,
    /// Channel used when a request names no target.
    pub default_target: ExecutionTarget,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
    pub stream_grace: Duration,
    pub stream_retry_interval: Duration,
}

impl ClientConfig {
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    cloud_base_url: Option<String>,
    mcp_base_url: Option<String>,
    control_base_url: Option<String>,
    api_key: Option<String>,
    default_target: Option<ExecutionTarget>,
    request_timeout: Option<Duration>,
    retry: Option<RetryPolicy>,
    stream_grace: Option<Duration>,
    stream_retry_interval: Option<Duration>,
}

impl ClientConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the API key and base URL overrides from the environment.
    pub fn from_env(mut self) -> Self {
        self.api_key = env::var("WEBRELAY_API_KEY").ok().or(self.api_key);
        self.cloud_base_url = env::var("WEBRELAY_CLOUD_BASE_URL").ok().or(self.cloud_base_url);
        self.mcp_base_url = env::var("WEBRELAY_MCP_BASE_URL").ok().or(self.mcp_base_url);
        self.control_base_url = env::var("WEBRELAY_CONTROL_BASE_URL")
            .ok()
            .or(self.control_base_url);
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_cloud_base_url(mut self, url: impl Into<String>) -> Self {
        self.cloud_base_url = Some(url.into());
        self
    }

    pub fn with_mcp_base_url(mut self, url: impl Into<String>) -> Self {
        self.mcp_base_url = Some(url.into());
        self
    }

    pub fn with_control_base_url(mut self, url: impl Into<String>) -> Self {
        self.control_base_url = Some(url.into());
        self
    }

    pub fn with_default_target(mut self, target: ExecutionTarget) -> Self {
        self.default_target = Some(target);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn with_stream_grace(mut self, grace: Duration) -> Self {
        self.stream_grace = Some(grace);
        self
    }

    pub fn with_stream_retry_interval(mut self, interval: Duration) -> Self {
        self.stream_retry_interval = Some(interval);
        self
    }

    pub fn build(self) -> Result<ClientConfig, ClientError> {
        let api_key = self
            .api_key
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ClientError::Validation(String::from("api key is required")))?;

        Ok(ClientConfig {
            cloud_base_url: normalize_base_url(
                self.cloud_base_url
                    .unwrap_or_else(|| DEFAULT_CLOUD_BASE_URL.to_string()),
            ),
            mcp_base_url: normalize_base_url(
                self.mcp_base_url
                    .unwrap_or_else(|| DEFAULT_MCP_BASE_URL.to_string()),
            ),
            control_base_url: normalize_base_url(
                self.control_base_url
                    .unwrap_or_else(|| DEFAULT_CONTROL_BASE_URL.to_string()),
            ),
            api_key,
            default_target: self.default_target.unwrap_or(ExecutionTarget::Auto),
            request_timeout: self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT),
            retry: self.retry.unwrap_or_default(),
            stream_grace: self.stream_grace.unwrap_or(DEFAULT_STREAM_GRACE),
            stream_retry_interval: self
                .stream_retry_interval
                .unwrap_or(DEFAULT_STREAM_RETRY_INTERVAL),
        })
    }
}

fn normalize_base_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
}
