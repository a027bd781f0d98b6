//! Control-plane reads: account profile, capability flags, Google auth
//! status.
//!
//! All three are plain authenticated GETs against the control base URL.
//! Responses are normalized into thin typed views that keep the raw payload
//! attached, so callers can reach fields the views do not model.

use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::auth::{ensure_scope, EndpointClass};
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::transport::{HttpMethod, Transport};

/// Account profile view.
#[derive(Debug, Clone)]
pub struct Profile {
    pub email: Option<String>,
    pub plan: Option<String>,
    pub organization: Option<String>,
    pub raw: Value,
}

/// Capability flags for the authenticated key.
#[derive(Debug, Clone)]
pub struct Capabilities {
    pub cloud_enabled: bool,
    pub extension_enabled: bool,
    pub raw: Value,
}

/// Google account link status.
#[derive(Debug, Clone)]
pub struct GoogleAuthStatus {
    pub connected: bool,
    pub email: Option<String>,
    pub raw: Value,
}

/// Read-only control-plane client.
pub struct ControlPlane {
    transport: Arc<Transport>,
    config: Arc<ClientConfig>,
}

impl ControlPlane {
    pub fn new(transport: Arc<Transport>, config: Arc<ClientConfig>) -> Self {
        Self { transport, config }
    }

    pub async fn profile(&self, cancel: &CancellationToken) -> Result<Profile, ClientError> {
        let payload = self.get("/cli/profile", cancel).await?;
        Ok(Profile {
            email: string_field(&payload, "email"),
            plan: string_field(&payload, "plan"),
            organization: string_field(&payload, "organization"),
            raw: payload,
        })
    }

    pub async fn capabilities(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Capabilities, ClientError> {
        let payload = self.get("/cli/capabilities", cancel).await?;
        Ok(Capabilities {
            cloud_enabled: bool_field(&payload, "cloudEnabled"),
            extension_enabled: bool_field(&payload, "extensionEnabled"),
            raw: payload,
        })
    }

    pub async fn google_auth_status(
        &self,
        cancel: &CancellationToken,
    ) -> Result<GoogleAuthStatus, ClientError> {
        let payload = self.get("/cli/google-auth/status", cancel).await?;
        Ok(GoogleAuthStatus {
            connected: bool_field(&payload, "connected"),
            email: string_field(&payload, "email"),
            raw: payload,
        })
    }

    async fn get(&self, path: &str, cancel: &CancellationToken) -> Result<Value, ClientError> {
        ensure_scope(self.transport.api_key(), EndpointClass::Control)?;
        let url = format!("{}{path}", self.config.control_base_url);
        let response = self
            .transport
            .request_json(&url, HttpMethod::Get, None, &[], cancel)
            .await?;
        Ok(response.payload)
    }
}

fn string_field(payload: &Value, key: &str) -> Option<String> {
    payload.get(key).and_then(Value::as_str).map(str::to_string)
}

fn bool_field(payload: &Value, key: &str) -> bool {
    payload.get(key).and_then(Value::as_bool).unwrap_or(false)
}
