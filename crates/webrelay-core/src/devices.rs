//! Device directory: which extension endpoints are currently reachable.
//!
//! The hub's answer is normalized defensively: missing or malformed fields
//! default to `false`/`0`/empty, malformed entries are dropped, and no shape
//! mismatch ever raises.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::TransportError;
use crate::tools::TOOL_LIST_DEVICES;
use crate::transport::{HttpMethod, Transport};

/// One reachable extension endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceEntry {
    pub device_id: String,
    pub name: Option<String>,
    /// Opaque pass-through timestamp as reported by the hub.
    pub last_seen: Option<String>,
    pub has_capability_token: bool,
}

/// Normalized device-list answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceListResult {
    pub online: bool,
    pub device_count: u64,
    pub devices: Vec<DeviceEntry>,
}

impl DeviceListResult {
    pub fn offline() -> Self {
        Self {
            online: false,
            device_count: 0,
            devices: Vec::new(),
        }
    }

    /// True when at least one device can take an extension call.
    pub fn any_online(&self) -> bool {
        self.online && !self.devices.is_empty()
    }

    /// Field-by-field defensive parse of the hub's `data` payload.
    pub fn parse(data: &Value) -> Self {
        let online = data.get("online").and_then(Value::as_bool).unwrap_or(false);
        let devices = data
            .get("devices")
            .and_then(Value::as_array)
            .map(|entries| entries.iter().filter_map(parse_entry).collect::<Vec<_>>())
            .unwrap_or_default();
        let device_count = data
            .get("deviceCount")
            .and_then(Value::as_u64)
            .unwrap_or(devices.len() as u64);

        Self {
            online,
            device_count,
            devices,
        }
    }
}

fn parse_entry(entry: &Value) -> Option<DeviceEntry> {
    let device_id = entry.get("deviceId").and_then(Value::as_str)?;
    if device_id.is_empty() {
        return None;
    }
    Some(DeviceEntry {
        device_id: device_id.to_string(),
        name: entry.get("name").and_then(Value::as_str).map(str::to_string),
        last_seen: entry
            .get("lastSeen")
            .and_then(Value::as_str)
            .map(str::to_string),
        has_capability_token: entry
            .get("hasCapabilityToken")
            .and_then(Value::as_bool)
            .unwrap_or(false),
    })
}

/// Client for the hub's device directory.
pub struct DeviceDirectory {
    transport: Arc<Transport>,
    mcp_base_url: String,
}

impl DeviceDirectory {
    pub fn new(transport: Arc<Transport>, mcp_base_url: impl Into<String>) -> Self {
        Self {
            transport,
            mcp_base_url: mcp_base_url.into(),
        }
    }

    /// Query the directory through the canonical list-devices tool call.
    pub async fn list_devices(
        &self,
        cancel: &CancellationToken,
    ) -> Result<DeviceListResult, TransportError> {
        let body = json!({ "tool": TOOL_LIST_DEVICES, "params": {} });
        let response = self
            .transport
            .request_json(&self.mcp_base_url, HttpMethod::Post, Some(&body), &[], cancel)
            .await?;

        let success = response
            .payload
            .get("success")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if !success {
            debug!("device directory reported no success envelope, treating as offline");
            return Ok(DeviceListResult::offline());
        }

        let data = response.payload.get("data").unwrap_or(&Value::Null);
        Ok(DeviceListResult::parse(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_well_formed_payload() {
        let data = json!({
            "online": true,
            "deviceCount": 2,
            "devices": [
                { "deviceId": "d-1", "name": "work laptop", "lastSeen": "2026-08-25T10:00:00Z", "hasCapabilityToken": true },
                { "deviceId": "d-2" }
            ]
        });

        let result = DeviceListResult::parse(&data);
        assert!(result.online);
        assert_eq!(result.device_count, 2);
        assert_eq!(result.devices.len(), 2);
        assert_eq!(result.devices[0].name.as_deref(), Some("work laptop"));
        assert!(result.devices[0].has_capability_token);
        assert!(!result.devices[1].has_capability_token);
    }

    #[test]
    fn malformed_entries_are_dropped_not_thrown() {
        let data = json!({
            "online": true,
            "devices": [
                { "deviceId": "d-1" },
                { "name": "missing id" },
                { "deviceId": 42 },
                { "deviceId": "" },
                "not an object"
            ]
        });

        let result = DeviceListResult::parse(&data);
        assert_eq!(result.devices.len(), 1);
        assert_eq!(result.devices[0].device_id, "d-1");
        // deviceCount falls back to the surviving entry count.
        assert_eq!(result.device_count, 1);
    }

    #[test]
    fn missing_fields_default_safely() {
        let result = DeviceListResult::parse(&json!({}));
        assert!(!result.online);
        assert_eq!(result.device_count, 0);
        assert!(result.devices.is_empty());

        let result = DeviceListResult::parse(&Value::Null);
        assert!(!result.any_online());
    }

    #[test]
    fn online_flag_with_no_devices_is_not_usable() {
        let result = DeviceListResult::parse(&json!({ "online": true, "devices": [] }));
        assert!(!result.any_online());
    }
}
