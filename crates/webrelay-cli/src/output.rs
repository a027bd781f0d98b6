//! Terminal rendering of command results.
//!
//! Output is a single JSON document on stdout; warnings go to stderr so
//! piped consumers see clean JSON.

use serde_json::{json, Value};

use webrelay_core::RoutingMetadata;

use crate::commands::CommandResult;
use crate::error::CliError;

pub fn render(result: &CommandResult, pretty: bool) -> Result<(), CliError> {
    for warning in &result.warnings {
        eprintln!("warning: {warning}");
    }

    let document = match &result.routing {
        Some(routing) => json!({ "result": result.data, "routing": routing }),
        None => result.data.clone(),
    };

    let rendered = if pretty {
        serde_json::to_string_pretty(&document)?
    } else {
        serde_json::to_string(&document)?
    };
    println!("{rendered}");
    Ok(())
}

/// Routing metadata in the wire shape callers script against.
pub fn routing_to_value(routing: &RoutingMetadata, trajectory_id: &str, phase: u32) -> Value {
    json!({
        "selectedMode": routing.selected_mode.as_str(),
        "requestedMode": routing.requested_mode.as_str(),
        "fallbackApplied": routing.fallback_applied,
        "fallbackReason": routing.fallback_reason,
        "deviceId": routing.device_id,
        "requestId": routing.request_id,
        "attempt": routing.attempt,
        "trajectoryId": trajectory_id,
        "phase": phase,
    })
}
