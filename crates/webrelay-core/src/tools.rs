//! Hub tool identifiers and the convenience-alias normalizer.
//!
//! Unrecognized names pass through unchanged; validating tool names is the
//! server's responsibility.

/// Extension-channel task execution.
pub const TOOL_RUN_EXTENSION: &str = "extension_run_task";
/// Cloud-side variant the server may resolve a run call to.
pub const TOOL_RUN_CLOUD: &str = "cloud_run_task";
/// Extension-channel scrape.
pub const TOOL_SCRAPE_EXTENSION: &str = "extension_scrape_urls";
/// Cloud-side variant the server may resolve a scrape call to.
pub const TOOL_SCRAPE_CLOUD: &str = "cloud_scrape_urls";
/// Directory query for reachable extension devices.
pub const TOOL_LIST_DEVICES: &str = "list_browser_devices";

/// Map a convenience alias to its canonical tool id.
pub fn normalize_tool_name(name: &str) -> &str {
    match name {
        "run" | "task" | "agent" => TOOL_RUN_EXTENSION,
        "scrape" => TOOL_SCRAPE_EXTENSION,
        "devices" | "list-devices" | "list_devices" => TOOL_LIST_DEVICES,
        other => other,
    }
}

/// Whether a tool id names a cloud-side variant of an extension tool.
pub fn is_cloud_tool(tool: &str) -> bool {
    tool == TOOL_RUN_CLOUD || tool == TOOL_SCRAPE_CLOUD
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_map_to_canonical_ids() {
        assert_eq!(normalize_tool_name("run"), TOOL_RUN_EXTENSION);
        assert_eq!(normalize_tool_name("agent"), TOOL_RUN_EXTENSION);
        assert_eq!(normalize_tool_name("scrape"), TOOL_SCRAPE_EXTENSION);
        assert_eq!(normalize_tool_name("devices"), TOOL_LIST_DEVICES);
        assert_eq!(normalize_tool_name("list-devices"), TOOL_LIST_DEVICES);
    }

    #[test]
    fn unknown_names_pass_through() {
        assert_eq!(normalize_tool_name("custom_tool"), "custom_tool");
        assert_eq!(normalize_tool_name(TOOL_RUN_EXTENSION), TOOL_RUN_EXTENSION);
    }

    #[test]
    fn cloud_variants_are_recognized() {
        assert!(is_cloud_tool(TOOL_RUN_CLOUD));
        assert!(is_cloud_tool(TOOL_SCRAPE_CLOUD));
        assert!(!is_cloud_tool(TOOL_RUN_EXTENSION));
        assert!(!is_cloud_tool("anything_else"));
    }
}
