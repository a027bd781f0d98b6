//! Out-of-line result payloads.
//!
//! Results larger than the inline limit come back as a reference instead of
//! inline data. [`resolve_output`] follows the reference (an `http(s)` URL
//! or a local file path) and returns the materialized value.

use serde_json::Value;

use crate::error::ClientError;
use crate::transport::{FetchRequest, HttpFetch};

/// Results above this size arrive as a reference, not inline.
pub const INLINE_PAYLOAD_LIMIT: usize = 1_048_576;

const REF_KEYS: [&str; 3] = ["outputRef", "resultRef", "responseRef"];

/// The first reference key present on a result object, with its target.
pub fn find_payload_ref(result: &Value) -> Option<(&'static str, &str)> {
    for key in REF_KEYS {
        if let Some(target) = result.get(key).and_then(Value::as_str) {
            if !target.is_empty() {
                return Some((key, target));
            }
        }
    }
    None
}

/// Materialize a result: follow its payload reference when one is present,
/// otherwise return the result unchanged.
///
/// Fetched content is parsed as JSON when possible, else returned as a
/// string.
pub async fn resolve_output(fetch: &dyn HttpFetch, result: &Value) -> Result<Value, ClientError> {
    let Some((key, target)) = find_payload_ref(result) else {
        return Ok(result.clone());
    };

    let raw = if target.starts_with("http://") || target.starts_with("https://") {
        let response = fetch
            .execute(FetchRequest::get(target))
            .await
            .map_err(|error| {
                ClientError::Validation(format!("failed to fetch {key} '{target}': {error}"))
            })?;
        if !response.is_success() {
            return Err(ClientError::Validation(format!(
                "fetching {key} '{target}' returned HTTP {}",
                response.status
            )));
        }
        response.body
    } else {
        tokio::fs::read_to_string(target).await.map_err(|error| {
            ClientError::Validation(format!("failed to read {key} '{target}': {error}"))
        })?
    };

    Ok(serde_json::from_str::<Value>(&raw).unwrap_or(Value::String(raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ref_keys_are_checked_in_order() {
        let result = json!({ "resultRef": "/tmp/b.json", "outputRef": "/tmp/a.json" });
        assert_eq!(find_payload_ref(&result), Some(("outputRef", "/tmp/a.json")));

        let result = json!({ "responseRef": "/tmp/c.json" });
        assert_eq!(find_payload_ref(&result), Some(("responseRef", "/tmp/c.json")));
    }

    #[test]
    fn empty_or_missing_refs_are_ignored() {
        assert_eq!(find_payload_ref(&json!({ "outputRef": "" })), None);
        assert_eq!(find_payload_ref(&json!({ "output": "inline" })), None);
        assert_eq!(find_payload_ref(&json!(null)), None);
    }

    #[tokio::test]
    async fn local_file_refs_are_read_and_parsed() {
        use std::io::Write;

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.json");
        let mut file = std::fs::File::create(&path).expect("create");
        write!(file, "{{\"pages\": 3}}").expect("write");

        let fetch = crate::transport::ReqwestFetch::new();
        let result = json!({ "outputRef": path.to_str().unwrap() });
        let resolved = resolve_output(&fetch, &result).await.expect("resolved");
        assert_eq!(resolved, json!({ "pages": 3 }));
    }

    #[tokio::test]
    async fn results_without_refs_pass_through() {
        let fetch = crate::transport::ReqwestFetch::new();
        let result = json!({ "output": "done" });
        let resolved = resolve_output(&fetch, &result).await.expect("resolved");
        assert_eq!(resolved, result);
    }
}
