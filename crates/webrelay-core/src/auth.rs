//! Bearer token scopes.
//!
//! Two recognized key prefixes: `wrk_` keys reach every endpoint class,
//! `wrh_` keys reach the hub only. A hub-only key used against a cloud or
//! control endpoint fails fast, before any network call. Unknown prefixes
//! classify as full scope; rejecting them is the server's job.

use crate::error::ClientError;

/// Prefix of keys granting cloud + control + hub access.
pub const FULL_SCOPE_PREFIX: &str = "wrk_";
/// Prefix of keys granting hub access only.
pub const HUB_ONLY_PREFIX: &str = "wrh_";

/// Endpoint classes a token may be checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointClass {
    Cloud,
    Control,
    Hub,
}

impl EndpointClass {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cloud => "cloud",
            Self::Control => "control",
            Self::Hub => "hub",
        }
    }
}

/// Scope derived from a token's prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenScope {
    Full,
    HubOnly,
}

impl TokenScope {
    pub fn classify(token: &str) -> Self {
        if token.starts_with(HUB_ONLY_PREFIX) {
            Self::HubOnly
        } else {
            Self::Full
        }
    }

    pub const fn allows(self, endpoint: EndpointClass) -> bool {
        match endpoint {
            EndpointClass::Hub => true,
            EndpointClass::Cloud | EndpointClass::Control => matches!(self, Self::Full),
        }
    }
}

/// Fail fast when the token's scope cannot reach the endpoint class.
pub fn ensure_scope(token: &str, endpoint: EndpointClass) -> Result<(), ClientError> {
    if TokenScope::classify(token).allows(endpoint) {
        return Ok(());
    }
    let prefix = token.get(..HUB_ONLY_PREFIX.len()).unwrap_or(token);
    Err(ClientError::AuthScope {
        prefix: prefix.to_string(),
        endpoint: endpoint.as_str(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_scope_keys_reach_everything() {
        for endpoint in [EndpointClass::Cloud, EndpointClass::Control, EndpointClass::Hub] {
            assert!(ensure_scope("wrk_abc123", endpoint).is_ok());
        }
    }

    #[test]
    fn hub_only_keys_reach_the_hub_only() {
        assert!(ensure_scope("wrh_abc123", EndpointClass::Hub).is_ok());
        assert!(matches!(
            ensure_scope("wrh_abc123", EndpointClass::Cloud),
            Err(ClientError::AuthScope { endpoint: "cloud", .. })
        ));
        assert!(matches!(
            ensure_scope("wrh_abc123", EndpointClass::Control),
            Err(ClientError::AuthScope { endpoint: "control", .. })
        ));
    }

    #[test]
    fn unknown_prefixes_classify_as_full_scope() {
        assert_eq!(TokenScope::classify("tok-legacy"), TokenScope::Full);
        assert!(ensure_scope("tok-legacy", EndpointClass::Cloud).is_ok());
    }
}
