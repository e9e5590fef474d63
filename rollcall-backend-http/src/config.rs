//! Backend connection settings.

use serde::{Deserialize, Serialize};

const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Connection settings for [`crate::HttpBackend`].
///
/// Deserializable from wherever the embedding app keeps its settings; only
/// `base_url` is required.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpBackendConfig {
    /// Base URL of the attendance API, e.g. `https://api.example.com/v1`.
    pub base_url: String,
    /// Bearer token attached to every request when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl HttpBackendConfig {
    pub fn new(base_url: &str) -> HttpBackendConfig {
        HttpBackendConfig {
            base_url: base_url.to_string(),
            auth_token: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Join a path onto the base URL, normalizing slashes.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_timeout_defaults() {
        let config: HttpBackendConfig =
            serde_json::from_value(json!({ "base_url": "https://api.example.com" })).unwrap();
        assert_eq!(config.timeout_secs, 10);
        assert!(config.auth_token.is_none());
    }

    #[test]
    fn test_endpoint_normalizes_slashes() {
        let config = HttpBackendConfig::new("https://api.example.com/v1/");
        assert_eq!(
            config.endpoint("/attendance/day"),
            "https://api.example.com/v1/attendance/day"
        );
        assert_eq!(
            config.endpoint("attendance"),
            "https://api.example.com/v1/attendance"
        );
    }
}
