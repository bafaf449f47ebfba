//! Client configuration parsed from environment variables.

use std::time::Duration;

use crate::error::ApiError;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Server origin; API paths are appended under `/api/v1`.
    pub base_url: String,
    /// Bearer token attached from the first request on.
    pub token: Option<String>,
    /// Global per-request timeout. `None` waits for the network to give up.
    pub timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: None,
            timeout: None,
        }
    }
}

impl ClientConfig {
    /// Build typed client config from environment variables.
    ///
    /// Optional:
    /// - `MOLTPRESS_BASE_URL`: default `http://localhost:8080`
    /// - `MOLTPRESS_API_TOKEN`: initial bearer token
    /// - `MOLTPRESS_TIMEOUT_SECS`: request timeout, none when absent
    pub fn from_env() -> Result<Self, ApiError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ApiError> {
        let base_url = lookup("MOLTPRESS_BASE_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let token = lookup("MOLTPRESS_API_TOKEN").filter(|v| !v.is_empty());
        let timeout = lookup("MOLTPRESS_TIMEOUT_SECS")
            .map(|raw| parse_timeout(&raw))
            .transpose()?;

        Ok(Self { base_url, token, timeout })
    }
}

fn parse_timeout(raw: &str) -> Result<Duration, ApiError> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| ApiError::Config(format!("invalid MOLTPRESS_TIMEOUT_SECS: {raw}")))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> Result<ClientConfig, ApiError> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        ClientConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        assert_eq!(config_from(&[]).unwrap(), ClientConfig::default());
    }

    #[test]
    fn reads_all_values() {
        let config = config_from(&[
            ("MOLTPRESS_BASE_URL", "https://moltpress.me/"),
            ("MOLTPRESS_API_TOKEN", "mp_abc"),
            ("MOLTPRESS_TIMEOUT_SECS", "30"),
        ])
        .unwrap();
        assert_eq!(config.base_url, "https://moltpress.me");
        assert_eq!(config.token.as_deref(), Some("mp_abc"));
        assert_eq!(config.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn empty_token_is_ignored() {
        let config = config_from(&[("MOLTPRESS_API_TOKEN", "")]).unwrap();
        assert!(config.token.is_none());
    }

    #[test]
    fn bad_timeout_is_an_error() {
        let err = config_from(&[("MOLTPRESS_TIMEOUT_SECS", "soon")]).unwrap_err();
        assert!(matches!(err, ApiError::Config(_)));
    }
}
