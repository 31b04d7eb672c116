//! Client configuration for the HTTP control plane.

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_ADDRESS: &str = "http://127.0.0.1:4646";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the HTTP API, e.g. `http://127.0.0.1:4646`.
    pub address: String,
    pub region: Option<String>,
    /// ACL token sent as `X-Nomad-Token`.
    #[serde(skip_serializing)]
    pub token: Option<String>,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self { address: DEFAULT_ADDRESS.to_string(), region: None, token: None, timeout: DEFAULT_TIMEOUT }
    }
}

impl ClientConfig {
    /// Defaults overlaid with `NOMAD_ADDR`, `NOMAD_REGION` and `NOMAD_TOKEN`.
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |k: &str| lookup(k).filter(|v| !v.trim().is_empty());
        let mut cfg = Self::default();
        if let Some(addr) = non_empty("NOMAD_ADDR") {
            cfg.address = addr;
        }
        cfg.region = non_empty("NOMAD_REGION");
        cfg.token = non_empty("NOMAD_TOKEN");
        cfg
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub(crate) fn base_url(&self) -> &str {
        self.address.trim_end_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn env_overrides_defaults() {
        let env = HashMap::from([("NOMAD_ADDR", "https://nomad.example:4646/"), ("NOMAD_TOKEN", "s3cr3t"), ("NOMAD_REGION", "  ")]);
        let cfg = ClientConfig::from_lookup(|k| env.get(k).map(|s| s.to_string()));
        assert_eq!(cfg.address, "https://nomad.example:4646/");
        assert_eq!(cfg.base_url(), "https://nomad.example:4646");
        assert_eq!(cfg.token.as_deref(), Some("s3cr3t"));
        assert_eq!(cfg.region, None);
        assert_eq!(cfg.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn empty_env_keeps_defaults() {
        let cfg = ClientConfig::from_lookup(|_| None);
        assert_eq!(cfg, ClientConfig::default());
        assert_eq!(cfg.base_url(), DEFAULT_ADDRESS);
    }

    #[test]
    fn token_is_not_serialized() {
        let cfg = ClientConfig::default().with_token("s3cr3t");
        let v = serde_json::to_value(&cfg).expect("json");
        assert!(v.get("token").is_none());
    }
}
