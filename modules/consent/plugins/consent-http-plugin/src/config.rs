//! Transport configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the reqwest transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransportConfig {
    /// Timeout for requests that carry no timeout of their own, in milliseconds.
    pub default_timeout_ms: u64,
    pub pool_max_idle_per_host: usize,
    pub user_agent: String,
    /// Larger response bodies are rejected.
    pub max_response_size_bytes: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: 30_000,
            pool_max_idle_per_host: 4,
            user_agent: concat!("consent-http-plugin/", env!("CARGO_PKG_VERSION")).to_owned(),
            max_response_size_bytes: 4 * 1024 * 1024,
        }
    }
}
