//! Registry client configuration

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Nacos HTTP registry client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Connection timeout in milliseconds
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Request timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// How often a client-side watch re-queries the registry, in milliseconds
    #[serde(default = "default_watch_interval_ms")]
    pub watch_interval_ms: u64,
    /// API prefix appended when the target carries no path
    #[serde(default = "default_context_path")]
    pub context_path: String,
    /// Access token sent as `accessToken` when set
    pub access_token: Option<String>,
}

fn default_connect_timeout_ms() -> u64 {
    3_000
}

fn default_request_timeout_ms() -> u64 {
    5_000
}

fn default_watch_interval_ms() -> u64 {
    1_000
}

fn default_context_path() -> String {
    "/nacos".to_string()
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            watch_interval_ms: default_watch_interval_ms(),
            context_path: default_context_path(),
            access_token: None,
        }
    }
}

impl RegistryConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn watch_interval(&self) -> Duration {
        Duration::from_millis(self.watch_interval_ms)
    }

    /// Validate registry client configuration
    pub fn validate(&self) -> Result<()> {
        if self.connect_timeout_ms == 0 || self.request_timeout_ms == 0 {
            return Err(anyhow::anyhow!("Registry timeouts must be greater than 0"));
        }
        if self.watch_interval_ms == 0 {
            return Err(anyhow::anyhow!(
                "Registry watch interval must be greater than 0"
            ));
        }
        if !self.context_path.is_empty() && !self.context_path.starts_with('/') {
            return Err(anyhow::anyhow!(
                "Registry context path must start with '/': {}",
                self.context_path
            ));
        }
        Ok(())
    }
}
