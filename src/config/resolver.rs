use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Resolver behaviour shared by every target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Only hand out instances the registry reports healthy
    #[serde(default = "default_healthy_only")]
    pub healthy_only: bool,
    /// Delay between re-subscription attempts in milliseconds.
    /// Unset means a failed subscription is reported once and not retried.
    #[serde(default)]
    pub resubscribe_backoff_ms: Option<u64>,
}

fn default_healthy_only() -> bool {
    true
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            healthy_only: default_healthy_only(),
            resubscribe_backoff_ms: None,
        }
    }
}

impl ResolverConfig {
    pub fn resubscribe_backoff(&self) -> Option<Duration> {
        self.resubscribe_backoff_ms.map(Duration::from_millis)
    }

    pub fn with_resubscribe_backoff(mut self, backoff: Duration) -> Self {
        self.resubscribe_backoff_ms = Some(u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX));
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.resubscribe_backoff_ms == Some(0) {
            return Err(anyhow::anyhow!(
                "Resolver resubscribe backoff must be greater than 0"
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolver_config_default() {
        let config = ResolverConfig::default();
        assert!(config.healthy_only);
        assert_eq!(config.resubscribe_backoff(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_resubscribe_backoff() {
        let config = ResolverConfig::default().with_resubscribe_backoff(Duration::from_millis(250));
        assert_eq!(config.resubscribe_backoff(), Some(Duration::from_millis(250)));

        let config = ResolverConfig {
            resubscribe_backoff_ms: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_huge_backoff_saturates() {
        let config = ResolverConfig::default().with_resubscribe_backoff(Duration::MAX);
        assert_eq!(config.resubscribe_backoff_ms, Some(u64::MAX));
        assert!(config.validate().is_ok());
    }
}
