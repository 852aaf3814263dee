use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::target::{self, Target, TargetError, TargetOption};

/// How a configured target tracks its service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TargetMode {
    #[default]
    Poll,
    Subscribe,
}

/// One service to resolve
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TargetConfig {
    /// Target identifier used in logs; defaults to the service name
    pub name: Option<String>,
    /// Registry address, `host:port` or an `http(s)://` URL
    pub registry: String,
    pub service: String,
    pub cluster: Option<String>,
    pub group: Option<String>,
    pub namespace: Option<String>,
    #[serde(default)]
    pub mode: TargetMode,
    /// Poll interval in milliseconds
    pub interval_ms: Option<u64>,
}

impl TargetConfig {
    pub fn new(registry: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            name: None,
            registry: registry.into(),
            service: service.into(),
            cluster: None,
            group: None,
            namespace: None,
            mode: TargetMode::default(),
            interval_ms: None,
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.service)
    }

    /// Encode this entry as a connection string
    pub fn to_target_uri(&self) -> String {
        let mut options = Vec::new();
        if let Some(namespace) = &self.namespace {
            options.push(TargetOption::NamespaceId(namespace.clone()));
        }
        match self.mode {
            TargetMode::Poll => {
                if let Some(interval_ms) = self.interval_ms {
                    options.push(TargetOption::Poll(Duration::from_millis(interval_ms)));
                }
            }
            TargetMode::Subscribe => options.push(TargetOption::Subscribe),
        }

        target::encode(
            &self.registry,
            self.cluster.as_deref().unwrap_or(""),
            self.group.as_deref().unwrap_or(""),
            &self.service,
            options,
        )
    }

    /// Encode and decode again, surfacing the validation a resolver would apply
    pub fn to_target(&self) -> Result<Target, TargetError> {
        Target::decode(&self.to_target_uri())
    }

    /// Validate target configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.registry.is_empty() {
            return Err(anyhow::anyhow!(
                "Target {} registry cannot be empty",
                self.display_name()
            ));
        }

        if self.service.is_empty() {
            return Err(anyhow::anyhow!("Target service cannot be empty"));
        }

        if self.interval_ms == Some(0) {
            return Err(anyhow::anyhow!(
                "Target {} interval_ms must be greater than 0",
                self.display_name()
            ));
        }

        self.to_target().map_err(|e| {
            anyhow::anyhow!("Target {} is invalid: {}", self.display_name(), e)
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::{Mode, Scheme};

    #[test]
    fn test_defaults_encode_to_poll_target() {
        let config = TargetConfig::new("127.0.0.1:8848", "orders");
        let target = config.to_target().unwrap();

        assert_eq!(target.scheme, Scheme::Nacos);
        assert_eq!(target.group_name, "DEFAULT_GROUP");
        assert_eq!(target.namespace_id, "public");
        assert_eq!(target.clusters, vec!["DEFAULT".to_string()]);
        assert_eq!(
            target.mode,
            Mode::Poll {
                interval: Duration::from_secs(10)
            }
        );
        assert_eq!(config.display_name(), "orders");
    }

    #[test]
    fn test_subscribe_over_tls() {
        let config: TargetConfig = toml::from_str(
            r#"
name = "orders-tls"
registry = "https://registry.internal:8848"
service = "orders"
cluster = "c1"
group = "g1"
namespace = "ns1"
mode = "subscribe"
"#,
        )
        .unwrap();

        let target = config.to_target().unwrap();
        assert_eq!(target.scheme, Scheme::Nacoss);
        assert_eq!(target.mode, Mode::Subscribe);
        assert_eq!(target.namespace_id, "ns1");
        assert_eq!(config.display_name(), "orders-tls");
    }

    #[test]
    fn test_validation() {
        let mut config = TargetConfig::new("127.0.0.1:8848", "orders");
        assert!(config.validate().is_ok());

        config.interval_ms = Some(0);
        assert!(config.validate().is_err());

        let config = TargetConfig::new("", "orders");
        assert!(config.validate().is_err());

        let config = TargetConfig::new("127.0.0.1:8848", "");
        assert!(config.validate().is_err());
    }
}
