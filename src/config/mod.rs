//! # 配置管理模块
//!
//! 本模块提供了命名解析客户端的配置管理功能，包括：
//!
//! - TOML配置文件解析和验证
//! - 环境变量替换和扩展
//! - 类型安全的配置结构定义
//!
//! ## 配置结构
//!
//! - `registry`: 注册中心HTTP客户端配置（超时、监听间隔、上下文路径）
//! - `resolver`: 解析器行为配置（仅健康实例、重新订阅退避）
//! - `targets`: 需要解析的服务列表
//!
//! ## 使用示例
//!
//! ```rust,no_run
//! use nacos_naming::config::NamingConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = NamingConfig::from_file_with_env("naming.toml").await?;
//! for target in &config.targets {
//!     println!("{} -> {}", target.display_name(), target.to_target_uri());
//! }
//! # Ok(())
//! # }
//! ```

pub mod resolver; // 解析器配置模块
pub mod service_discovery; // 注册中心客户端配置模块
pub mod targets; // 目标服务配置模块

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::path::Path;
use tracing::{info, warn};

// Re-export all public types
pub use resolver::ResolverConfig;
pub use service_discovery::RegistryConfig;
pub use targets::{TargetConfig, TargetMode};

/// 命名解析客户端主配置结构
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct NamingConfig {
    /// 注册中心HTTP客户端配置
    #[serde(default)]
    pub registry: RegistryConfig,
    /// 解析器行为配置
    #[serde(default)]
    pub resolver: ResolverConfig,
    /// 需要解析的服务
    #[serde(default)]
    pub targets: Vec<TargetConfig>,
}

impl NamingConfig {
    /// Load configuration from file with environment variable expansion
    pub async fn from_file_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = tokio::fs::read_to_string(path.as_ref()).await?;
        let config = Self::from_toml_str(&content)?;

        info!("Configuration loaded from {:?}", path.as_ref());
        Ok(config)
    }

    /// Parse configuration text, expanding environment variables first
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let expanded_content = expand_env_vars(content);
        let config: NamingConfig = toml::from_str(&expanded_content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        self.registry.validate()?;
        self.resolver.validate()?;

        if self.targets.is_empty() {
            warn!("No targets configured");
        }

        let mut seen = HashSet::new();
        for target in &self.targets {
            target.validate()?;
            if !seen.insert(target.display_name()) {
                return Err(anyhow::anyhow!(
                    "Duplicate target name: {}",
                    target.display_name()
                ));
            }
        }

        Ok(())
    }

    /// Look up a target by name
    pub fn target(&self, name: &str) -> Option<&TargetConfig> {
        self.targets.iter().find(|t| t.display_name() == name)
    }
}

/// Expand environment variables in configuration content
/// Supports ${VAR} and ${VAR:-default} syntax
fn expand_env_vars(content: &str) -> String {
    let mut result = content.to_string();
    let mut search_from = 0;

    while let Some(offset) = result[search_from..].find("${") {
        let start = search_from + offset;
        let Some(end) = result[start..].find('}') else {
            break; // Malformed ${VAR expression
        };

        let var_expr = &result[start + 2..start + end];
        let replacement = match var_expr.split_once(":-") {
            Some((var_name, default_value)) => {
                env::var(var_name).unwrap_or_else(|_| default_value.to_string())
            }
            None => env::var(var_expr).unwrap_or_else(|_| {
                warn!(
                    "Environment variable '{}' not found, using empty string",
                    var_expr
                );
                String::new()
            }),
        };

        result.replace_range(start..start + end + 1, &replacement);
        // Expanded values are not scanned again.
        search_from = start + replacement.len();
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    /// Helper function to create a temporary config file
    fn create_temp_config_file(content: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();
        temp_file.flush().unwrap();
        temp_file
    }

    #[tokio::test]
    async fn test_basic_config_loading() {
        let config_content = r#"
[registry]
request_timeout_ms = 2000
watch_interval_ms = 500
access_token = "secret"

[resolver]
healthy_only = false
resubscribe_backoff_ms = 1000

[[targets]]
registry = "127.0.0.1:8848"
service = "orders"
interval_ms = 5000

[[targets]]
name = "payments-push"
registry = "https://registry.internal:8848"
service = "payments"
group = "billing"
mode = "subscribe"
"#;

        let temp_file = create_temp_config_file(config_content);
        let config = NamingConfig::from_file_with_env(temp_file.path())
            .await
            .unwrap();

        assert_eq!(config.registry.request_timeout(), Duration::from_secs(2));
        assert_eq!(config.registry.watch_interval(), Duration::from_millis(500));
        assert_eq!(config.registry.access_token.as_deref(), Some("secret"));
        assert!(!config.resolver.healthy_only);
        assert_eq!(
            config.resolver.resubscribe_backoff(),
            Some(Duration::from_secs(1))
        );
        assert_eq!(config.targets.len(), 2);
        assert_eq!(config.targets[1].mode, TargetMode::Subscribe);
        assert!(config.target("payments-push").is_some());
        assert!(config.target("orders").is_some());
    }

    #[tokio::test]
    async fn test_env_var_expansion() {
        env::set_var("NAMING_TEST_REGISTRY", "10.1.2.3:8848");

        let config_content = r#"
[[targets]]
registry = "${NAMING_TEST_REGISTRY:-localhost:8848}"
service = "${NAMING_TEST_SERVICE:-orders}"
"#;

        let temp_file = create_temp_config_file(config_content);
        let config = NamingConfig::from_file_with_env(temp_file.path())
            .await
            .unwrap();

        assert_eq!(config.targets[0].registry, "10.1.2.3:8848");
        assert_eq!(config.targets[0].service, "orders");

        // Clean up
        env::remove_var("NAMING_TEST_REGISTRY");
    }

    #[tokio::test]
    async fn test_config_defaults() {
        let temp_file = create_temp_config_file("");
        let config = NamingConfig::from_file_with_env(temp_file.path())
            .await
            .unwrap();

        assert_eq!(config, NamingConfig::default());
        assert_eq!(config.registry.context_path, "/nacos");
        assert!(config.resolver.healthy_only);
    }

    #[test]
    fn test_expand_env_vars() {
        env::set_var("NAMING_TEST_VAR", "test_value");

        let content = "host = \"${NAMING_TEST_VAR}\"";
        let result = expand_env_vars(content);
        assert_eq!(result, "host = \"test_value\"");

        let content_with_default = "host = \"${NAMING_MISSING_VAR:-default_value}\"";
        let result = expand_env_vars(content_with_default);
        assert_eq!(result, "host = \"default_value\"");

        let missing = "host = \"${NAMING_MISSING_VAR}\"";
        assert_eq!(expand_env_vars(missing), "host = \"\"");

        let malformed = "host = \"${NAMING_TEST_VAR\"";
        assert_eq!(expand_env_vars(malformed), malformed);

        // Clean up
        env::remove_var("NAMING_TEST_VAR");
    }

    #[test]
    fn test_expanded_values_are_not_rescanned() {
        env::set_var("NAMING_TEST_NESTED", "${NAMING_TEST_NESTED}");
        let result = expand_env_vars("value = \"${NAMING_TEST_NESTED}\"");
        assert_eq!(result, "value = \"${NAMING_TEST_NESTED}\"");
        env::remove_var("NAMING_TEST_NESTED");
    }

    #[test]
    fn test_config_validation() {
        let invalid_registry = r#"
[registry]
watch_interval_ms = 0
"#;
        assert!(NamingConfig::from_toml_str(invalid_registry).is_err());

        let duplicate_targets = r#"
[[targets]]
registry = "127.0.0.1:8848"
service = "orders"

[[targets]]
registry = "127.0.0.1:8849"
service = "orders"
"#;
        let err = NamingConfig::from_toml_str(duplicate_targets).unwrap_err();
        assert!(err.to_string().contains("Duplicate target name"));

        let bad_interval = r#"
[[targets]]
registry = "127.0.0.1:8848"
service = "orders"
interval_ms = 0
"#;
        assert!(NamingConfig::from_toml_str(bad_interval).is_err());
    }
}
