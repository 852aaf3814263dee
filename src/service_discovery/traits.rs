//! Core traits and types for the registry client
//!
//! This module defines the interface a resolver needs from the naming
//! registry, along with the instance snapshot types and error handling shared
//! by every backend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::target::DEFAULT_CLUSTER_NAME;

/// Service discovery error types
#[derive(Debug, thiserror::Error)]
pub enum ServiceDiscoveryError {
    #[error("Service not found: {service_name}")]
    ServiceNotFound { service_name: String },

    #[error("Connection failed: {0}")]
    ConnectionFailed(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Service discovery backend error: {0}")]
    BackendError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Subscription failed: {0}")]
    SubscriptionFailed(String),
}

/// Result type for service discovery operations
pub type ServiceDiscoveryResult<T> = Result<T, ServiceDiscoveryError>;

/// One registered endpoint of a service, as the registry reports it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    #[serde(default)]
    pub instance_id: String,
    pub ip: String,
    pub port: u16,
    /// Registry weight; fractional and non-positive values are allowed
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default = "default_true")]
    pub healthy: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub ephemeral: bool,
    #[serde(default = "default_cluster_name")]
    pub cluster_name: String,
    #[serde(default)]
    pub service_name: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

fn default_weight() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

fn default_cluster_name() -> String {
    DEFAULT_CLUSTER_NAME.to_string()
}

impl Instance {
    /// Create a healthy, enabled instance with weight 1 in the default cluster
    pub fn new(ip: impl Into<String>, port: u16) -> Self {
        let ip = ip.into();
        Self {
            instance_id: format!("{}#{}", ip, port),
            ip,
            port,
            weight: default_weight(),
            healthy: true,
            enabled: true,
            ephemeral: true,
            cluster_name: default_cluster_name(),
            service_name: String::new(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_cluster(mut self, cluster: impl Into<String>) -> Self {
        self.cluster_name = cluster.into();
        self
    }

    pub fn with_healthy(mut self, healthy: bool) -> Self {
        self.healthy = healthy;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Weight as a balancer share: positive values truncate, everything else is 0
    pub fn balancer_weight(&self) -> u32 {
        if self.weight > 0.0 {
            // Float-to-int casts saturate at u32::MAX.
            self.weight as u32
        } else {
            0
        }
    }

    /// Whether the instance can receive traffic
    pub fn is_usable(&self, healthy_only: bool) -> bool {
        self.enabled && (!healthy_only || self.healthy) && self.port != 0 && !self.ip.is_empty()
    }

    /// Whether the instance belongs to one of `clusters`; an empty filter matches all
    pub fn in_clusters(&self, clusters: &[String]) -> bool {
        clusters.is_empty() || clusters.iter().any(|c| c == &self.cluster_name)
    }
}

/// A full membership snapshot of one service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub group_name: String,
    /// Comma separated cluster filter the snapshot was taken with
    #[serde(default)]
    pub clusters: String,
    /// Suggested refresh period in milliseconds
    #[serde(default)]
    pub cache_millis: u64,
    #[serde(default)]
    pub hosts: Vec<Instance>,
}

impl Service {
    pub fn new(name: impl Into<String>, hosts: Vec<Instance>) -> Self {
        Self {
            name: name.into(),
            hosts,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

/// Which slice of the registry a resolver is interested in
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceQuery {
    pub service_name: String,
    pub group_name: String,
    pub namespace_id: String,
    #[serde(default)]
    pub clusters: Vec<String>,
    #[serde(default = "default_true")]
    pub healthy_only: bool,
}

impl ServiceQuery {
    pub fn new(
        service_name: impl Into<String>,
        group_name: impl Into<String>,
        namespace_id: impl Into<String>,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            group_name: group_name.into(),
            namespace_id: namespace_id.into(),
            clusters: Vec::new(),
            healthy_only: true,
        }
    }

    pub fn with_clusters(mut self, clusters: Vec<String>) -> Self {
        self.clusters = clusters;
        self
    }

    pub fn with_healthy_only(mut self, healthy_only: bool) -> Self {
        self.healthy_only = healthy_only;
        self
    }

    /// Key identifying a subscription, `namespace##group@@service##clusters`
    pub fn subscription_key(&self) -> String {
        format!(
            "{}##{}@@{}##{}",
            self.namespace_id,
            self.group_name,
            self.service_name,
            self.clusters.join(",")
        )
    }
}

impl fmt::Display for ServiceQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@@{} (namespace {})",
            self.group_name, self.service_name, self.namespace_id
        )
    }
}

/// Callback invoked with a full snapshot on every membership change, or with
/// the error when a backend fails to refresh an established subscription
pub type SubscribeCallback = Arc<dyn Fn(ServiceDiscoveryResult<Service>) + Send + Sync>;

/// Registry client interface consumed by resolvers
///
/// Implementations must be cheap to share: resolvers hold them behind an
/// `Arc` and call them from their background task.
#[async_trait]
pub trait NamingClient: Send + Sync {
    /// Fetch the current instances matching `query`
    async fn query(&self, query: &ServiceQuery) -> ServiceDiscoveryResult<Service>;

    /// Register `callback` for membership changes of `query`.
    ///
    /// The callback receives full snapshots, including one for the current
    /// membership shortly after a successful subscribe. Backends that refresh
    /// in the background pass refresh failures through the same callback.
    /// It must not block.
    async fn subscribe(
        &self,
        query: &ServiceQuery,
        callback: SubscribeCallback,
    ) -> ServiceDiscoveryResult<()>;

    /// Stop delivering changes for `query`
    async fn unsubscribe(&self, query: &ServiceQuery) -> ServiceDiscoveryResult<()>;

    /// Backend name for logging
    fn backend(&self) -> &'static str {
        "unknown"
    }
}
