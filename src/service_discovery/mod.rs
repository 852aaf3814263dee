//! Service discovery module
//!
//! This module provides the registry side of name resolution:
//! - [`NamingClient`]: the contract a resolver needs (query, subscribe, unsubscribe)
//! - Nacos: HTTP client for the Nacos open API with client-side watches
//! - In-memory: a registry double that pushes snapshots synchronously

pub mod memory;
pub mod nacos;
pub mod traits;


// Re-export public types for convenience
pub use traits::{
    Instance, NamingClient, Service, ServiceDiscoveryError, ServiceDiscoveryResult, ServiceQuery,
    SubscribeCallback,
};

pub use crate::config::service_discovery::RegistryConfig;
pub use memory::InMemoryNamingClient;
pub use nacos::NacosNamingClient;
