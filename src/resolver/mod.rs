//! # Resolver module
//!
//! Name resolution for the RPC framework: a target string goes in, a stream
//! of weighted address sets comes out through the [`ClientConn`] the
//! framework hands to [`ResolverBuilder::build`].
//!
//! - [`nacos`]: the registry-backed resolver (poll or subscribe)
//! - [`builder`]: scheme-keyed builders for `nacos` and `nacoss` targets

pub mod builder;
pub mod nacos;

use thiserror::Error;

use crate::address::Address;
use crate::service_discovery::ServiceDiscoveryError;
use crate::target::TargetError;

pub use builder::{NacosResolverBuilder, NamingClientFactory};
pub use nacos::NacosResolver;

/// Errors a resolver reports upward
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("invalid target: {0}")]
    Target(#[from] TargetError),

    #[error("registry error: {0}")]
    Registry(#[from] ServiceDiscoveryError),

    #[error("no valid instance for service {service_name}")]
    NoInstances { service_name: String },

    #[error("no tokio runtime available to run the resolver")]
    NoRuntime,
}

/// One resolution result
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedState {
    pub addresses: Vec<Address>,
}

impl ResolvedState {
    pub fn new(addresses: Vec<Address>) -> Self {
        Self { addresses }
    }
}

/// Sink the framework provides for resolver output
pub trait ClientConn: Send + Sync {
    fn update_state(&self, state: ResolvedState);
    fn report_error(&self, error: ResolveError);
}

/// A running resolver
pub trait Resolver: Send + Sync {
    /// Hint that a fresh resolution is wanted soon
    fn resolve_now(&self);
    /// Stop resolving; safe to call more than once
    fn close(&self);
}

/// Creates resolvers for one target scheme
pub trait ResolverBuilder: Send + Sync {
    fn scheme(&self) -> &'static str;
    fn build(
        &self,
        target: &str,
        client_conn: std::sync::Arc<dyn ClientConn>,
    ) -> Result<Box<dyn Resolver>, ResolveError>;
}
