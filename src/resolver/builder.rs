use std::sync::Arc;
use tracing::debug;

use crate::config::resolver::ResolverConfig;
use crate::config::service_discovery::RegistryConfig;
use crate::resolver::{ClientConn, NacosResolver, ResolveError, Resolver, ResolverBuilder};
use crate::service_discovery::{NacosNamingClient, NamingClient, ServiceDiscoveryResult};
use crate::target::{Scheme, Target, TargetError};

/// Produces the registry client for a decoded target
pub type NamingClientFactory =
    Arc<dyn Fn(&Target) -> ServiceDiscoveryResult<Arc<dyn NamingClient>> + Send + Sync>;

/// Builds [`NacosResolver`]s for one of the `nacos` / `nacoss` schemes
#[derive(Clone)]
pub struct NacosResolverBuilder {
    scheme: Scheme,
    client_factory: NamingClientFactory,
    config: ResolverConfig,
}

impl std::fmt::Debug for NacosResolverBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NacosResolverBuilder")
            .field("scheme", &self.scheme)
            .field("config", &self.config)
            .finish()
    }
}

impl NacosResolverBuilder {
    /// Builder that talks to the registry named in each target over HTTP
    pub fn new(scheme: Scheme) -> Self {
        Self::with_registry_config(scheme, RegistryConfig::default())
    }

    pub fn with_registry_config(scheme: Scheme, registry: RegistryConfig) -> Self {
        let factory: NamingClientFactory =
            Arc::new(move |target: &Target| -> ServiceDiscoveryResult<Arc<dyn NamingClient>> {
                let client = NacosNamingClient::for_target(target, registry.clone())?;
                Ok(Arc::new(client) as Arc<dyn NamingClient>)
            });
        Self::with_factory(scheme, factory)
    }

    /// Builder whose resolvers all share `client`, whatever registry the target names
    pub fn with_client(scheme: Scheme, client: Arc<dyn NamingClient>) -> Self {
        let factory: NamingClientFactory =
            Arc::new(move |_: &Target| -> ServiceDiscoveryResult<Arc<dyn NamingClient>> {
                Ok(Arc::clone(&client))
            });
        Self::with_factory(scheme, factory)
    }

    pub fn with_factory(scheme: Scheme, client_factory: NamingClientFactory) -> Self {
        Self {
            scheme,
            client_factory,
            config: ResolverConfig::default(),
        }
    }

    pub fn with_resolver_config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    /// Like [`ResolverBuilder::build`] but returns the concrete resolver
    pub fn build_resolver(
        &self,
        target: &str,
        client_conn: Arc<dyn ClientConn>,
    ) -> Result<NacosResolver, ResolveError> {
        let target = Target::decode(target)?;
        if target.scheme != self.scheme {
            return Err(TargetError::UnsupportedScheme(target.scheme.to_string()).into());
        }

        let client = (self.client_factory)(&target)?;
        debug!("Building resolver for {} with {} client", target, client.backend());
        NacosResolver::start(target, client, client_conn, &self.config)
    }
}

impl ResolverBuilder for NacosResolverBuilder {
    fn scheme(&self) -> &'static str {
        self.scheme.as_str()
    }

    fn build(
        &self,
        target: &str,
        client_conn: Arc<dyn ClientConn>,
    ) -> Result<Box<dyn Resolver>, ResolveError> {
        let resolver = self.build_resolver(target, client_conn)?;
        Ok(Box::new(resolver))
    }
}
