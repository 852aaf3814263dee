//! Process-wide registration of resolver and balancer builders
//!
//! Resolver builders are keyed by target scheme, picker builders by balancer
//! name. [`init`] registers the builders this crate ships; it may be called
//! any number of times, from anywhere, in any order relative to custom
//! registrations. Registering under an existing key replaces the old entry.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{Arc, Once, RwLock};
use tracing::debug;

use crate::balancer::{PickerBuilder, WeightedRoundRobinBuilder};
use crate::error::{NamingError, NamingResult};
use crate::resolver::{ClientConn, NacosResolverBuilder, Resolver, ResolverBuilder};
use crate::target::Scheme;

static RESOLVERS: Lazy<RwLock<HashMap<String, Arc<dyn ResolverBuilder>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

static BALANCERS: Lazy<RwLock<HashMap<String, Arc<dyn PickerBuilder>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

static INIT: Once = Once::new();

/// Register the built-in `nacos` / `nacoss` resolvers and the weighted balancer
pub fn init() {
    INIT.call_once(|| {
        for scheme in [Scheme::Nacos, Scheme::Nacoss] {
            register_resolver_if_absent(Arc::new(NacosResolverBuilder::new(scheme)));
        }
        register_balancer_if_absent(Arc::new(WeightedRoundRobinBuilder::new()));
        debug!("Registered built-in resolver and balancer builders");
    });
}

/// Register `builder` under its scheme, replacing any previous entry
pub fn register_resolver(builder: Arc<dyn ResolverBuilder>) {
    let scheme = builder.scheme().to_string();
    RESOLVERS
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .insert(scheme.clone(), builder);
    debug!("Registered resolver builder for scheme {}", scheme);
}

/// Register `builder` under its name, replacing any previous entry
pub fn register_balancer(builder: Arc<dyn PickerBuilder>) {
    let name = builder.name().to_string();
    BALANCERS
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .insert(name.clone(), builder);
    debug!("Registered balancer builder {}", name);
}

// init() must not clobber a custom builder registered before it ran.
fn register_resolver_if_absent(builder: Arc<dyn ResolverBuilder>) {
    RESOLVERS
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .entry(builder.scheme().to_string())
        .or_insert(builder);
}

fn register_balancer_if_absent(builder: Arc<dyn PickerBuilder>) {
    BALANCERS
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .entry(builder.name().to_string())
        .or_insert(builder);
}

pub fn get_resolver(scheme: &str) -> Option<Arc<dyn ResolverBuilder>> {
    RESOLVERS
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .get(scheme)
        .cloned()
}

pub fn get_balancer(name: &str) -> Option<Arc<dyn PickerBuilder>> {
    BALANCERS
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .get(name)
        .cloned()
}

/// Build a resolver for `target` with the builder registered for its scheme
pub fn build_resolver(
    target: &str,
    client_conn: Arc<dyn ClientConn>,
) -> NamingResult<Box<dyn Resolver>> {
    let scheme = target
        .split_once("://")
        .map(|(scheme, _)| scheme)
        .ok_or_else(|| NamingError::config(format!("Target has no scheme: {}", target)))?;
    let builder =
        get_resolver(scheme).ok_or_else(|| NamingError::not_registered("resolver", scheme))?;
    Ok(builder.build(target, client_conn)?)
}
