//! In-memory registry
//!
//! Keeps instances in a map and pushes full snapshots to subscribers
//! synchronously on every change. Useful for tests and local demos where no
//! registry server is around.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use crate::service_discovery::{
    Instance, NamingClient, Service, ServiceDiscoveryError, ServiceDiscoveryResult, ServiceQuery,
    SubscribeCallback,
};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ServiceKey {
    namespace_id: String,
    group_name: String,
    service_name: String,
}

impl ServiceKey {
    fn of(query: &ServiceQuery) -> Self {
        Self {
            namespace_id: query.namespace_id.clone(),
            group_name: query.group_name.clone(),
            service_name: query.service_name.clone(),
        }
    }
}

struct Subscription {
    query: ServiceQuery,
    callback: SubscribeCallback,
}

#[derive(Default)]
struct Inner {
    services: HashMap<ServiceKey, Vec<Instance>>,
    subscriptions: HashMap<String, Subscription>,
    closed: bool,
}

/// Registry double backed by a hash map
#[derive(Clone, Default)]
pub struct InMemoryNamingClient {
    inner: Arc<Mutex<Inner>>,
}

impl std::fmt::Debug for InMemoryNamingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("InMemoryNamingClient")
            .field("services", &inner.services.len())
            .field("subscriptions", &inner.subscriptions.len())
            .finish()
    }
}

impl InMemoryNamingClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace (by `ip:port`) an instance and notify subscribers
    pub fn register_instance(&self, query: &ServiceQuery, instance: Instance) {
        let key = ServiceKey::of(query);
        let notifications = {
            let mut inner = self.lock();
            let instances = inner.services.entry(key.clone()).or_default();
            instances.retain(|i| !(i.ip == instance.ip && i.port == instance.port));
            instances.push(instance);
            Self::pending_notifications(&inner, &key)
        };
        Self::notify(notifications);
    }

    /// Remove the instance at `ip:port` and notify subscribers
    pub fn deregister_instance(&self, query: &ServiceQuery, ip: &str, port: u16) {
        let key = ServiceKey::of(query);
        let notifications = {
            let mut inner = self.lock();
            if let Some(instances) = inner.services.get_mut(&key) {
                instances.retain(|i| !(i.ip == ip && i.port == port));
            }
            Self::pending_notifications(&inner, &key)
        };
        Self::notify(notifications);
    }

    /// Replace the whole membership of a service and notify subscribers
    pub fn set_instances(&self, query: &ServiceQuery, instances: Vec<Instance>) {
        let key = ServiceKey::of(query);
        let notifications = {
            let mut inner = self.lock();
            inner.services.insert(key.clone(), instances);
            Self::pending_notifications(&inner, &key)
        };
        Self::notify(notifications);
    }

    /// Make every later call fail, as if the registry went away
    pub fn close(&self) {
        let mut inner = self.lock();
        inner.closed = true;
        inner.subscriptions.clear();
    }

    /// Number of live subscriptions
    pub fn subscription_count(&self) -> usize {
        self.lock().subscriptions.len()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn snapshot(inner: &Inner, query: &ServiceQuery) -> Service {
        let hosts = inner
            .services
            .get(&ServiceKey::of(query))
            .map(|instances| {
                instances
                    .iter()
                    .filter(|i| i.in_clusters(&query.clusters))
                    .filter(|i| !query.healthy_only || i.healthy)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        Service {
            name: query.service_name.clone(),
            group_name: query.group_name.clone(),
            clusters: query.clusters.join(","),
            cache_millis: 0,
            hosts,
        }
    }

    fn pending_notifications(inner: &Inner, key: &ServiceKey) -> Vec<(SubscribeCallback, Service)> {
        inner
            .subscriptions
            .values()
            .filter(|sub| &ServiceKey::of(&sub.query) == key)
            .map(|sub| (Arc::clone(&sub.callback), Self::snapshot(inner, &sub.query)))
            .collect()
    }

    // Callbacks run outside the lock so they may call back into the registry.
    fn notify(notifications: Vec<(SubscribeCallback, Service)>) {
        for (callback, service) in notifications {
            callback(Ok(service));
        }
    }

    fn ensure_open(inner: &Inner) -> ServiceDiscoveryResult<()> {
        if inner.closed {
            return Err(ServiceDiscoveryError::BackendError(
                "in-memory registry is closed".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl NamingClient for InMemoryNamingClient {
    async fn query(&self, query: &ServiceQuery) -> ServiceDiscoveryResult<Service> {
        let inner = self.lock();
        Self::ensure_open(&inner)?;
        Ok(Self::snapshot(&inner, query))
    }

    async fn subscribe(
        &self,
        query: &ServiceQuery,
        callback: SubscribeCallback,
    ) -> ServiceDiscoveryResult<()> {
        let initial = {
            let mut inner = self.lock();
            Self::ensure_open(&inner)?;
            inner.subscriptions.insert(
                query.subscription_key(),
                Subscription {
                    query: query.clone(),
                    callback: Arc::clone(&callback),
                },
            );
            Self::snapshot(&inner, query)
        };
        debug!("In-memory subscription added for {}", query);
        callback(Ok(initial));
        Ok(())
    }

    async fn unsubscribe(&self, query: &ServiceQuery) -> ServiceDiscoveryResult<()> {
        let mut inner = self.lock();
        inner.subscriptions.remove(&query.subscription_key());
        debug!("In-memory subscription removed for {}", query);
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
