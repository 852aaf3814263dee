//! Registry-backed resolver
//!
//! One [`NacosResolver`] tracks one target on one tokio task. In poll mode
//! the task queries the registry on start, on every tick and on
//! [`Resolver::resolve_now`]. In subscribe mode it registers a callback and
//! forwards each pushed snapshot, or pushed refresh failure, in arrival order.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::address::Address;
use crate::config::resolver::ResolverConfig;
use crate::resolver::{ClientConn, ResolveError, ResolvedState, Resolver};
use crate::service_discovery::{
    NamingClient, Service, ServiceDiscoveryResult, ServiceQuery, SubscribeCallback,
};
use crate::target::{Mode, Target};

/// Resolver for `nacos://` and `nacoss://` targets
pub struct NacosResolver {
    target: Target,
    close_tx: watch::Sender<bool>,
    resolve_now: Arc<Notify>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for NacosResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NacosResolver")
            .field("target", &self.target)
            .field("closed", &*self.close_tx.borrow())
            .finish()
    }
}

/// Everything the background task needs
struct ResolverTask {
    query: ServiceQuery,
    client: Arc<dyn NamingClient>,
    client_conn: Arc<dyn ClientConn>,
}

impl NacosResolver {
    /// Validate `target` and start resolving on the current tokio runtime
    pub fn start(
        target: Target,
        client: Arc<dyn NamingClient>,
        client_conn: Arc<dyn ClientConn>,
        config: &ResolverConfig,
    ) -> Result<Self, ResolveError> {
        target.validate()?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| ResolveError::NoRuntime)?;

        let query = ServiceQuery::new(
            target.service_name.clone(),
            target.group_name.clone(),
            target.namespace_id.clone(),
        )
        .with_clusters(target.clusters.clone())
        .with_healthy_only(config.healthy_only);

        let (close_tx, close_rx) = watch::channel(false);
        let resolve_now = Arc::new(Notify::new());
        let task = ResolverTask {
            query,
            client,
            client_conn,
        };

        info!(
            "Starting {} resolver for {} via {} backend",
            target.mode.code(),
            task.query,
            task.client.backend()
        );

        let handle = match target.mode {
            Mode::Poll { interval } => {
                runtime.spawn(task.run_poll(interval, close_rx, Arc::clone(&resolve_now)))
            }
            Mode::Subscribe => runtime.spawn(task.run_subscribe(
                config.resubscribe_backoff(),
                close_rx,
            )),
        };

        Ok(Self {
            target,
            close_tx,
            resolve_now,
            task: Mutex::new(Some(handle)),
        })
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn is_closed(&self) -> bool {
        *self.close_tx.borrow()
    }

    /// Close and wait for the background task to finish its cleanup
    pub async fn shutdown(&self) {
        self.close();
        let handle = self
            .task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Resolver task for {} ended abnormally: {}", self.target, e);
            }
        }
    }
}

impl Resolver for NacosResolver {
    fn resolve_now(&self) {
        match self.target.mode {
            Mode::Poll { .. } => self.resolve_now.notify_one(),
            Mode::Subscribe => debug!("resolve_now ignored for subscribed target {}", self.target),
        }
    }

    fn close(&self) {
        let already_closed = self.close_tx.send_replace(true);
        if !already_closed {
            info!("Closing resolver for {}", self.target);
        }
    }
}

impl Drop for NacosResolver {
    fn drop(&mut self) {
        self.close();
    }
}

impl ResolverTask {
    async fn run_poll(
        self,
        interval: Duration,
        mut close_rx: watch::Receiver<bool>,
        resolve_now: Arc<Notify>,
    ) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            // The first tick completes immediately, so the initial query runs on start.
            tokio::select! {
                biased;
                _ = close_rx.changed() => break,
                _ = ticker.tick() => {}
                _ = resolve_now.notified() => {
                    debug!("Immediate resolution requested for {}", self.query);
                }
            }

            let result = tokio::select! {
                biased;
                _ = close_rx.changed() => break,
                result = self.client.query(&self.query) => result,
            };

            match result {
                Ok(service) => self.deliver(service),
                Err(e) => {
                    warn!("Registry query for {} failed: {}", self.query, e);
                    self.client_conn.report_error(ResolveError::Registry(e));
                }
            }
        }

        debug!("Poll loop for {} exited", self.query);
    }

    async fn run_subscribe(
        self,
        backoff: Option<Duration>,
        mut close_rx: watch::Receiver<bool>,
    ) {
        let (push_tx, mut push_rx) = mpsc::unbounded_channel::<ServiceDiscoveryResult<Service>>();

        loop {
            let sender = push_tx.clone();
            let callback: SubscribeCallback =
                Arc::new(move |pushed: ServiceDiscoveryResult<Service>| {
                    // The receiver only goes away once the resolver is closed.
                    let _ = sender.send(pushed);
                });

            let result = tokio::select! {
                biased;
                _ = close_rx.changed() => return,
                result = self.client.subscribe(&self.query, callback) => result,
            };

            match result {
                Ok(()) => {
                    info!("Subscribed to {}", self.query);
                    break;
                }
                Err(e) => {
                    error!("Subscription to {} failed: {}", self.query, e);
                    self.client_conn.report_error(ResolveError::Registry(e));
                }
            }

            match backoff {
                Some(delay) => {
                    tokio::select! {
                        biased;
                        _ = close_rx.changed() => return,
                        _ = tokio::time::sleep(delay) => {
                            debug!("Retrying subscription to {}", self.query);
                        }
                    }
                }
                None => {
                    let _ = close_rx.changed().await;
                    return;
                }
            }
        }

        loop {
            tokio::select! {
                biased;
                _ = close_rx.changed() => break,
                Some(pushed) = push_rx.recv() => match pushed {
                    Ok(service) => self.deliver(service),
                    Err(e) => {
                        warn!("Registry refresh for {} failed: {}", self.query, e);
                        self.client_conn.report_error(ResolveError::Registry(e));
                    }
                },
            }
        }

        if let Err(e) = self.client.unsubscribe(&self.query).await {
            warn!("Failed to unsubscribe from {}: {}", self.query, e);
        }
        debug!("Subscribe loop for {} exited", self.query);
    }

    fn deliver(&self, service: Service) {
        let addresses = to_addresses(&service, &self.query);
        if addresses.is_empty() {
            warn!(
                "No usable instances for {} ({} reported)",
                self.query,
                service.hosts.len()
            );
            self.client_conn.report_error(ResolveError::NoInstances {
                service_name: self.query.service_name.clone(),
            });
            return;
        }

        debug!(
            "Resolved {} addresses for {}",
            addresses.len(),
            self.query
        );
        self.client_conn.update_state(ResolvedState::new(addresses));
    }
}

/// Convert a registry snapshot into weighted addresses, dropping unusable instances
pub fn to_addresses(service: &Service, query: &ServiceQuery) -> Vec<Address> {
    let mut addresses: Vec<Address> = service
        .hosts
        .iter()
        .filter(|instance| instance.is_usable(query.healthy_only))
        .filter(|instance| instance.in_clusters(&query.clusters))
        .map(|instance| {
            Address::from_parts(&instance.ip, instance.port, query.service_name.clone())
                .with_weight(instance.balancer_weight())
        })
        .collect();
    addresses.sort();
    addresses.dedup();
    addresses
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service_discovery::{InMemoryNamingClient, Instance};
    use crate::target::Target;

    #[derive(Default)]
    struct RecordingConn {
        states: Mutex<Vec<ResolvedState>>,
        errors: Mutex<Vec<String>>,
    }

    impl ClientConn for RecordingConn {
        fn update_state(&self, state: ResolvedState) {
            self.states.lock().unwrap().push(state);
        }

        fn report_error(&self, error: ResolveError) {
            self.errors.lock().unwrap().push(error.to_string());
        }
    }

    fn orders_query() -> ServiceQuery {
        ServiceQuery::new("orders", "DEFAULT_GROUP", "public")
    }

    async fn wait_for<F: Fn() -> bool>(condition: F) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached in time");
    }

    #[test]
    fn test_to_addresses_filters_and_weights() {
        let service = Service::new(
            "orders",
            vec![
                Instance::new("10.0.0.2", 80).with_weight(3.7),
                Instance::new("10.0.0.1", 80).with_weight(-1.0),
                Instance::new("10.0.0.3", 80).with_healthy(false),
                Instance::new("10.0.0.4", 80).with_enabled(false),
                Instance::new("10.0.0.5", 0),
            ],
        );

        let addresses = to_addresses(&service, &orders_query());
        assert_eq!(addresses.len(), 2);
        assert_eq!(addresses[0].addr, "10.0.0.1:80");
        assert_eq!(addresses[0].weight(), 0);
        assert_eq!(addresses[1].addr, "10.0.0.2:80");
        assert_eq!(addresses[1].weight(), 3);
        assert!(addresses.iter().all(|a| a.server_name == "orders"));
    }

    #[test]
    fn test_to_addresses_ipv6() {
        let service = Service::new("orders", vec![Instance::new("::1", 9000)]);
        let addresses = to_addresses(&service, &orders_query());
        assert_eq!(addresses[0].addr, "[::1]:9000");
    }

    #[test]
    fn test_start_requires_runtime() {
        let target = Target::decode("nacos://registry:8848?s=orders&n=public&g=DEFAULT_GROUP&m=sb")
            .unwrap();
        let result = NacosResolver::start(
            target,
            Arc::new(InMemoryNamingClient::new()),
            Arc::new(RecordingConn::default()),
            &ResolverConfig::default(),
        );
        assert!(matches!(result, Err(ResolveError::NoRuntime)));
    }

    #[tokio::test]
    async fn test_start_rejects_invalid_target() {
        let mut target =
            Target::decode("nacos://registry:8848?s=orders&n=public&g=DEFAULT_GROUP&m=sb").unwrap();
        target.service_name.clear();
        let result = NacosResolver::start(
            target,
            Arc::new(InMemoryNamingClient::new()),
            Arc::new(RecordingConn::default()),
            &ResolverConfig::default(),
        );
        assert!(matches!(result, Err(ResolveError::Target(_))));
    }

    #[tokio::test]
    async fn test_subscribe_empty_snapshot_reports_no_instances() {
        let registry = InMemoryNamingClient::new();
        let conn = Arc::new(RecordingConn::default());
        let target =
            Target::decode("nacos://registry:8848?s=orders&n=public&g=DEFAULT_GROUP&m=sb").unwrap();
        let resolver = NacosResolver::start(
            target,
            Arc::new(registry.clone()),
            conn.clone(),
            &ResolverConfig::default(),
        )
        .unwrap();

        wait_for(|| !conn.errors.lock().unwrap().is_empty()).await;
        assert_eq!(
            conn.errors.lock().unwrap()[0],
            "no valid instance for service orders"
        );

        registry.register_instance(&orders_query(), Instance::new("10.0.0.1", 80));
        wait_for(|| !conn.states.lock().unwrap().is_empty()).await;

        resolver.shutdown().await;
        assert!(resolver.is_closed());
        assert_eq!(registry.subscription_count(), 0);
    }

    #[tokio::test]
    async fn test_resolve_now_triggers_query() {
        let registry = InMemoryNamingClient::new();
        registry.register_instance(&orders_query(), Instance::new("10.0.0.1", 80));
        let conn = Arc::new(RecordingConn::default());
        let target = Target::decode(
            "nacos://registry:8848?s=orders&n=public&g=DEFAULT_GROUP&m=hb&d=3600000",
        )
        .unwrap();
        let resolver = NacosResolver::start(
            target,
            Arc::new(registry.clone()),
            conn.clone(),
            &ResolverConfig::default(),
        )
        .unwrap();

        wait_for(|| conn.states.lock().unwrap().len() == 1).await;
        registry.register_instance(&orders_query(), Instance::new("10.0.0.2", 80));
        resolver.resolve_now();
        wait_for(|| conn.states.lock().unwrap().len() == 2).await;
        assert_eq!(conn.states.lock().unwrap()[1].addresses.len(), 2);

        resolver.close();
        resolver.close();
        resolver.shutdown().await;
    }
}
