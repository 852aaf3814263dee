//! Nacos HTTP registry client
//!
//! Talks to the Nacos open API (`/v1/ns/instance/list`). Subscriptions are
//! client-side watches: a background task re-queries the registry every
//! `watch_interval` and invokes the callback whenever the membership changes.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::service_discovery::RegistryConfig;
use crate::service_discovery::{
    Instance, NamingClient, Service, ServiceDiscoveryError, ServiceDiscoveryResult, ServiceQuery,
    SubscribeCallback,
};
use crate::target::Target;

const INSTANCE_LIST_PATH: &str = "/v1/ns/instance/list";

/// Nacos registry client over HTTP
pub struct NacosNamingClient {
    http: Arc<NacosHttp>,
    watches: Mutex<HashMap<String, watch::Sender<bool>>>,
}

struct NacosHttp {
    client: reqwest::Client,
    base_url: String,
    config: RegistryConfig,
}

impl std::fmt::Debug for NacosNamingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NacosNamingClient")
            .field("base_url", &self.http.base_url)
            .field("config", &self.http.config)
            .field("client", &"<reqwest::Client>")
            .finish()
    }
}

impl NacosNamingClient {
    /// Create a client for the registry at `base_url`
    ///
    /// When `base_url` has no path the configured context path is appended,
    /// so `http://registry:8848` talks to `http://registry:8848/nacos`.
    pub fn new(base_url: &str, config: RegistryConfig) -> ServiceDiscoveryResult<Self> {
        let base_url = normalize_base_url(base_url, &config.context_path)?;

        let client = reqwest::ClientBuilder::new()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| ServiceDiscoveryError::ConnectionFailed(std::io::Error::other(e)))?;

        debug!("Created Nacos naming client for {}", base_url);

        Ok(Self {
            http: Arc::new(NacosHttp {
                client,
                base_url,
                config,
            }),
            watches: Mutex::new(HashMap::new()),
        })
    }

    /// Create a client for the registry named by a parsed target
    pub fn for_target(target: &Target, config: RegistryConfig) -> ServiceDiscoveryResult<Self> {
        Self::new(&target.registry_base_url(), config)
    }

    pub fn base_url(&self) -> &str {
        &self.http.base_url
    }

    fn watches(&self) -> MutexGuard<'_, HashMap<String, watch::Sender<bool>>> {
        self.watches
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn stop_watch(&self, key: &str) -> bool {
        match self.watches().remove(key) {
            Some(stop) => {
                let _ = stop.send(true);
                true
            }
            None => false,
        }
    }
}

impl Drop for NacosNamingClient {
    fn drop(&mut self) {
        for (_, stop) in self.watches().drain() {
            let _ = stop.send(true);
        }
    }
}

impl NacosHttp {
    async fn fetch(&self, query: &ServiceQuery) -> ServiceDiscoveryResult<Service> {
        let url = format!("{}{}", self.base_url, INSTANCE_LIST_PATH);
        let clusters = query.clusters.join(",");
        let healthy_only = if query.healthy_only { "true" } else { "false" };

        let mut request = self.client.get(&url).query(&[
            ("serviceName", query.service_name.as_str()),
            ("groupName", query.group_name.as_str()),
            ("namespaceId", query.namespace_id.as_str()),
            ("clusters", clusters.as_str()),
            ("healthyOnly", healthy_only),
        ]);

        if let Some(token) = &self.config.access_token {
            request = request.query(&[("accessToken", token)]);
        }

        let response = request.send().await.map_err(|e| {
            ServiceDiscoveryError::NetworkError(format!("Failed to query Nacos: {}", e))
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ServiceDiscoveryError::ServiceNotFound {
                service_name: query.service_name.clone(),
            });
        }
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ServiceDiscoveryError::BackendError(format!(
                "Nacos API error: HTTP {} - {}",
                status, error_text
            )));
        }

        let mut service: Service = response.json().await.map_err(|e| {
            ServiceDiscoveryError::BackendError(format!("Failed to parse Nacos response: {}", e))
        })?;
        sort_hosts(&mut service.hosts);
        Ok(service)
    }
}

fn normalize_base_url(base_url: &str, context_path: &str) -> ServiceDiscoveryResult<String> {
    let mut url = url::Url::parse(base_url).map_err(|e| {
        ServiceDiscoveryError::ConfigurationError(format!(
            "Invalid registry address {}: {}",
            base_url, e
        ))
    })?;
    if url.path().is_empty() || url.path() == "/" {
        url.set_path(context_path);
    }
    Ok(url.as_str().trim_end_matches('/').to_string())
}

fn sort_hosts(hosts: &mut [Instance]) {
    hosts.sort_by(|a, b| (&a.ip, a.port).cmp(&(&b.ip, b.port)));
}

#[async_trait]
impl NamingClient for NacosNamingClient {
    async fn query(&self, query: &ServiceQuery) -> ServiceDiscoveryResult<Service> {
        self.http.fetch(query).await
    }

    async fn subscribe(
        &self,
        query: &ServiceQuery,
        callback: SubscribeCallback,
    ) -> ServiceDiscoveryResult<()> {
        let initial = self.http.fetch(query).await.map_err(|e| {
            ServiceDiscoveryError::SubscriptionFailed(format!("{}: {}", query, e))
        })?;

        let key = query.subscription_key();
        if self.stop_watch(&key) {
            debug!("Replacing existing Nacos watch for {}", query);
        }

        let (stop_tx, mut stop_rx) = watch::channel(false);
        self.watches().insert(key, stop_tx);

        let mut last_hosts = initial.hosts.clone();
        callback(Ok(initial));

        let http = Arc::clone(&self.http);
        let query = query.clone();
        info!(
            "Watching {} on {} every {:?}",
            query,
            http.base_url,
            http.config.watch_interval()
        );

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(http.config.watch_interval());
            ticker.tick().await;
            // After a failed refresh the next snapshot is delivered even if unchanged.
            let mut failing = false;

            loop {
                tokio::select! {
                    biased;
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            debug!("Nacos watch for {} stopped", query);
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        match http.fetch(&query).await {
                            Ok(service) => {
                                if failing || service.hosts != last_hosts {
                                    debug!(
                                        "Membership of {} changed: {} -> {} instances",
                                        query,
                                        last_hosts.len(),
                                        service.hosts.len()
                                    );
                                    failing = false;
                                    last_hosts = service.hosts.clone();
                                    callback(Ok(service));
                                }
                            }
                            Err(e) => {
                                warn!("Nacos watch query for {} failed: {}", query, e);
                                failing = true;
                                callback(Err(e));
                            }
                        }
                    }
                }
            }
        });

        Ok(())
    }

    async fn unsubscribe(&self, query: &ServiceQuery) -> ServiceDiscoveryResult<()> {
        if !self.stop_watch(&query.subscription_key()) {
            debug!("No Nacos watch to stop for {}", query);
        }
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "nacos"
    }
}
