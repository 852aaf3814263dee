//! Target codec
//!
//! A target is one connection string that tells a resolver where the registry
//! lives, which service to track and how to track it:
//!
//! ```text
//! nacos://127.0.0.1:8848?s=orders&n=public&cs=DEFAULT&g=DEFAULT_GROUP&m=hb&d=10000
//! ```
//!
//! `nacos` talks to the registry over plain HTTP, `nacoss` over HTTPS. `m=hb`
//! polls the registry every `d` milliseconds, `m=sb` subscribes to pushes and
//! ignores `d`.
//!
//! ```rust
//! use nacos_naming::target::{self, Mode, Target, TargetOption};
//!
//! let uri = target::encode(
//!     "https://registry.internal:8848",
//!     "c1",
//!     "g1",
//!     "orders",
//!     [TargetOption::NamespaceId("ns1".into()), TargetOption::Subscribe],
//! );
//! let decoded = Target::decode(&uri).unwrap();
//! assert_eq!(decoded.mode, Mode::Subscribe);
//! assert!(decoded.scheme.is_tls());
//! ```

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const DEFAULT_CLUSTER_NAME: &str = "DEFAULT";
pub const DEFAULT_GROUP_NAME: &str = "DEFAULT_GROUP";
pub const DEFAULT_NAMESPACE_ID: &str = "public";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

const MODE_POLL: &str = "hb";
const MODE_SUBSCRIBE: &str = "sb";

const PARAM_SERVICE: &str = "s";
const PARAM_NAMESPACE: &str = "n";
const PARAM_CLUSTERS: &str = "cs";
const PARAM_GROUP: &str = "g";
const PARAM_MODE: &str = "m";
const PARAM_INTERVAL: &str = "d";

/// Errors raised while decoding or validating a target
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetError {
    #[error("unsupported scheme '{0}' (expected nacos or nacoss)")]
    UnsupportedScheme(String),

    #[error("malformed target: {0}")]
    InvalidUri(#[from] url::ParseError),

    #[error("target is missing the registry address")]
    MissingRegistryAddress,

    #[error("target is missing the service name")]
    MissingServiceName,

    #[error("target is missing the namespace id")]
    MissingNamespaceId,

    #[error("target is missing the group name")]
    MissingGroupName,

    #[error("invalid target mode '{0}' (expected hb or sb)")]
    InvalidMode(String),

    #[error("poll mode target is missing the interval")]
    MissingInterval,

    #[error("malformed poll interval '{0}'")]
    MalformedInterval(String),

    #[error("poll interval must be positive, got {0}ms")]
    InvalidInterval(i64),
}

/// URI scheme of a target, selecting plain or TLS registry access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Nacos,
    Nacoss,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Nacos => "nacos",
            Scheme::Nacoss => "nacoss",
        }
    }

    /// Whether the registry is reached over TLS
    pub fn is_tls(&self) -> bool {
        matches!(self, Scheme::Nacoss)
    }

    /// Scheme used for the registry's HTTP API
    pub fn http_scheme(&self) -> &'static str {
        if self.is_tls() {
            "https"
        } else {
            "http"
        }
    }
}

impl FromStr for Scheme {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nacos" => Ok(Scheme::Nacos),
            "nacoss" => Ok(Scheme::Nacoss),
            other => Err(TargetError::UnsupportedScheme(other.to_string())),
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a resolver keeps its view of the service fresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Re-query the registry on a fixed timer
    Poll { interval: Duration },
    /// Receive a full snapshot on every membership change
    Subscribe,
}

impl Mode {
    /// Wire code for the `m` parameter
    pub fn code(&self) -> &'static str {
        match self {
            Mode::Poll { .. } => MODE_POLL,
            Mode::Subscribe => MODE_SUBSCRIBE,
        }
    }
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Poll {
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Structured form of a connection string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub scheme: Scheme,
    /// Registry `host[:port][/path]`
    pub registry: String,
    pub service_name: String,
    pub namespace_id: String,
    /// Cluster filter; empty means every cluster
    pub clusters: Vec<String>,
    pub group_name: String,
    pub mode: Mode,
}

impl Target {
    /// Parse and validate a connection string. Performs no I/O.
    pub fn decode(target: &str) -> Result<Self, TargetError> {
        let url = Url::parse(target)?;
        let scheme: Scheme = url.scheme().parse()?;

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or(TargetError::MissingRegistryAddress)?;
        let mut registry = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };
        let path = url.path().trim_end_matches('/');
        if !path.is_empty() {
            registry.push_str(path);
        }

        // First occurrence wins for repeated keys.
        let mut values: HashMap<String, String> = HashMap::new();
        for (key, value) in url.query_pairs() {
            values
                .entry(key.into_owned())
                .or_insert_with(|| value.into_owned());
        }
        let get = |key: &str| values.get(key).map(String::as_str).unwrap_or("");

        let service_name = get(PARAM_SERVICE);
        if service_name.is_empty() {
            return Err(TargetError::MissingServiceName);
        }
        let namespace_id = get(PARAM_NAMESPACE);
        if namespace_id.is_empty() {
            return Err(TargetError::MissingNamespaceId);
        }
        let group_name = get(PARAM_GROUP);
        if group_name.is_empty() {
            return Err(TargetError::MissingGroupName);
        }

        let mode = match get(PARAM_MODE) {
            MODE_POLL => Mode::Poll {
                interval: parse_interval(get(PARAM_INTERVAL))?,
            },
            MODE_SUBSCRIBE => Mode::Subscribe,
            other => return Err(TargetError::InvalidMode(other.to_string())),
        };

        let clusters = get(PARAM_CLUSTERS)
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            scheme,
            registry,
            service_name: service_name.to_string(),
            namespace_id: namespace_id.to_string(),
            clusters,
            group_name: group_name.to_string(),
            mode,
        })
    }

    /// Serialize back into a connection string
    pub fn encode(&self) -> String {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        query
            .append_pair(PARAM_SERVICE, &self.service_name)
            .append_pair(PARAM_NAMESPACE, &self.namespace_id)
            .append_pair(PARAM_CLUSTERS, &self.clusters.join(","))
            .append_pair(PARAM_GROUP, &self.group_name)
            .append_pair(PARAM_MODE, self.mode.code());
        if let Mode::Poll { interval } = self.mode {
            query.append_pair(PARAM_INTERVAL, &interval.as_millis().to_string());
        }
        format!("{}://{}?{}", self.scheme, self.registry, query.finish())
    }

    /// Re-check the fields `decode` guarantees, for targets built by hand
    pub fn validate(&self) -> Result<(), TargetError> {
        if self.registry.is_empty() {
            return Err(TargetError::MissingRegistryAddress);
        }
        if self.service_name.is_empty() {
            return Err(TargetError::MissingServiceName);
        }
        if self.namespace_id.is_empty() {
            return Err(TargetError::MissingNamespaceId);
        }
        if self.group_name.is_empty() {
            return Err(TargetError::MissingGroupName);
        }
        if let Mode::Poll { interval } = self.mode {
            if interval.is_zero() {
                return Err(TargetError::InvalidInterval(0));
            }
        }
        Ok(())
    }

    /// Base URL of the registry HTTP API, e.g. `https://10.0.0.1:8848/nacos`
    pub fn registry_base_url(&self) -> String {
        format!("{}://{}", self.scheme.http_scheme(), self.registry)
    }

    /// Poll interval, `None` in subscribe mode
    pub fn poll_interval(&self) -> Option<Duration> {
        match self.mode {
            Mode::Poll { interval } => Some(interval),
            Mode::Subscribe => None,
        }
    }
}

impl FromStr for Target {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Target::decode(s)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

fn parse_interval(raw: &str) -> Result<Duration, TargetError> {
    if raw.is_empty() {
        return Err(TargetError::MissingInterval);
    }
    let millis: i64 = raw
        .parse()
        .map_err(|_| TargetError::MalformedInterval(raw.to_string()))?;
    if millis <= 0 {
        return Err(TargetError::InvalidInterval(millis));
    }
    Ok(Duration::from_millis(millis as u64))
}

/// A single override applied on top of the encoding defaults
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetOption {
    GroupName(String),
    NamespaceId(String),
    /// Ignored when empty
    Clusters(Vec<String>),
    /// Poll mode with the given interval
    Poll(Duration),
    Subscribe,
}

#[derive(Debug, Clone)]
struct EncodeOptions {
    group_name: String,
    clusters: Vec<String>,
    namespace_id: String,
    mode: Mode,
}

impl TargetOption {
    fn apply(self, opts: &mut EncodeOptions) {
        match self {
            TargetOption::GroupName(group) => opts.group_name = group,
            TargetOption::NamespaceId(namespace) => opts.namespace_id = namespace,
            TargetOption::Clusters(clusters) => {
                if !clusters.is_empty() {
                    opts.clusters = clusters;
                }
            }
            TargetOption::Poll(interval) => opts.mode = Mode::Poll { interval },
            TargetOption::Subscribe => opts.mode = Mode::Subscribe,
        }
    }
}

/// Build a connection string for `service_name` behind `registry_addr`.
///
/// Empty `cluster` / `group_name` fall back to the registry defaults. An
/// `https://` registry address selects the `nacoss` scheme; `http://` or a
/// bare `host:port` selects `nacos`.
pub fn encode<I>(
    registry_addr: &str,
    cluster: &str,
    group_name: &str,
    service_name: &str,
    options: I,
) -> String
where
    I: IntoIterator<Item = TargetOption>,
{
    let mut opts = EncodeOptions {
        group_name: non_empty_or(group_name, DEFAULT_GROUP_NAME),
        clusters: vec![non_empty_or(cluster, DEFAULT_CLUSTER_NAME)],
        namespace_id: DEFAULT_NAMESPACE_ID.to_string(),
        mode: Mode::default(),
    };
    for option in options {
        option.apply(&mut opts);
    }

    let (scheme, registry) = split_registry_addr(registry_addr);
    Target {
        scheme,
        registry: registry.trim_end_matches('/').to_string(),
        service_name: service_name.to_string(),
        namespace_id: opts.namespace_id,
        clusters: opts.clusters,
        group_name: opts.group_name,
        mode: opts.mode,
    }
    .encode()
}

/// Shorthand for [`Target::decode`]
pub fn decode(target: &str) -> Result<Target, TargetError> {
    Target::decode(target)
}

fn non_empty_or(value: &str, default: &str) -> String {
    if value.is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}

fn split_registry_addr(addr: &str) -> (Scheme, &str) {
    if let Some(rest) = addr.strip_prefix("https://") {
        (Scheme::Nacoss, rest)
    } else if let Some(rest) = addr.strip_prefix("http://") {
        (Scheme::Nacos, rest)
    } else if let Some(rest) = addr.strip_prefix("nacoss://") {
        (Scheme::Nacoss, rest)
    } else if let Some(rest) = addr.strip_prefix("nacos://") {
        (Scheme::Nacos, rest)
    } else {
        (Scheme::Nacos, addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_defaults() {
        let uri = encode("http://127.0.0.1:8848", "", "", "orders", Vec::<TargetOption>::new());
        let target = Target::decode(&uri).unwrap();

        assert_eq!(target.scheme, Scheme::Nacos);
        assert_eq!(target.registry, "127.0.0.1:8848");
        assert_eq!(target.service_name, "orders");
        assert_eq!(target.namespace_id, DEFAULT_NAMESPACE_ID);
        assert_eq!(target.group_name, DEFAULT_GROUP_NAME);
        assert_eq!(target.clusters, vec![DEFAULT_CLUSTER_NAME.to_string()]);
        assert_eq!(
            target.mode,
            Mode::Poll {
                interval: Duration::from_secs(10)
            }
        );
    }

    #[test]
    fn test_encode_subscribe_roundtrip() {
        let uri = encode(
            "http://127.0.0.1:8848",
            "c1",
            "g1",
            "orders",
            [
                TargetOption::NamespaceId("ns1".to_string()),
                TargetOption::Subscribe,
            ],
        );
        let target = Target::decode(&uri).unwrap();

        assert_eq!(target.mode, Mode::Subscribe);
        assert_eq!(target.clusters, vec!["c1".to_string()]);
        assert_eq!(target.group_name, "g1");
        assert_eq!(target.namespace_id, "ns1");
        assert_eq!(target.poll_interval(), None);
    }

    #[test]
    fn test_tls_registry_selects_secure_scheme() {
        let uri = encode("https://registry:8848/nacos/", "", "", "orders", Vec::<TargetOption>::new());
        assert!(uri.starts_with("nacoss://registry:8848/nacos?"));

        let target = Target::decode(&uri).unwrap();
        assert!(target.scheme.is_tls());
        assert_eq!(target.registry_base_url(), "https://registry:8848/nacos");
    }

    #[test]
    fn test_options_apply_in_order() {
        let uri = encode(
            "registry:8848",
            "",
            "",
            "orders",
            [
                TargetOption::Subscribe,
                TargetOption::Poll(Duration::from_millis(1500)),
                TargetOption::Clusters(vec![]),
                TargetOption::Clusters(vec!["a".to_string(), "b".to_string()]),
                TargetOption::GroupName("payments".to_string()),
            ],
        );
        let target = Target::decode(&uri).unwrap();

        assert_eq!(target.scheme, Scheme::Nacos);
        assert_eq!(target.poll_interval(), Some(Duration::from_millis(1500)));
        assert_eq!(target.clusters, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(target.group_name, "payments");
    }

    #[test]
    fn test_decode_literal_uri() {
        let target =
            Target::decode("nacos://10.1.1.1:8848?s=orders&n=dev&cs=c1,c2&g=g&m=hb&d=2500")
                .unwrap();
        assert_eq!(target.clusters, vec!["c1".to_string(), "c2".to_string()]);
        assert_eq!(target.poll_interval(), Some(Duration::from_millis(2500)));
        assert_eq!(target.to_string().parse::<Target>().unwrap(), target);
    }

    #[test]
    fn test_decode_without_clusters() {
        let target = Target::decode("nacos://registry?s=orders&n=dev&g=g&m=sb").unwrap();
        assert!(target.clusters.is_empty());
        assert_eq!(target.registry, "registry");
    }

    #[test]
    fn test_decode_missing_service_name() {
        let err = Target::decode("nacos://registry:8848?n=dev&g=g&m=sb").unwrap_err();
        assert_eq!(err, TargetError::MissingServiceName);
    }

    #[test]
    fn test_decode_missing_namespace_and_group() {
        let err = Target::decode("nacos://registry:8848?s=orders&g=g&m=sb").unwrap_err();
        assert_eq!(err, TargetError::MissingNamespaceId);

        let err = Target::decode("nacos://registry:8848?s=orders&n=dev&m=sb").unwrap_err();
        assert_eq!(err, TargetError::MissingGroupName);
    }

    #[test]
    fn test_decode_bad_mode() {
        let err = Target::decode("nacos://registry?s=orders&n=dev&g=g&m=xx").unwrap_err();
        assert_eq!(err, TargetError::InvalidMode("xx".to_string()));

        let err = Target::decode("nacos://registry?s=orders&n=dev&g=g").unwrap_err();
        assert_eq!(err, TargetError::InvalidMode(String::new()));
    }

    #[test]
    fn test_decode_interval_errors() {
        let err = Target::decode("nacos://registry?s=orders&n=dev&g=g&m=hb").unwrap_err();
        assert_eq!(err, TargetError::MissingInterval);

        let err = Target::decode("nacos://registry?s=orders&n=dev&g=g&m=hb&d=0").unwrap_err();
        assert_eq!(err, TargetError::InvalidInterval(0));

        let err = Target::decode("nacos://registry?s=orders&n=dev&g=g&m=hb&d=-5").unwrap_err();
        assert_eq!(err, TargetError::InvalidInterval(-5));

        let err = Target::decode("nacos://registry?s=orders&n=dev&g=g&m=hb&d=1s").unwrap_err();
        assert_eq!(err, TargetError::MalformedInterval("1s".to_string()));
    }

    #[test]
    fn test_subscribe_ignores_interval() {
        let target = Target::decode("nacos://registry?s=orders&n=dev&g=g&m=sb&d=0").unwrap();
        assert_eq!(target.mode, Mode::Subscribe);
    }

    #[test]
    fn test_decode_unsupported_scheme() {
        let err = Target::decode("dns://registry?s=orders&n=dev&g=g&m=sb").unwrap_err();
        assert_eq!(err, TargetError::UnsupportedScheme("dns".to_string()));

        assert!(matches!(
            Target::decode("not a uri"),
            Err(TargetError::InvalidUri(_))
        ));
    }

    #[test]
    fn test_validate_hand_built_target() {
        let mut target = Target::decode("nacos://registry:8848?s=orders&n=dev&g=g&m=hb&d=500").unwrap();
        assert!(target.validate().is_ok());

        target.mode = Mode::Poll {
            interval: Duration::ZERO,
        };
        assert_eq!(target.validate(), Err(TargetError::InvalidInterval(0)));

        target.mode = Mode::Subscribe;
        target.group_name.clear();
        assert_eq!(target.validate(), Err(TargetError::MissingGroupName));
    }
}
