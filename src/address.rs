//! Resolved addresses and the weight annotator
//!
//! An [`Address`] is what a resolver hands to the balancing layer. Its network
//! identity is the `addr` / `server_name` pair; everything the balancer needs on
//! top of that lives in [`Attributes`], which never takes part in equality, so
//! re-weighting an endpoint does not make the framework treat it as a new
//! connection.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Balancer attributes carried alongside an address
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attributes {
    /// Relative traffic share; `None` reads as 0 (unweighted)
    pub weight: Option<u32>,
}

/// A resolved endpoint of a logical service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Address {
    /// Endpoint in `host:port` form
    pub addr: String,
    /// Logical service the endpoint serves
    pub server_name: String,
    /// Balancer attributes, not part of the identity
    #[serde(default)]
    pub attributes: Attributes,
}

impl Address {
    /// Create an unweighted address
    pub fn new(addr: impl Into<String>, server_name: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            server_name: server_name.into(),
            attributes: Attributes::default(),
        }
    }

    /// Create an address from its host and port parts
    pub fn from_parts(host: &str, port: u16, server_name: impl Into<String>) -> Self {
        let addr = if host.contains(':') && !host.starts_with('[') {
            format!("[{}]:{}", host, port)
        } else {
            format!("{}:{}", host, port)
        };
        Self::new(addr, server_name)
    }

    /// Builder-style [`set_weight`]
    pub fn with_weight(self, weight: u32) -> Self {
        set_weight(self, weight)
    }

    /// Stored weight, 0 when none was set
    pub fn weight(&self) -> u32 {
        weight(self)
    }
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        self.addr == other.addr && self.server_name == other.server_name
    }
}

impl Eq for Address {}

impl Hash for Address {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr.hash(state);
        self.server_name.hash(state);
    }
}

impl PartialOrd for Address {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Address {
    fn cmp(&self, other: &Self) -> Ordering {
        self.addr
            .cmp(&other.addr)
            .then_with(|| self.server_name.cmp(&other.server_name))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.addr)
    }
}

/// Return a copy of `address` carrying `weight`
pub fn set_weight(mut address: Address, weight: u32) -> Address {
    address.attributes.weight = Some(weight);
    address
}

/// Weight stored on `address`, or 0
pub fn weight(address: &Address) -> u32 {
    address.attributes.weight.unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_weight_defaults_to_zero() {
        let address = Address::new("10.0.0.1:9000", "orders");
        assert_eq!(weight(&address), 0);
        assert_eq!(address.attributes.weight, None);
    }

    #[test]
    fn test_set_weight_keeps_identity() {
        let plain = Address::new("10.0.0.1:9000", "orders");
        let weighted = set_weight(plain.clone(), 7);

        assert_eq!(weight(&weighted), 7);
        assert_eq!(plain, weighted);
        assert_eq!(plain.addr, weighted.addr);
        assert_eq!(plain.server_name, weighted.server_name);

        let mut set = HashSet::new();
        set.insert(plain);
        assert!(set.contains(&weighted));
    }

    #[test]
    fn test_set_weight_overwrites() {
        let address = Address::new("10.0.0.1:9000", "orders")
            .with_weight(3)
            .with_weight(0);
        assert_eq!(address.weight(), 0);
        assert_eq!(address.attributes.weight, Some(0));
    }

    #[test]
    fn test_from_parts_brackets_ipv6() {
        assert_eq!(Address::from_parts("10.0.0.1", 80, "a").addr, "10.0.0.1:80");
        assert_eq!(Address::from_parts("::1", 80, "a").addr, "[::1]:80");
    }

    #[test]
    fn test_ordering_by_addr() {
        let mut addrs = vec![
            Address::new("10.0.0.3:1", "s"),
            Address::new("10.0.0.1:1", "s"),
            Address::new("10.0.0.2:1", "s"),
        ];
        addrs.sort();
        let names: Vec<&str> = addrs.iter().map(|a| a.addr.as_str()).collect();
        assert_eq!(names, vec!["10.0.0.1:1", "10.0.0.2:1", "10.0.0.3:1"]);
    }
}
