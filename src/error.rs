use std::fmt;
use thiserror::Error;

use crate::balancer::PickError;
use crate::resolver::ResolveError;
use crate::service_discovery::ServiceDiscoveryError;
use crate::target::TargetError;

/// Crate-level error covering every layer of name resolution and balancing
#[derive(Error, Debug, Clone)]
pub enum NamingError {
    /// Configuration related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Target string could not be decoded or validated
    #[error("Target error: {0}")]
    Target(#[from] TargetError),

    /// Registry could not be reached or answered with an error
    #[error("Registry error: {message}")]
    Registry { message: String },

    /// Registry answered but no instance can take traffic
    #[error("No valid instance for service {service_name}")]
    NoInstances { service_name: String },

    /// Picker could not hand out a connection
    #[error("Balancer error: {0}")]
    Balancer(#[from] PickError),

    /// No resolver or balancer registered under the requested name
    #[error("No {kind} registered for '{name}'")]
    NotRegistered { kind: &'static str, name: String },

    /// Internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl NamingError {
    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a registry error
    pub fn registry<S: Into<String>>(message: S) -> Self {
        Self::Registry {
            message: message.into(),
        }
    }

    /// Create an error for a missing resolver or balancer registration
    pub fn not_registered<S: Into<String>>(kind: &'static str, name: S) -> Self {
        Self::NotRegistered {
            kind,
            name: name.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            NamingError::Config { .. } => ErrorSeverity::Critical,
            NamingError::Target(_) => ErrorSeverity::Critical,
            NamingError::NotRegistered { .. } => ErrorSeverity::Critical,
            NamingError::Balancer(PickError::TotalWeightExceedsLimit) => ErrorSeverity::High,
            NamingError::Balancer(PickError::NoConnectionAvailable) => ErrorSeverity::Medium,
            NamingError::Internal { .. } => ErrorSeverity::High,
            NamingError::Registry { .. } => ErrorSeverity::Medium,
            NamingError::NoInstances { .. } => ErrorSeverity::Medium,
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Medium = 1,
    High = 2,
    Critical = 3,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSeverity::Medium => write!(f, "MEDIUM"),
            ErrorSeverity::High => write!(f, "HIGH"),
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Result type alias for naming operations
pub type NamingResult<T> = Result<T, NamingError>;

impl From<ServiceDiscoveryError> for NamingError {
    fn from(err: ServiceDiscoveryError) -> Self {
        match err {
            ServiceDiscoveryError::ConfigurationError(message) => NamingError::config(message),
            other => NamingError::registry(other.to_string()),
        }
    }
}

impl From<ResolveError> for NamingError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::Target(e) => NamingError::Target(e),
            ResolveError::Registry(e) => e.into(),
            ResolveError::NoInstances { service_name } => NamingError::NoInstances { service_name },
            err @ ResolveError::NoRuntime => NamingError::internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let config_err = NamingError::config("Invalid registry");
        assert!(matches!(config_err, NamingError::Config { .. }));
        assert_eq!(config_err.to_string(), "Configuration error: Invalid registry");

        let registry_err = NamingError::registry("Connection refused");
        assert_eq!(registry_err.to_string(), "Registry error: Connection refused");

        let missing = NamingError::not_registered("resolver", "dns");
        assert_eq!(missing.to_string(), "No resolver registered for 'dns'");
    }

    #[test]
    fn test_error_properties() {
        let registry_err = NamingError::registry("timeout");
        assert_eq!(registry_err.severity(), ErrorSeverity::Medium);

        let target_err: NamingError = TargetError::MissingServiceName.into();
        assert_eq!(target_err.severity(), ErrorSeverity::Critical);

        let overflow: NamingError = PickError::TotalWeightExceedsLimit.into();
        assert_eq!(overflow.severity(), ErrorSeverity::High);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(ErrorSeverity::Critical > ErrorSeverity::High);
        assert!(ErrorSeverity::High > ErrorSeverity::Medium);
        assert_eq!(ErrorSeverity::Critical.to_string(), "CRITICAL");
    }

    #[test]
    fn test_error_conversions() {
        let resolve_err = ResolveError::NoInstances {
            service_name: "orders".to_string(),
        };
        let naming_error: NamingError = resolve_err.into();
        assert!(matches!(naming_error, NamingError::NoInstances { .. }));

        let discovery_err = ServiceDiscoveryError::ConfigurationError("bad url".to_string());
        let naming_error: NamingError = ResolveError::Registry(discovery_err).into();
        assert!(matches!(naming_error, NamingError::Config { .. }));

        let naming_error: NamingError = ResolveError::NoRuntime.into();
        assert!(matches!(naming_error, NamingError::Internal { .. }));
    }
}
