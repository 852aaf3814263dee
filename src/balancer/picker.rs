//! Balancer contracts shared with the RPC framework
//!
//! The framework owns the connections. Whenever its set of ready connections
//! changes it calls a [`PickerBuilder`] and swaps in the resulting [`Picker`];
//! every outbound call then asks the current picker for a connection.

use crate::address::Address;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Errors returned from [`Picker::pick`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PickError {
    /// The ready set was empty when the picker was built
    #[error("no connection available")]
    NoConnectionAvailable,

    /// The weights of the ready set do not fit in a u32
    #[error("total weight exceeds the max u32")]
    TotalWeightExceedsLimit,
}

/// Opaque handle to a framework-owned connection
pub trait SubConn: fmt::Debug + Send + Sync {
    /// Stable identity assigned by the framework
    fn id(&self) -> u64;
}

pub type SubConnRef = Arc<dyn SubConn>;

/// A ready connection and the address it was resolved from
#[derive(Debug, Clone)]
pub struct ReadySubConn {
    pub sub_conn: SubConnRef,
    pub address: Address,
}

impl ReadySubConn {
    pub fn new(sub_conn: SubConnRef, address: Address) -> Self {
        Self { sub_conn, address }
    }
}

/// Input to [`PickerBuilder::build`]
#[derive(Debug, Clone, Default)]
pub struct PickerBuildInfo {
    pub ready: Vec<ReadySubConn>,
}

impl PickerBuildInfo {
    pub fn new(ready: Vec<ReadySubConn>) -> Self {
        Self { ready }
    }
}

/// Per-call context handed to a picker
#[derive(Debug, Clone, Copy, Default)]
pub struct PickInfo<'a> {
    /// Fully qualified method of the outbound call, e.g. `/pkg.Svc/Method`
    pub full_method_name: &'a str,
}

/// The connection chosen for one call
#[derive(Debug, Clone)]
pub struct PickResult {
    pub sub_conn: SubConnRef,
}

/// Per-request connection selection.
///
/// Implementations run on the request path: they must not block on I/O and
/// must hold any internal lock only for the duration of the selection.
pub trait Picker: Send + Sync {
    fn pick(&self, info: &PickInfo<'_>) -> Result<PickResult, PickError>;
}

/// Turns a ready set into a fresh, immutable [`Picker`]
pub trait PickerBuilder: Send + Sync {
    /// Balancer name used for registration
    fn name(&self) -> &'static str;

    /// Build a picker; failures are expressed as a picker that always errors
    fn build(&self, info: PickerBuildInfo) -> Arc<dyn Picker>;
}

/// A picker that fails every call with the same error
#[derive(Debug, Clone)]
pub struct ErrPicker {
    err: PickError,
}

impl ErrPicker {
    pub fn new(err: PickError) -> Self {
        Self { err }
    }
}

impl Picker for ErrPicker {
    fn pick(&self, _info: &PickInfo<'_>) -> Result<PickResult, PickError> {
        Err(self.err.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_err_picker_repeats_error() {
        let picker = ErrPicker::new(PickError::TotalWeightExceedsLimit);
        for _ in 0..3 {
            let err = picker.pick(&PickInfo::default()).unwrap_err();
            assert_eq!(err, PickError::TotalWeightExceedsLimit);
        }
    }

    #[test]
    fn test_pick_error_display() {
        assert_eq!(
            PickError::NoConnectionAvailable.to_string(),
            "no connection available"
        );
        assert_ne!(
            PickError::NoConnectionAvailable,
            PickError::TotalWeightExceedsLimit
        );
    }
}
