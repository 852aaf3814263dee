//! # Balancer module
//!
//! Client-side balancing over the connections the RPC framework keeps ready.
//!
//! - [`picker`]: the picker / picker-builder contracts and the connection handle
//! - [`weighted_round_robin`]: weighted round robin picker and its builder
//! - [`load_balancer`]: a holder that swaps pickers wholesale on every rebuild
//!
//! ```rust
//! use std::sync::Arc;
//! use nacos_naming::address::Address;
//! use nacos_naming::balancer::{
//!     Balancer, PickInfo, ReadySubConn, SubConn, WeightedRoundRobinBuilder,
//! };
//!
//! #[derive(Debug)]
//! struct Conn(u64);
//! impl SubConn for Conn {
//!     fn id(&self) -> u64 { self.0 }
//! }
//!
//! let balancer = Balancer::new(Arc::new(WeightedRoundRobinBuilder::new()));
//! balancer.update_ready(vec![ReadySubConn::new(
//!     Arc::new(Conn(1)),
//!     Address::new("10.0.0.1:9000", "orders").with_weight(10),
//! )]);
//! assert_eq!(balancer.pick(&PickInfo::default()).unwrap().sub_conn.id(), 1);
//! ```

pub mod load_balancer;
pub mod picker;
pub mod state;
pub mod weighted_round_robin;

pub use load_balancer::Balancer;
pub use picker::{
    ErrPicker, PickError, PickInfo, PickResult, Picker, PickerBuildInfo, PickerBuilder,
    ReadySubConn, SubConn, SubConnRef,
};
pub use state::WeightBucket;
pub use weighted_round_robin::{WeightedRoundRobinBuilder, WeightedRoundRobinPicker};
