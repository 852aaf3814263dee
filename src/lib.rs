//! # nacos-naming
//!
//! Client-side service discovery backed by a Nacos registry, plus a weighted
//! round robin balancer for RPC clients.
//!
//! ## 核心功能
//!
//! - **目标编码**: 一个连接字符串描述注册中心、服务、集群、分组、命名空间和模式
//! - **服务解析**: 轮询或订阅注册中心，输出带权重的地址集合
//! - **加权轮询**: 按实例权重分配请求，权重为零时退化为普通轮询
//! - **注册表**: 按 scheme 注册解析器，按名称注册负载均衡器
//!
//! ## 使用示例
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use nacos_naming::resolver::{ClientConn, ResolveError, ResolvedState};
//! use nacos_naming::target::{self, TargetOption};
//! use nacos_naming::registry;
//!
//! struct LogConn;
//!
//! impl ClientConn for LogConn {
//!     fn update_state(&self, state: ResolvedState) {
//!         println!("{} addresses", state.addresses.len());
//!     }
//!     fn report_error(&self, error: ResolveError) {
//!         eprintln!("{}", error);
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     registry::init();
//!     let uri = target::encode("127.0.0.1:8848", "", "", "orders", Vec::<TargetOption>::new());
//!     let resolver = registry::build_resolver(&uri, Arc::new(LogConn))?;
//!     tokio::signal::ctrl_c().await?;
//!     resolver.close();
//!     Ok(())
//! }
//! ```

pub mod address;
pub mod balancer;
pub mod config;
pub mod error;
pub mod random;
pub mod registry;
pub mod resolver;
pub mod service_discovery;
pub mod target;

// Re-export commonly used types
pub use address::{Address, Attributes};
pub use balancer::{Balancer, WeightedRoundRobinBuilder};
pub use config::NamingConfig;
pub use error::{ErrorSeverity, NamingError, NamingResult};
pub use resolver::{ClientConn, NacosResolverBuilder, ResolveError, ResolvedState, Resolver};
pub use service_discovery::{InMemoryNamingClient, NacosNamingClient, NamingClient};
pub use target::{Target, TargetError, TargetOption};
