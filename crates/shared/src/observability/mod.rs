//! 统一可观测性模块
//!
//! 所有二进制通过单一入口初始化日志，日志统一写入 stderr，
//! stdout 留给决策输出。

pub mod tracing;

pub use self::tracing::{build_filter, init};
pub use crate::config::ObservabilityConfig;
