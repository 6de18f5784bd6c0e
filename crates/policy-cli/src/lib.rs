//! 策略评估命令行工具库
//!
//! 命令定义与执行逻辑，供 `policyeval` 二进制使用。

pub mod cli;

/// 配置加载时使用的服务名
pub const SERVICE_NAME: &str = "policyeval";
