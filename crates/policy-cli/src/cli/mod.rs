//! CLI 模块
//!
//! - `evaluate` - 加载策略并对输入求值
//!
//! # 使用示例
//!
//! ```bash
//! # 内联策略
//! policyeval evaluate --policy '{"name": "p", "rules": []}' --input '{}'
//!
//! # 文件策略，输出解释
//! policyeval evaluate -p admin.json -i '{"user": {"role": "admin"}}' --explain --base-dir policies
//! ```

pub mod commands;
pub mod runner;

pub use commands::{Cli, Commands};
pub use runner::{CommandRunner, EXIT_DENIED, Outcome};
