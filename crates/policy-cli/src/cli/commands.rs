//! CLI 命令定义
//!
//! 使用 clap derive 宏定义命令行接口结构。

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// 策略评估命令行工具
///
/// 加载声明式策略，对 JSON 输入给出 allow / deny 决策。
#[derive(Parser, Debug)]
#[command(name = "policyeval")]
#[command(version, about = "策略决策评估工具")]
#[command(propagate_version = true)]
pub struct Cli {
    /// 日志级别 (trace, debug, info, warn, error)，覆盖配置文件
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// 子命令枚举
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 评估策略
    ///
    /// 放行时退出码为 0，拒绝时为 3，加载或评估失败时为 1。
    Evaluate {
        /// 策略文件路径或内联 JSON
        #[arg(short, long)]
        policy: String,

        /// 输入数据（内联 JSON）
        #[arg(short, long)]
        input: String,

        /// 缺值处理模式，默认取配置 engine.strict_mode
        #[arg(long, value_parser = ["off", "warn", "raise"])]
        strict: Option<String>,

        /// 输出求值解释而不是 allow / deny
        #[arg(long)]
        explain: bool,

        /// 相对策略路径的解析目录
        #[arg(long)]
        base_dir: Option<PathBuf>,
    },
}
