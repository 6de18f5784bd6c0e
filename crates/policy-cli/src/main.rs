//! policyeval 命令行入口
//!
//! 退出码：0 放行，3 拒绝，2 用法错误，1 加载或评估失败。

use clap::Parser;
use policy_cli::SERVICE_NAME;
use policy_cli::cli::{Cli, CommandRunner};
use policy_shared::{AppConfig, observability};
use std::process::ExitCode;
use tracing::error;

fn main() -> ExitCode {
    // 用法错误由 clap 打印并以 2 退出
    let cli = Cli::parse();

    let mut config = AppConfig::load(SERVICE_NAME).unwrap_or_else(|e| {
        eprintln!("配置加载失败，使用默认配置: {}", e);
        AppConfig::default()
    });
    if let Some(level) = &cli.log_level {
        config.observability.log_level = level.clone();
    }

    if let Err(e) = observability::init(&config.observability) {
        eprintln!("{:#}", e);
    }

    let runner = CommandRunner::new(&config);
    match runner.run(cli.command) {
        Ok(outcome) => {
            println!("{}", outcome.output);
            outcome.exit_code()
        }
        Err(e) => {
            error!(error = %format!("{:#}", e), "命令执行失败");
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
