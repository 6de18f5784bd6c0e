//! 命令执行器
//!
//! 把解析后的命令转换为对策略引擎的调用，产出待打印的文本和退出码。

use anyhow::{Context, Result};
use policy_engine::{EvaluateOptions, PolicyEngine, PolicyLoader, StrictMode};
use policy_shared::AppConfig;
use serde_json::Value;
use std::path::Path;
use std::process::ExitCode;
use tracing::{info, instrument};

use super::Commands;

/// 拒绝时的退出码
pub const EXIT_DENIED: u8 = 3;

/// 命令执行结果
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    /// 写入 stdout 的内容
    pub output: String,
    pub allowed: bool,
}

impl Outcome {
    pub fn exit_code(&self) -> ExitCode {
        if self.allowed {
            ExitCode::SUCCESS
        } else {
            ExitCode::from(EXIT_DENIED)
        }
    }
}

/// 命令执行器
pub struct CommandRunner {
    engine: PolicyEngine,
    default_strict: String,
}

impl CommandRunner {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            engine: PolicyEngine::new(),
            default_strict: config.engine.strict_mode.clone(),
        }
    }

    /// 使用指定引擎（测试时注入独立注册表）
    pub fn with_engine(engine: PolicyEngine, config: &AppConfig) -> Self {
        Self {
            engine,
            default_strict: config.engine.strict_mode.clone(),
        }
    }

    pub fn run(&self, command: Commands) -> Result<Outcome> {
        match command {
            Commands::Evaluate {
                policy,
                input,
                strict,
                explain,
                base_dir,
            } => self.run_evaluate(&policy, &input, strict.as_deref(), explain, base_dir.as_deref()),
        }
    }

    /// 加载策略并对输入求值
    #[instrument(skip(self, policy, input))]
    pub fn run_evaluate(
        &self,
        policy: &str,
        input: &str,
        strict: Option<&str>,
        explain: bool,
        base_dir: Option<&Path>,
    ) -> Result<Outcome> {
        let strict: StrictMode = strict
            .unwrap_or(self.default_strict.as_str())
            .parse()
            .context("无效的严格模式")?;

        let mut loader = PolicyLoader::new(self.engine.registry().clone());
        if let Some(dir) = base_dir {
            loader = loader.with_base_dir(dir);
        }
        let spec = loader.load(policy).context("策略加载失败")?;

        let input: Value = serde_json::from_str(input).context("输入不是合法的 JSON")?;

        let mut options = EvaluateOptions::new().with_strict(strict);
        if explain {
            options = options.with_explain();
        }
        let decision = self
            .engine
            .evaluate(&spec, &input, options)
            .context("策略评估失败")?;

        info!(
            policy = %decision.policy,
            allowed = decision.allowed,
            matched = decision.matched,
            "评估完成"
        );

        let output = match &decision.explanation {
            Some(explanation) => serde_json::to_string_pretty(&explanation.to_value())?,
            None if decision.allowed => "allow".to_string(),
            None => "deny".to_string(),
        };

        Ok(Outcome {
            output,
            allowed: decision.allowed,
        })
    }
}
