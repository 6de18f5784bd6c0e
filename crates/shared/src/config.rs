//! 配置管理模块
//!
//! 配置文件分层加载，环境变量覆盖。

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// 环境变量前缀，如 POLICYEVAL_ENGINE__STRICT_MODE -> engine.strict_mode
pub const ENV_PREFIX: &str = "POLICYEVAL";

/// 允许的缺值处理模式
pub const STRICT_MODES: [&str; 3] = ["off", "warn", "raise"];

/// 引擎配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 缺值处理模式：off、warn 或 raise
    pub strict_mode: String,
}

impl EngineConfig {
    /// 校验 strict_mode 取值（忽略大小写与首尾空白）
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mode = self.strict_mode.trim().to_lowercase();
        if STRICT_MODES.contains(&mode.as_str()) {
            Ok(())
        } else {
            Err(ConfigError::Message(format!(
                "engine.strict_mode 必须为 off|warn|raise，实际为 '{}'",
                self.strict_mode
            )))
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            strict_mode: "warn".to_string(),
        }
    }
}

/// 可观测性配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_level: String,
    /// 日志输出格式：json（结构化）或 pretty（人类可读）
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

impl ObservabilityConfig {
    pub fn is_json(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }
}

/// 应用配置
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub service_name: String,
    pub environment: String,
    pub engine: EngineConfig,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// 加载顺序（后加载的会覆盖先加载的同名配置项）：
    /// 1. config/default.toml（默认配置）
    /// 2. config/{environment}.toml（环境特定配置，由 POLICYEVAL_ENV 指定）
    /// 3. config/{service_name}.toml（服务特定配置）
    /// 4. 环境变量（POLICYEVAL_ 前缀，层级以 `__` 分隔）
    pub fn load(service_name: &str) -> Result<Self, ConfigError> {
        let env = std::env::var("POLICYEVAL_ENV").unwrap_or_else(|_| "development".to_string());
        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string());

        Self::load_from(Path::new(&config_dir), &env, service_name)
    }

    /// 从指定目录加载配置
    pub fn load_from(config_dir: &Path, env: &str, service_name: &str) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .set_default("service_name", service_name)?
            .set_default("environment", env)?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join(format!("{}.toml", env))).required(false))
            .add_source(
                File::from(config_dir.join(format!("{}.toml", service_name))).required(false),
            )
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            );

        let config: Self = builder.build()?.try_deserialize()?;
        config.engine.validate()?;
        Ok(config)
    }

    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
