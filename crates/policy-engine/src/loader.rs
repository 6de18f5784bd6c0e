//! 策略加载器
//!
//! 从 JSON 值、JSON 文本或文件加载策略定义并校验结构，产出
//! [`PolicySpec`]。每条规则定义会先经注册表构造一次，
//! 保证交给引擎的策略都能编译。

use crate::error::{PolicyError, Result};
use crate::models::{Effect, PolicySpec};
use crate::registry::{RuleRegistry, get_default_registry};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, instrument};

/// 策略来源
#[derive(Debug, Clone, Copy)]
pub enum PolicySource<'a> {
    /// 已解析的 JSON 值
    Json(&'a Value),
    /// 内联 JSON 文本或文件路径：去除空白后以 `{` 开头视为 JSON
    Text(&'a str),
    /// 文件路径
    File(&'a Path),
}

impl<'a> From<&'a Value> for PolicySource<'a> {
    fn from(value: &'a Value) -> Self {
        Self::Json(value)
    }
}

impl<'a> From<&'a str> for PolicySource<'a> {
    fn from(text: &'a str) -> Self {
        Self::Text(text)
    }
}

impl<'a> From<&'a Path> for PolicySource<'a> {
    fn from(path: &'a Path) -> Self {
        Self::File(path)
    }
}

/// 策略加载器
#[derive(Debug, Clone)]
pub struct PolicyLoader {
    registry: Arc<RuleRegistry>,
    base_dir: Option<PathBuf>,
}

impl PolicyLoader {
    pub fn new(registry: Arc<RuleRegistry>) -> Self {
        Self {
            registry,
            base_dir: None,
        }
    }

    /// 相对路径的解析基准目录
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }

    /// 加载并校验策略
    pub fn load<'a>(&self, source: impl Into<PolicySource<'a>>) -> Result<PolicySpec> {
        match source.into() {
            PolicySource::Json(value) => self.validate(value),
            PolicySource::Text(text) if text.trim_start().starts_with('{') => {
                let value: Value = serde_json::from_str(text)?;
                self.validate(&value)
            }
            PolicySource::Text(text) => self.load_file(Path::new(text)),
            PolicySource::File(path) => self.load_file(path),
        }
    }

    #[instrument(skip(self))]
    fn load_file(&self, path: &Path) -> Result<PolicySpec> {
        let path = match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        };

        debug!(path = %path.display(), "读取策略文件");
        let text = std::fs::read_to_string(&path)?;
        let value: Value = serde_json::from_str(&text)?;
        self.validate(&value)
    }

    fn validate(&self, data: &Value) -> Result<PolicySpec> {
        let data = data
            .as_object()
            .ok_or_else(|| PolicyError::Load("policy source must be a JSON object".to_string()))?;

        let name = data
            .get("name")
            .and_then(Value::as_str)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| PolicyError::Load("policy requires non-empty 'name'".to_string()))?;

        let effect = match data.get("effect") {
            None => Effect::Allow,
            Some(Value::String(s)) => s.parse()?,
            Some(_) => {
                return Err(PolicyError::Load(
                    "policy 'effect' must be 'allow' or 'deny'".to_string(),
                ));
            }
        };

        let rules = match data.get("rules") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.clone(),
            Some(_) => {
                return Err(PolicyError::Load("policy 'rules' must be a list".to_string()));
            }
        };

        // 提前构造一次，尽早暴露规则定义错误
        for spec in &rules {
            if !spec.is_object() {
                return Err(PolicyError::Load("rule spec must be a dict".to_string()));
            }
            match self.registry.create(spec) {
                Ok(_) => {}
                Err(PolicyError::Syntax(msg)) => return Err(PolicyError::Load(msg)),
                Err(e) => return Err(e),
            }
        }

        debug!(policy = %name, rule_count = rules.len(), "策略加载完成");
        Ok(PolicySpec::new(name, effect, rules))
    }
}

impl Default for PolicyLoader {
    fn default() -> Self {
        Self::new(get_default_registry())
    }
}

/// 使用默认注册表加载策略
pub fn load_policy<'a>(source: impl Into<PolicySource<'a>>) -> Result<PolicySpec> {
    PolicyLoader::default().load(source)
}
