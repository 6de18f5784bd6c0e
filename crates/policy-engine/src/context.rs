//! 评估上下文
//!
//! 每次评估独占一个上下文，承载输入数据、路径缓存、中间变量与计数指标。

use crate::error::{PolicyError, Result};
use crate::utils::{deep_get, normalize_key};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// 每次规则求值的计数指标
pub const METRIC_RULE_EVAL: &str = "rule_eval";
/// 缺值被容忍的次数（仅 warn 模式）
pub const METRIC_MISSING: &str = "missing";

/// 严格模式：决定路径取不到值时的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrictMode {
    /// 静默返回 false
    Off,
    /// 返回 false 并累加 `missing` 指标
    #[default]
    Warn,
    /// 直接报错
    Raise,
}

impl fmt::Display for StrictMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Off => "off",
            Self::Warn => "warn",
            Self::Raise => "raise",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for StrictMode {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "warn" => Ok(Self::Warn),
            "raise" => Ok(Self::Raise),
            other => Err(PolicyError::Load(format!(
                "strict 模式必须为 off|warn|raise，实际为 '{}'",
                other
            ))),
        }
    }
}

/// 评估上下文
///
/// 借用输入数据，路径缓存直接保存对输入的引用，避免重复拷贝。
#[derive(Debug, Clone)]
pub struct EvaluationContext<'a> {
    input: &'a Value,
    vars: HashMap<String, Value>,
    cache: HashMap<String, Option<&'a Value>>,
    metrics: BTreeMap<String, i64>,
    now: DateTime<Utc>,
    strict: StrictMode,
}

impl<'a> EvaluationContext<'a> {
    pub fn new(input: &'a Value, now: DateTime<Utc>, strict: StrictMode) -> Self {
        Self {
            input,
            vars: HashMap::new(),
            cache: HashMap::new(),
            metrics: BTreeMap::new(),
            now,
            strict,
        }
    }

    /// 以当前时间和默认严格模式创建
    pub fn from_input(input: &'a Value) -> Self {
        Self::new(input, Utc::now(), StrictMode::default())
    }

    pub fn input(&self) -> &'a Value {
        self.input
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn strict(&self) -> StrictMode {
        self.strict
    }

    /// 带缓存的路径取值
    ///
    /// 同一上下文内相同路径只解析一次，缓存键为 `path:<path>`。
    pub fn lookup(&mut self, path: &str) -> Option<&'a Value> {
        let input = self.input;
        *self
            .cache
            .entry(format!("path:{}", path))
            .or_insert_with(|| deep_get(input, path))
    }

    pub fn is_cached(&self, path: &str) -> bool {
        self.cache.contains_key(&format!("path:{}", path))
    }

    pub fn get_var(&self, key: &str) -> Option<&Value> {
        self.vars.get(&normalize_key(key))
    }

    pub fn get_var_or<'s>(&'s self, key: &str, default: &'s Value) -> &'s Value {
        self.get_var(key).unwrap_or(default)
    }

    pub fn set_var(&mut self, key: &str, value: impl Into<Value>) {
        self.vars.insert(normalize_key(key), value.into());
    }

    /// 指标加一
    pub fn bump(&mut self, metric: &str) {
        self.bump_by(metric, 1);
    }

    /// 指标累加指定数值，缺失的指标从 0 开始
    pub fn bump_by(&mut self, metric: &str, amount: i64) {
        *self.metrics.entry(normalize_key(metric)).or_insert(0) += amount;
    }

    pub fn metric(&self, metric: &str) -> i64 {
        self.metrics.get(&normalize_key(metric)).copied().unwrap_or(0)
    }

    pub fn metrics(&self) -> &BTreeMap<String, i64> {
        &self.metrics
    }

    /// 按严格模式处理缺值
    ///
    /// raise 报错；warn 与 off 都返回 false，只有 warn 记录 `missing` 指标。
    pub fn handle_missing(&mut self, path: &str) -> Result<bool> {
        match self.strict {
            StrictMode::Raise => Err(PolicyError::Evaluation(format!(
                "Missing value at path '{}'",
                path
            ))),
            StrictMode::Warn => {
                warn!(path = %path, "路径缺值，按 false 处理");
                self.bump(METRIC_MISSING);
                Ok(false)
            }
            StrictMode::Off => Ok(false),
        }
    }
}
