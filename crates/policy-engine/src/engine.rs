//! 策略引擎
//!
//! 通过注册表把策略定义编译为规则列表，在全新的评估上下文中按顺序
//! 短路执行，再结合策略效果得出最终决策。

use crate::context::{EvaluationContext, StrictMode};
use crate::error::Result;
use crate::models::{Decision, Explanation, Policy, PolicySpec};
use crate::registry::{RuleRegistry, get_default_registry};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument};

/// 待评估的策略：未编译的定义（每次评估时编译）或已编译的策略
#[derive(Debug, Clone, Copy)]
pub enum PolicyRef<'p> {
    Spec(&'p PolicySpec),
    Compiled(&'p Policy),
}

impl<'p> From<&'p PolicySpec> for PolicyRef<'p> {
    fn from(spec: &'p PolicySpec) -> Self {
        Self::Spec(spec)
    }
}

impl<'p> From<&'p Policy> for PolicyRef<'p> {
    fn from(policy: &'p Policy) -> Self {
        Self::Compiled(policy)
    }
}

/// 单次评估选项
#[derive(Debug, Clone, Default)]
pub struct EvaluateOptions {
    /// 覆盖引擎默认严格模式
    pub strict: Option<StrictMode>,
    /// 注入评估时间，默认当前 UTC 时间
    pub now: Option<DateTime<Utc>>,
    /// 是否生成解释
    pub explain: bool,
}

impl EvaluateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strict(mut self, strict: StrictMode) -> Self {
        self.strict = Some(strict);
        self
    }

    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    pub fn with_explain(mut self) -> Self {
        self.explain = true;
        self
    }
}

/// 策略引擎
///
/// 自身无可变状态，可在线程间共享。
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    registry: Arc<RuleRegistry>,
    strict: StrictMode,
}

impl PolicyEngine {
    /// 使用默认注册表和默认严格模式（warn）
    pub fn new() -> Self {
        Self::with_registry(get_default_registry())
    }

    pub fn with_registry(registry: Arc<RuleRegistry>) -> Self {
        Self {
            registry,
            strict: StrictMode::default(),
        }
    }

    /// 设置引擎默认严格模式
    pub fn with_strict(mut self, strict: StrictMode) -> Self {
        self.strict = strict;
        self
    }

    pub fn registry(&self) -> &Arc<RuleRegistry> {
        &self.registry
    }

    pub fn strict(&self) -> StrictMode {
        self.strict
    }

    /// 编译策略定义
    ///
    /// 按顺序构造每条规则，任何构造失败都会中止编译。
    #[instrument(skip(self, spec), fields(policy = %spec.name, rule_count = spec.rules.len()))]
    pub fn compile(&self, spec: &PolicySpec) -> Result<Policy> {
        let rules = spec
            .rules
            .iter()
            .map(|rule_spec| self.registry.create(rule_spec))
            .collect::<Result<Vec<_>>>()?;

        debug!("策略编译完成");
        Ok(Policy::new(spec.name.clone(), spec.effect, rules))
    }

    /// 评估策略
    ///
    /// 规则按顺序求值，遇到第一条不匹配的规则即停止；请求解释时，
    /// 解释列表只包含已求值的规则（含第一条不匹配的规则）。
    pub fn evaluate<'p>(
        &self,
        policy: impl Into<PolicyRef<'p>>,
        input: &Value,
        options: EvaluateOptions,
    ) -> Result<Decision> {
        let now = options.now.unwrap_or_else(Utc::now);
        let strict = options.strict.unwrap_or(self.strict);

        match policy.into() {
            PolicyRef::Spec(spec) => {
                let compiled = self.compile(spec)?;
                self.run(&compiled, input, now, strict, options.explain)
            }
            PolicyRef::Compiled(compiled) => self.run(compiled, input, now, strict, options.explain),
        }
    }

    /// `evaluate(.., explain)` 的简写，只返回解释
    pub fn explain<'p>(
        &self,
        policy: impl Into<PolicyRef<'p>>,
        input: &Value,
        strict: Option<StrictMode>,
    ) -> Result<Explanation> {
        let options = EvaluateOptions {
            strict,
            now: None,
            explain: true,
        };
        let decision = self.evaluate(policy, input, options)?;
        Ok(decision.explanation.unwrap_or_default())
    }

    #[instrument(skip_all, fields(policy = %policy.name, strict = %strict))]
    fn run(
        &self,
        policy: &Policy,
        input: &Value,
        now: DateTime<Utc>,
        strict: StrictMode,
        explain: bool,
    ) -> Result<Decision> {
        let mut ctx = EvaluationContext::new(input, now, strict);

        let mut matched = true;
        let mut details = Vec::new();
        for rule in &policy.rules {
            // 解释模式下从解释中取结果，保证每条规则只执行一次
            let result = if explain {
                let explanation = rule.explain(&mut ctx)?;
                let result = explanation.result;
                details.push(explanation);
                result
            } else {
                rule.evaluate(&mut ctx)?
            };

            if !result {
                matched = false;
                break;
            }
        }

        let allowed = policy.effect.apply(matched);
        debug!(matched, allowed, effect = %policy.effect, "策略评估完成");

        let explanation = explain.then(|| Explanation {
            matched,
            effect: policy.effect,
            metrics: ctx.metrics().clone(),
            rules: details,
        });

        Ok(Decision {
            allowed,
            policy: policy.name.clone(),
            effect: policy.effect,
            matched,
            explanation,
        })
    }
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self::new()
    }
}
