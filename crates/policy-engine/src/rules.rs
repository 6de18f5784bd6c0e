//! 规则抽象与内置规则
//!
//! 规则是编译后不可变的谓词树节点，在 [`EvaluationContext`] 上求值。
//! 内置类型：compare、all、any、not、truthy；自定义类型通过
//! [`RuleRegistry`](crate::registry::RuleRegistry) 注册。

use crate::context::{EvaluationContext, METRIC_RULE_EVAL};
use crate::error::{PolicyError, Result};
use crate::evaluator::ConditionEvaluator;
use crate::registry::RuleRegistry;
use crate::utils::{deep_get, is_truthy};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

/// 规则（谓词树节点）
///
/// 实现必须是不可变的：同一个编译好的规则会被多个评估并发共享，
/// 所有评估期状态都放在上下文中。
pub trait Rule: fmt::Debug + Send + Sync {
    /// 规则类型名，对应规则定义中的 `type`
    fn type_name(&self) -> &str;

    /// 在上下文上求值
    fn evaluate(&self, ctx: &mut EvaluationContext<'_>) -> Result<bool>;

    /// 求值并返回结构化解释
    ///
    /// 默认只包含 `type` 和 `result`。
    fn explain(&self, ctx: &mut EvaluationContext<'_>) -> Result<RuleExplanation> {
        let result = self.evaluate(ctx)?;
        Ok(RuleExplanation::new(self.type_name(), result))
    }
}

/// 单条规则的解释
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleExplanation {
    #[serde(rename = "type")]
    pub rule_type: String,
    pub result: bool,
    /// 规则类型特有的附加字段
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl RuleExplanation {
    pub fn new(rule_type: impl Into<String>, result: bool) -> Self {
        Self {
            rule_type: rule_type.into(),
            result,
            details: Map::new(),
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// 转为普通 JSON 对象
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("type".to_string(), Value::String(self.rule_type.clone()));
        map.insert("result".to_string(), Value::Bool(self.result));
        for (k, v) in &self.details {
            map.insert(k.clone(), v.clone());
        }
        Value::Object(map)
    }
}

// ==================== compare ====================

/// 比较规则：取路径上的值与期望值按操作符比较
///
/// 操作符在求值时才解析，未知操作符在求值期报错。
#[derive(Debug, Clone, PartialEq)]
pub struct CompareRule {
    pub path: String,
    pub op: String,
    pub value: Value,
}

impl CompareRule {
    pub const TYPE: &'static str = "compare";

    pub fn new(path: impl Into<String>, op: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            path: path.into(),
            op: op.into(),
            value: value.into(),
        }
    }

    /// 从规则定义解析
    pub fn parse(spec: &Map<String, Value>) -> Result<Self> {
        let path = non_empty_str(spec, "path")
            .ok_or_else(|| PolicyError::Syntax("compare rule requires non-empty 'path'".into()))?;
        let op = non_empty_str(spec, "op")
            .ok_or_else(|| PolicyError::Syntax("compare rule requires non-empty 'op'".into()))?;
        let value = spec.get("value").cloned().unwrap_or(Value::Null);

        Ok(Self::new(path, op, value))
    }

    /// 求值并返回实际取到的值
    fn resolve<'a>(&self, ctx: &mut EvaluationContext<'a>) -> Result<(Option<&'a Value>, bool)> {
        ctx.bump(METRIC_RULE_EVAL);

        let actual = ctx.lookup(&self.path).filter(|v| !v.is_null());
        let Some(actual) = actual else {
            // 路径缺值时 exists 直接不成立，不受严格模式影响
            if self.op == "exists" {
                return Ok((None, false));
            }
            return ctx.handle_missing(&self.path).map(|r| (None, r));
        };

        let operator = self.op.parse()?;
        let matched = ConditionEvaluator::evaluate(actual, operator, &self.value)?;
        Ok((Some(actual), matched))
    }
}

impl Rule for CompareRule {
    fn type_name(&self) -> &str {
        Self::TYPE
    }

    fn evaluate(&self, ctx: &mut EvaluationContext<'_>) -> Result<bool> {
        self.resolve(ctx).map(|(_, matched)| matched)
    }

    fn explain(&self, ctx: &mut EvaluationContext<'_>) -> Result<RuleExplanation> {
        let (actual, result) = self.resolve(ctx)?;
        Ok(RuleExplanation::new(Self::TYPE, result)
            .with_detail("path", self.path.clone())
            .with_detail("op", self.op.clone())
            .with_detail("value", self.value.clone())
            .with_detail("actual", actual.cloned().unwrap_or(Value::Null)))
    }
}

// ==================== all / any ====================

/// 逻辑与：按顺序求值，遇到 false 短路；空列表为 true
#[derive(Debug)]
pub struct AllRule {
    pub rules: Vec<Box<dyn Rule>>,
}

impl AllRule {
    pub const TYPE: &'static str = "all";

    pub fn new(rules: Vec<Box<dyn Rule>>) -> Self {
        Self { rules }
    }

    pub fn parse(spec: &Map<String, Value>, registry: &RuleRegistry) -> Result<Self> {
        parse_children(spec, registry, Self::TYPE).map(Self::new)
    }
}

impl Rule for AllRule {
    fn type_name(&self) -> &str {
        Self::TYPE
    }

    fn evaluate(&self, ctx: &mut EvaluationContext<'_>) -> Result<bool> {
        for rule in &self.rules {
            if !rule.evaluate(ctx)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn explain(&self, ctx: &mut EvaluationContext<'_>) -> Result<RuleExplanation> {
        let (result, children) = explain_children(&self.rules, ctx, false)?;
        Ok(RuleExplanation::new(Self::TYPE, result).with_detail("rules", children))
    }
}

/// 逻辑或：按顺序求值，遇到 true 短路；空列表为 false
#[derive(Debug)]
pub struct AnyRule {
    pub rules: Vec<Box<dyn Rule>>,
}

impl AnyRule {
    pub const TYPE: &'static str = "any";

    pub fn new(rules: Vec<Box<dyn Rule>>) -> Self {
        Self { rules }
    }

    pub fn parse(spec: &Map<String, Value>, registry: &RuleRegistry) -> Result<Self> {
        parse_children(spec, registry, Self::TYPE).map(Self::new)
    }
}

impl Rule for AnyRule {
    fn type_name(&self) -> &str {
        Self::TYPE
    }

    fn evaluate(&self, ctx: &mut EvaluationContext<'_>) -> Result<bool> {
        for rule in &self.rules {
            if rule.evaluate(ctx)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn explain(&self, ctx: &mut EvaluationContext<'_>) -> Result<RuleExplanation> {
        let (result, children) = explain_children(&self.rules, ctx, true)?;
        Ok(RuleExplanation::new(Self::TYPE, result).with_detail("rules", children))
    }
}

/// 依次解释子规则，在 `stop_on` 结果处短路
///
/// 返回组合结果与已求值子规则的解释列表。
fn explain_children(
    rules: &[Box<dyn Rule>],
    ctx: &mut EvaluationContext<'_>,
    stop_on: bool,
) -> Result<(bool, Vec<Value>)> {
    let mut children = Vec::with_capacity(rules.len());
    for rule in rules {
        let explanation = rule.explain(ctx)?;
        let result = explanation.result;
        children.push(explanation.to_value());
        if result == stop_on {
            return Ok((stop_on, children));
        }
    }
    Ok((!stop_on, children))
}

fn parse_children(
    spec: &Map<String, Value>,
    registry: &RuleRegistry,
    type_name: &str,
) -> Result<Vec<Box<dyn Rule>>> {
    match spec.get("rules") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items.iter().map(|s| registry.create(s)).collect(),
        Some(_) => Err(PolicyError::Syntax(format!(
            "{} rule requires list 'rules'",
            type_name
        ))),
    }
}

// ==================== not ====================

/// 逻辑非
#[derive(Debug)]
pub struct NotRule {
    pub rule: Box<dyn Rule>,
}

impl NotRule {
    pub const TYPE: &'static str = "not";

    pub fn new(rule: Box<dyn Rule>) -> Self {
        Self { rule }
    }

    pub fn parse(spec: &Map<String, Value>, registry: &RuleRegistry) -> Result<Self> {
        match spec.get("rule") {
            Some(inner @ Value::Object(_)) => registry.create(inner).map(Self::new),
            _ => Err(PolicyError::Syntax("not rule requires dict 'rule'".into())),
        }
    }
}

impl Rule for NotRule {
    fn type_name(&self) -> &str {
        Self::TYPE
    }

    fn evaluate(&self, ctx: &mut EvaluationContext<'_>) -> Result<bool> {
        self.rule.evaluate(ctx).map(|r| !r)
    }

    fn explain(&self, ctx: &mut EvaluationContext<'_>) -> Result<RuleExplanation> {
        let inner = self.rule.explain(ctx)?;
        Ok(RuleExplanation::new(Self::TYPE, !inner.result).with_detail("rule", inner.to_value()))
    }
}

// ==================== truthy ====================

/// 真值规则：路径上的值按 [`is_truthy`] 判断
#[derive(Debug, Clone, PartialEq)]
pub struct TruthyPathRule {
    pub path: String,
}

impl TruthyPathRule {
    pub const TYPE: &'static str = "truthy";

    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    pub fn parse(spec: &Map<String, Value>) -> Result<Self> {
        non_empty_str(spec, "path")
            .map(Self::new)
            .ok_or_else(|| PolicyError::Syntax("truthy rule requires non-empty 'path'".into()))
    }

    fn resolve<'a>(&self, ctx: &mut EvaluationContext<'a>) -> Result<(Option<&'a Value>, bool)> {
        match deep_get(ctx.input(), &self.path).filter(|v| !v.is_null()) {
            Some(value) => Ok((Some(value), is_truthy(value))),
            None => ctx.handle_missing(&self.path).map(|r| (None, r)),
        }
    }
}

impl Rule for TruthyPathRule {
    fn type_name(&self) -> &str {
        Self::TYPE
    }

    fn evaluate(&self, ctx: &mut EvaluationContext<'_>) -> Result<bool> {
        self.resolve(ctx).map(|(_, result)| result)
    }

    fn explain(&self, ctx: &mut EvaluationContext<'_>) -> Result<RuleExplanation> {
        let (actual, result) = self.resolve(ctx)?;
        Ok(RuleExplanation::new(Self::TYPE, result)
            .with_detail("path", self.path.clone())
            .with_detail("actual", actual.cloned().unwrap_or(Value::Null)))
    }
}

fn non_empty_str<'s>(spec: &'s Map<String, Value>, key: &str) -> Option<&'s str> {
    spec.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}
