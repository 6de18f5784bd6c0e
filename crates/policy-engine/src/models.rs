//! 策略引擎领域模型

use crate::error::PolicyError;
use crate::rules::{Rule, RuleExplanation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// 策略效果：决定“全部规则匹配”如何映射为最终放行/拒绝
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    #[default]
    Allow,
    Deny,
}

impl Effect {
    /// 根据匹配结果计算是否放行
    pub fn apply(&self, matched: bool) -> bool {
        match self {
            Self::Allow => matched,
            Self::Deny => !matched,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Effect {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "allow" => Ok(Self::Allow),
            "deny" => Ok(Self::Deny),
            _ => Err(PolicyError::Load(
                "policy 'effect' must be 'allow' or 'deny'".to_string(),
            )),
        }
    }
}

/// 已校验、未编译的策略定义
///
/// 由加载器产出，也可以直接构造或反序列化。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicySpec {
    pub name: String,
    #[serde(default)]
    pub effect: Effect,
    #[serde(default)]
    pub rules: Vec<Value>,
}

impl PolicySpec {
    pub fn new(name: impl Into<String>, effect: Effect, rules: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            effect,
            rules,
        }
    }
}

/// 编译后的策略
///
/// 编译后不可变，可在多个线程间共享并反复评估。
#[derive(Debug)]
pub struct Policy {
    pub name: String,
    pub effect: Effect,
    pub rules: Vec<Box<dyn Rule>>,
}

impl Policy {
    pub fn new(name: impl Into<String>, effect: Effect, rules: Vec<Box<dyn Rule>>) -> Self {
        Self {
            name: name.into(),
            effect,
            rules,
        }
    }
}

/// 评估解释
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Explanation {
    pub matched: bool,
    pub effect: Effect,
    /// 评估结束时的指标快照
    pub metrics: BTreeMap<String, i64>,
    /// 已求值规则的解释，止于第一条不匹配的规则
    pub rules: Vec<RuleExplanation>,
}

impl Explanation {
    /// 转为键有序的 JSON 值
    pub fn to_value(&self) -> Value {
        let metrics: Map<String, Value> = self
            .metrics
            .iter()
            .map(|(k, v)| (k.clone(), Value::from(*v)))
            .collect();
        let rules: Vec<Value> = self.rules.iter().map(RuleExplanation::to_value).collect();

        let mut map = Map::new();
        map.insert("matched".to_string(), Value::Bool(self.matched));
        map.insert("effect".to_string(), Value::from(self.effect.as_str()));
        map.insert("metrics".to_string(), Value::Object(metrics));
        map.insert("rules".to_string(), Value::Array(rules));
        Value::Object(map)
    }
}

/// 一次评估的结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    pub allowed: bool,
    pub policy: String,
    pub effect: Effect,
    pub matched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<Explanation>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_effect_apply() {
        assert!(Effect::Allow.apply(true));
        assert!(!Effect::Allow.apply(false));
        assert!(!Effect::Deny.apply(true));
        assert!(Effect::Deny.apply(false));
    }

    #[test]
    fn test_effect_parse() {
        assert_eq!("deny".parse::<Effect>().unwrap(), Effect::Deny);
        assert!(matches!("permit".parse::<Effect>(), Err(PolicyError::Load(_))));
        assert!("Allow".parse::<Effect>().is_err());
    }

    #[test]
    fn test_policy_spec_deserialization_defaults() {
        let spec: PolicySpec = serde_json::from_value(json!({"name": "p"})).unwrap();
        assert_eq!(spec.effect, Effect::Allow);
        assert!(spec.rules.is_empty());

        let spec: PolicySpec = serde_json::from_value(json!({
            "name": "block-admin",
            "effect": "deny",
            "rules": [{"type": "compare", "path": "user.role", "op": "eq", "value": "admin"}]
        }))
        .unwrap();
        assert_eq!(spec.effect, Effect::Deny);
        assert_eq!(spec.rules.len(), 1);
    }

    #[test]
    fn test_explanation_serialization() {
        let explanation = Explanation {
            matched: false,
            effect: Effect::Allow,
            metrics: BTreeMap::from([("rule_eval".to_string(), 1)]),
            rules: vec![RuleExplanation::new("truthy", false).with_detail("path", "a")],
        };
        assert_eq!(
            explanation.to_value(),
            json!({
                "matched": false,
                "effect": "allow",
                "metrics": {"rule_eval": 1},
                "rules": [{"type": "truthy", "result": false, "path": "a"}]
            })
        );
    }

    #[test]
    fn test_explanation_to_value_matches_serde() {
        let explanation = Explanation {
            matched: true,
            effect: Effect::Deny,
            metrics: BTreeMap::from([("missing".to_string(), 2), ("rule_eval".to_string(), 3)]),
            rules: vec![
                RuleExplanation::new("not", true).with_detail(
                    "rule",
                    RuleExplanation::new("compare", false)
                        .with_detail("path", "user.role")
                        .with_detail("actual", Value::Null)
                        .to_value(),
                ),
            ],
        };
        assert_eq!(explanation.to_value(), serde_json::to_value(&explanation).unwrap());
        assert_eq!(Explanation::default().to_value()["rules"], json!([]));
    }
}
