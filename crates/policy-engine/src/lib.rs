//! 策略决策引擎
//!
//! 根据声明式策略（命名的布尔规则树 + 效果）对任意 JSON 输入给出
//! 放行/拒绝决策，可选输出每条规则的求值解释。支持：
//! - 内置规则类型 compare、all、any、not、truthy
//! - 可扩展的规则类型注册表
//! - 严格模式（off / warn / raise）控制缺值处理
//! - 策略一次编译、多线程共享、反复评估

pub mod context;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod loader;
pub mod models;
pub mod operators;
pub mod registry;
pub mod rules;
pub mod utils;

pub use context::{EvaluationContext, METRIC_MISSING, METRIC_RULE_EVAL, StrictMode};
pub use engine::{EvaluateOptions, PolicyEngine, PolicyRef};
pub use error::{PolicyError, Result};
pub use evaluator::ConditionEvaluator;
pub use loader::{PolicyLoader, PolicySource, load_policy};
pub use models::{Decision, Effect, Explanation, Policy, PolicySpec};
pub use operators::CompareOperator;
pub use registry::{RuleFactory, RuleRegistry, get_default_registry};
pub use rules::{AllRule, AnyRule, CompareRule, NotRule, Rule, RuleExplanation, TruthyPathRule};
pub use utils::{deep_get, deep_get_or, is_truthy, normalize_key};
