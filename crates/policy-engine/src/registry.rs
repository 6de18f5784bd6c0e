//! 规则类型注册表
//!
//! 按类型名索引规则工厂，把规则定义（JSON 对象）构造为可执行的规则树。
//!
//! ## 设计说明
//!
//! 工厂以 `Arc` 保存在读写锁保护的 HashMap 中。`create` 在调用工厂前
//! 先释放读锁，组合类型的工厂可以递归调用同一注册表构造子规则，
//! 自定义类型与内置类型因此可以任意嵌套。
//!
//! ## 使用示例
//!
//! ```
//! use policy_engine::{RuleRegistry, TruthyPathRule};
//! use serde_json::json;
//!
//! let registry = RuleRegistry::with_builtins();
//! registry
//!     .register("flag", |spec, _| {
//!         let path = spec.get("name").and_then(|v| v.as_str()).unwrap_or("flag");
//!         Ok(Box::new(TruthyPathRule::new(format!("flags.{}", path))))
//!     })
//!     .unwrap();
//!
//! let rule = registry.create(&json!({"type": "flag", "name": "beta"})).unwrap();
//! assert_eq!(rule.type_name(), "truthy");
//! ```

use crate::error::{PolicyError, Result};
use crate::rules::{AllRule, AnyRule, CompareRule, NotRule, Rule, TruthyPathRule};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

/// 规则工厂：`(规则定义, 注册表) -> 规则`
pub type RuleFactory =
    Arc<dyn Fn(&Map<String, Value>, &RuleRegistry) -> Result<Box<dyn Rule>> + Send + Sync>;

static DEFAULT_REGISTRY: OnceLock<Arc<RuleRegistry>> = OnceLock::new();

/// 获取进程级默认注册表
///
/// 首次调用时创建并注册五种内置类型，之后始终返回同一实例。
/// 需要隔离的调用方（如测试）应自行创建注册表。
pub fn get_default_registry() -> Arc<RuleRegistry> {
    DEFAULT_REGISTRY
        .get_or_init(|| {
            info!("初始化默认规则注册表");
            Arc::new(RuleRegistry::with_builtins())
        })
        .clone()
}

/// 规则类型注册表
///
/// 线程安全：注册/注销与并发的 `create` 之间由读写锁保护。
pub struct RuleRegistry {
    factories: RwLock<HashMap<String, RuleFactory>>,
}

impl RuleRegistry {
    /// 创建空的注册表
    pub fn new() -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
        }
    }

    /// 创建包含内置规则类型的注册表
    ///
    /// 内置类型：compare、all、any、not、truthy
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register_builtins();
        registry
    }

    /// 注册内置规则类型，覆盖同名的已有工厂
    pub fn register_builtins(&self) {
        let mut factories = self.factories.write();
        factories.insert(CompareRule::TYPE.to_string(), Arc::new(build_compare));
        factories.insert(AllRule::TYPE.to_string(), Arc::new(build_all));
        factories.insert(AnyRule::TYPE.to_string(), Arc::new(build_any));
        factories.insert(NotRule::TYPE.to_string(), Arc::new(build_not));
        factories.insert(TruthyPathRule::TYPE.to_string(), Arc::new(build_truthy));
    }

    /// 注册规则类型
    ///
    /// 同名类型会被静默覆盖。类型名不能为空字符串。
    pub fn register<F>(&self, type_name: impl Into<String>, factory: F) -> Result<()>
    where
        F: Fn(&Map<String, Value>, &RuleRegistry) -> Result<Box<dyn Rule>> + Send + Sync + 'static,
    {
        let type_name = type_name.into();
        if type_name.is_empty() {
            return Err(PolicyError::Syntax("rule type name must be non-empty".into()));
        }

        debug!(rule_type = %type_name, "注册规则类型");
        self.factories.write().insert(type_name, Arc::new(factory));
        Ok(())
    }

    /// 注销规则类型，不存在时无操作
    pub fn unregister(&self, type_name: &str) {
        if self.factories.write().remove(type_name).is_some() {
            debug!(rule_type = %type_name, "注销规则类型");
        }
    }

    /// 检查是否已注册指定类型
    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.read().contains_key(type_name)
    }

    /// 获取所有已注册的类型名（已排序）
    pub fn registered_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.factories.read().keys().cloned().collect();
        types.sort();
        types
    }

    pub fn len(&self) -> usize {
        self.factories.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.read().is_empty()
    }

    /// 根据规则定义构造规则
    ///
    /// 定义必须是带非空字符串 `type` 的对象。
    pub fn create(&self, spec: &Value) -> Result<Box<dyn Rule>> {
        let spec = spec
            .as_object()
            .ok_or_else(|| PolicyError::Syntax("rule spec must be a dict".into()))?;

        let type_name = spec
            .get("type")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| PolicyError::Syntax("rule spec requires non-empty 'type'".into()))?;

        // 先克隆工厂再释放读锁，工厂内部会递归调用 create
        let factory = self
            .factories
            .read()
            .get(type_name)
            .cloned()
            .ok_or_else(|| PolicyError::UnknownRule(type_name.to_string()))?;

        factory(spec, self)
    }
}

fn build_compare(spec: &Map<String, Value>, _: &RuleRegistry) -> Result<Box<dyn Rule>> {
    Ok(Box::new(CompareRule::parse(spec)?))
}

fn build_all(spec: &Map<String, Value>, registry: &RuleRegistry) -> Result<Box<dyn Rule>> {
    Ok(Box::new(AllRule::parse(spec, registry)?))
}

fn build_any(spec: &Map<String, Value>, registry: &RuleRegistry) -> Result<Box<dyn Rule>> {
    Ok(Box::new(AnyRule::parse(spec, registry)?))
}

fn build_not(spec: &Map<String, Value>, registry: &RuleRegistry) -> Result<Box<dyn Rule>> {
    Ok(Box::new(NotRule::parse(spec, registry)?))
}

fn build_truthy(spec: &Map<String, Value>, _: &RuleRegistry) -> Result<Box<dyn Rule>> {
    Ok(Box::new(TruthyPathRule::parse(spec)?))
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleRegistry")
            .field("types", &self.registered_types())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{EvaluationContext, StrictMode};
    use chrono::Utc;
    use serde_json::json;

    #[test]
    fn test_builtins_registered() {
        let registry = RuleRegistry::with_builtins();
        assert_eq!(
            registry.registered_types(),
            vec!["all", "any", "compare", "not", "truthy"]
        );
        assert!(RuleRegistry::new().is_empty());
    }

    #[test]
    fn test_unknown_rule_type() {
        let registry = RuleRegistry::with_builtins();
        let err = registry.create(&json!({"type": "ghost"})).unwrap_err();
        assert!(matches!(err, PolicyError::UnknownRule(ref t) if t == "ghost"));
        assert!(err.to_string().contains("ghost"));
        assert_eq!(err.unknown_rule_type(), Some("ghost"));
    }

    #[test]
    fn test_spec_shape_validation() {
        let registry = RuleRegistry::with_builtins();
        for bad in [json!([]), json!("compare"), json!({}), json!({"type": ""}), json!({"type": 3})] {
            assert!(matches!(registry.create(&bad), Err(PolicyError::Syntax(_))), "{}", bad);
        }
    }

    #[test]
    fn test_composite_parse_errors() {
        let registry = RuleRegistry::with_builtins();
        assert!(matches!(
            registry.create(&json!({"type": "all", "rules": {"type": "truthy"}})),
            Err(PolicyError::Syntax(_))
        ));
        assert!(matches!(
            registry.create(&json!({"type": "not"})),
            Err(PolicyError::Syntax(_))
        ));
        assert!(matches!(
            registry.create(&json!({"type": "not", "rule": [{"type": "truthy", "path": "a"}]})),
            Err(PolicyError::Syntax(_))
        ));
        // 缺失的 rules 视为空列表
        assert!(registry.create(&json!({"type": "any"})).is_ok());
    }

    #[test]
    fn test_nested_errors_propagate() {
        let registry = RuleRegistry::with_builtins();
        let spec = json!({
            "type": "all",
            "rules": [{"type": "not", "rule": {"type": "ghost"}}]
        });
        assert!(matches!(registry.create(&spec), Err(PolicyError::UnknownRule(_))));
    }

    #[test]
    fn test_register_rejects_empty_name() {
        let registry = RuleRegistry::new();
        let result = registry.register("", |_, _| Ok(Box::new(TruthyPathRule::new("a"))));
        assert!(result.is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_register_overwrites_and_unregister() {
        let registry = RuleRegistry::with_builtins();
        registry
            .register("truthy", |_, _| Ok(Box::new(CompareRule::new("a", "exists", Value::Null))))
            .unwrap();
        let rule = registry.create(&json!({"type": "truthy"})).unwrap();
        assert_eq!(rule.type_name(), "compare");

        registry.unregister("truthy");
        registry.unregister("truthy");
        assert!(!registry.contains("truthy"));
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn test_custom_type_nests_through_registry() {
        let registry = RuleRegistry::with_builtins();
        // 自定义组合类型：所有子规则都不成立
        registry
            .register("none", |spec, r| {
                let children = spec
                    .get("rules")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                let rules = children.iter().map(|s| r.create(s)).collect::<Result<Vec<_>>>()?;
                Ok(Box::new(NotRule::new(Box::new(AnyRule::new(rules)))))
            })
            .unwrap();

        let spec = json!({
            "type": "all",
            "rules": [{
                "type": "none",
                "rules": [{"type": "truthy", "path": "banned"}]
            }]
        });
        let rule = registry.create(&spec).unwrap();

        let input = json!({"banned": false});
        let mut ctx = EvaluationContext::new(&input, Utc::now(), StrictMode::Off);
        assert!(rule.evaluate(&mut ctx).unwrap());
    }

    #[test]
    fn test_default_registry_is_singleton() {
        let a = get_default_registry();
        let b = get_default_registry();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(a.contains("compare"));
    }
}
