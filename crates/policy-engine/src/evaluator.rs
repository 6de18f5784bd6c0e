//! 条件评估器
//!
//! 实现 compare 规则各操作符在 JSON 值上的语义。调用方负责缺值处理，
//! 这里只接收已经取到的实际值。

use crate::error::{PolicyError, Result};
use crate::operators::CompareOperator;
use crate::utils::type_name;
use serde_json::Value;
use std::cmp::Ordering;

/// 条件评估器
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    /// 评估条件
    ///
    /// # Arguments
    /// * `actual` - 从输入中取到的字段值（非空）
    /// * `operator` - 操作符
    /// * `expected` - 规则中定义的期望值
    pub fn evaluate(actual: &Value, operator: CompareOperator, expected: &Value) -> Result<bool> {
        match operator {
            CompareOperator::Eq => Ok(Self::eq(actual, expected)),
            CompareOperator::Ne => Ok(!Self::eq(actual, expected)),
            CompareOperator::Gt => Self::order(actual, expected, ">").map(Ordering::is_gt),
            CompareOperator::Gte => Self::order(actual, expected, ">=").map(Ordering::is_ge),
            CompareOperator::Lt => Self::order(actual, expected, "<").map(Ordering::is_lt),
            CompareOperator::Lte => Self::order(actual, expected, "<=").map(Ordering::is_le),
            // 期望值为空值（null、false、0、空串、空数组、空对象）时视为空集合
            CompareOperator::In if is_empty_value(expected) => Ok(false),
            CompareOperator::In => Self::contains(expected, actual),
            CompareOperator::Contains => Self::contains(actual, expected),
            CompareOperator::Exists => Ok(true),
        }
    }

    /// 结构相等比较
    ///
    /// 数值统一按数值比较（`1 == 1.0`），布尔值与数值比较时按 0/1 处理
    /// （`true == 1`），数组和对象递归比较。
    pub fn eq(left: &Value, right: &Value) -> bool {
        match (left, right) {
            (Value::Bool(b), Value::Number(n)) | (Value::Number(n), Value::Bool(b)) => {
                n.as_f64() == Some(bool_as_f64(*b))
            }
            (Value::Number(a), Value::Number(b)) => {
                if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
                    x == y
                } else if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
                    x == y
                } else {
                    a.as_f64() == b.as_f64()
                }
            }
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| Self::eq(x, y))
            }
            (Value::Object(a), Value::Object(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|other| Self::eq(v, other)))
            }
            _ => left == right,
        }
    }

    /// 有序比较，类型不可比较时报错
    fn order(left: &Value, right: &Value, symbol: &str) -> Result<Ordering> {
        Self::try_order(left, right).ok_or_else(|| {
            PolicyError::Evaluation(format!(
                "'{}' not supported between {} and {}",
                symbol,
                type_name(left),
                type_name(right)
            ))
        })
    }

    fn try_order(left: &Value, right: &Value) -> Option<Ordering> {
        match (left, right) {
            (Value::Number(a), Value::Number(b)) => {
                if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
                    Some(x.cmp(&y))
                } else {
                    a.as_f64()?.partial_cmp(&b.as_f64()?)
                }
            }
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Number(b)) => bool_as_f64(*a).partial_cmp(&b.as_f64()?),
            (Value::Number(a), Value::Bool(b)) => a.as_f64()?.partial_cmp(&bool_as_f64(*b)),
            (Value::Array(a), Value::Array(b)) => {
                // 逐元素比较，第一个不相等的元素决定顺序
                for (x, y) in a.iter().zip(b) {
                    if Self::eq(x, y) {
                        continue;
                    }
                    return Self::try_order(x, y);
                }
                Some(a.len().cmp(&b.len()))
            }
            _ => None,
        }
    }

    /// 容器包含检查
    ///
    /// - 数组：存在相等元素
    /// - 字符串：子串匹配，元素必须是字符串
    /// - 对象：键存在
    fn contains(container: &Value, item: &Value) -> Result<bool> {
        match container {
            Value::Array(arr) => Ok(arr.iter().any(|x| Self::eq(x, item))),
            Value::String(s) => {
                let needle = item.as_str().ok_or_else(|| {
                    PolicyError::Evaluation(format!(
                        "'in <string>' requires string as left operand, not {}",
                        type_name(item)
                    ))
                })?;
                Ok(s.contains(needle))
            }
            Value::Object(map) => Ok(item.as_str().is_some_and(|key| map.contains_key(key))),
            other => Err(PolicyError::Evaluation(format!(
                "argument of type '{}' is not iterable",
                type_name(other)
            ))),
        }
    }
}

fn bool_as_f64(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

/// 空值判断：null、false、数值 0、空字符串、空数组、空对象
fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(arr) => arr.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn eval(actual: Value, op: CompareOperator, expected: Value) -> Result<bool> {
        ConditionEvaluator::evaluate(&actual, op, &expected)
    }

    #[test]
    fn test_eq_numbers() {
        assert!(eval(json!(100), CompareOperator::Eq, json!(100)).unwrap());
        assert!(eval(json!(100.0), CompareOperator::Eq, json!(100)).unwrap());
        assert!(!eval(json!(100), CompareOperator::Eq, json!("100")).unwrap());
    }

    #[test]
    fn test_eq_strings() {
        assert!(eval(json!("hello"), CompareOperator::Eq, json!("hello")).unwrap());
        assert!(!eval(json!("hello"), CompareOperator::Eq, json!("world")).unwrap());
        assert!(eval(json!("hello"), CompareOperator::Ne, json!("world")).unwrap());
    }

    #[test]
    fn test_eq_structures() {
        assert!(eval(json!([1, {"a": 2}]), CompareOperator::Eq, json!([1.0, {"a": 2}])).unwrap());
        assert!(!eval(json!({"a": 1}), CompareOperator::Eq, json!({"a": 1, "b": 2})).unwrap());
    }

    #[test]
    fn test_numeric_comparisons() {
        assert!(eval(json!(100), CompareOperator::Gt, json!(50)).unwrap());
        assert!(eval(json!(100), CompareOperator::Gte, json!(100)).unwrap());
        assert!(eval(json!(50), CompareOperator::Lt, json!(100.5)).unwrap());
        assert!(eval(json!(100), CompareOperator::Lte, json!(100)).unwrap());
        assert!(!eval(json!(-1), CompareOperator::Gt, json!(0)).unwrap());
    }

    #[test]
    fn test_string_and_array_ordering() {
        assert!(eval(json!("b"), CompareOperator::Gt, json!("a")).unwrap());
        assert!(eval(json!([1, 2]), CompareOperator::Lt, json!([1, 3])).unwrap());
        assert!(eval(json!([1, 2]), CompareOperator::Lt, json!([1, 2, 0])).unwrap());
    }

    #[test]
    fn test_incomparable_types() {
        let err = eval(json!("10"), CompareOperator::Gt, json!(5)).unwrap_err();
        assert!(matches!(err, PolicyError::Evaluation(_)));
        assert!(err.to_string().contains("string"));
        assert!(eval(json!({"a": 1}), CompareOperator::Lt, json!({"a": 2})).is_err());
    }

    #[test]
    fn test_in_list() {
        assert!(eval(json!("a"), CompareOperator::In, json!(["a", "b", "c"])).unwrap());
        assert!(!eval(json!("d"), CompareOperator::In, json!(["a", "b", "c"])).unwrap());
        assert!(!eval(json!("a"), CompareOperator::In, json!(null)).unwrap());
    }

    #[test]
    fn test_in_empty_expected_is_false() {
        for expected in [json!(null), json!(""), json!(0), json!(0.0), json!(false), json!([]), json!({})] {
            assert!(!eval(json!(""), CompareOperator::In, expected.clone()).unwrap(), "{}", expected);
            assert!(!eval(json!(1), CompareOperator::In, expected.clone()).unwrap(), "{}", expected);
        }
        // 非空的非容器仍然报错
        assert!(eval(json!(1), CompareOperator::In, json!(true)).is_err());
    }

    #[test]
    fn test_bool_compares_as_number() {
        assert!(eval(json!(true), CompareOperator::Eq, json!(1)).unwrap());
        assert!(eval(json!(0.0), CompareOperator::Eq, json!(false)).unwrap());
        assert!(!eval(json!(true), CompareOperator::Eq, json!(2)).unwrap());
        assert!(eval(json!(true), CompareOperator::Gt, json!(0)).unwrap());
        assert!(eval(json!(0.5), CompareOperator::Lt, json!(true)).unwrap());
        assert!(eval(json!(true), CompareOperator::In, json!([1, 2])).unwrap());
    }

    #[test]
    fn test_in_string_and_object() {
        assert!(eval(json!("min"), CompareOperator::In, json!("admin")).unwrap());
        assert!(eval(json!("role"), CompareOperator::In, json!({"role": "x"})).unwrap());
        assert!(eval(json!(1), CompareOperator::In, json!("123")).is_err());
        assert!(eval(json!(1), CompareOperator::In, json!(5)).is_err());
    }

    #[test]
    fn test_contains() {
        assert!(eval(json!("hello world"), CompareOperator::Contains, json!("world")).unwrap());
        assert!(eval(json!(["a", "b", "c"]), CompareOperator::Contains, json!("b")).unwrap());
        assert!(!eval(json!(["a", "b"]), CompareOperator::Contains, json!(null)).unwrap());
        assert!(eval(json!(42), CompareOperator::Contains, json!(4)).is_err());
    }

    #[test]
    fn test_exists() {
        assert!(eval(json!(false), CompareOperator::Exists, json!(null)).unwrap());
    }
}
