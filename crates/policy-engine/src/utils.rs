//! 通用工具函数
//!
//! 路径取值、键名归一化与真值判断，均为无状态纯函数。

use serde_json::Value;

/// 按点号分隔的路径取值（如 "user.role" 或 "items.-1"）
///
/// - 对象按字符串键查找，键不存在时立即返回 `None`
/// - 数组按整数下标查找，支持负数下标（`-1` 为最后一个元素）
/// - 连续的分隔符产生的空段会被跳过
/// - 其他类型的中间值无法继续下钻，返回 `None`
///
/// 注意：路径上实际存在的 `null` 会原样返回 `Some(&Value::Null)`，
/// 由调用方决定是否将其视为缺失。
pub fn deep_get<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;

    for part in path.split('.').filter(|p| !p.is_empty()) {
        current = match current {
            Value::Object(map) => map.get(part)?,
            Value::Array(arr) => {
                let index: i64 = part.parse().ok()?;
                let len = arr.len() as i64;
                let resolved = if index < 0 { index + len } else { index };
                if resolved < 0 || resolved >= len {
                    return None;
                }
                &arr[resolved as usize]
            }
            _ => return None,
        };
    }

    Some(current)
}

/// 路径取值，无法解析时返回 `default`
pub fn deep_get_or<'a>(root: &'a Value, path: &str, default: &'a Value) -> &'a Value {
    deep_get(root, path).unwrap_or(default)
}

/// 键名归一化：去除首尾空白、转小写、连字符替换为下划线
pub fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase().replace('-', "_")
}

/// 真值判断
///
/// 集合类型（数组、对象）始终为真，与“空集合为假”的惯例不同。
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !matches!(
            s.trim().to_lowercase().as_str(),
            "" | "0" | "false" | "no" | "off"
        ),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// 获取值的 JSON 类型名称
pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
