// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::extraction_rule::Transform;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static NON_INTEGER_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\d-]").unwrap());
static NON_FLOAT_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\d.-]").unwrap());

/// 对单个提取值应用转换
///
/// null 对所有转换原样通过；数值转换永远不会失败，无法解析时得到 0 / 0.0
pub fn apply_transform(value: Value, transform: &Transform) -> Value {
    if value.is_null() {
        return value;
    }

    match transform {
        Transform::Strip => map_string(value, |s| s.trim().to_string()),
        Transform::Lower => map_string(value, |s| s.to_lowercase()),
        Transform::Upper => map_string(value, |s| s.to_uppercase()),
        Transform::Int => {
            let cleaned = NON_INTEGER_CHARS.replace_all(&as_text(&value), "").into_owned();
            Value::from(cleaned.parse::<i64>().unwrap_or(0))
        }
        Transform::Float => {
            let cleaned = NON_FLOAT_CHARS.replace_all(&as_text(&value), "").into_owned();
            let parsed = cleaned
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .unwrap_or(0.0);
            Value::from(parsed)
        }
        Transform::Bool => Value::Bool(is_truthy(&value)),
        Transform::Unknown(_) => value,
    }
}

fn map_string(value: Value, f: impl FnOnce(&str) -> String) -> Value {
    match value {
        Value::String(s) => Value::String(f(&s)),
        other => other,
    }
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// 真值判断，非空字符串（包括 "false"）为真
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}
