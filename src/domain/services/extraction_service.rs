// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::documents::{PathMatch, QueryableDocument};
use crate::domain::models::extraction_rule::{ExtractionMethod, ExtractionRule};
use crate::domain::models::page::ExtractionResult;
use crate::domain::services::transforms::apply_transform;
use crate::utils::errors::ScraperError;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

/// 规则求值过程中的失败原因
///
/// 非必填规则遇到这些情况时返回默认值，必填规则则转换为 `ScraperError::Extraction`
#[derive(Debug, Clone, PartialEq, Eq)]
enum Unresolved {
    NoExtractionMethod,
    NoMatch,
    Invalid(String),
}

impl Unresolved {
    fn reason(&self) -> String {
        match self {
            Unresolved::NoExtractionMethod => "No extraction method specified".to_string(),
            Unresolved::NoMatch => "No match found".to_string(),
            Unresolved::Invalid(reason) => reason.clone(),
        }
    }
}

/// 提取服务
///
/// 负责从可查询文档中按规则提取结构化数据，只依赖 [`QueryableDocument`]
pub struct ExtractionService;

impl ExtractionService {
    /// 对文档求值一条规则
    ///
    /// 提取不到时返回规则默认值；必填规则提取不到时返回 `ScraperError::Extraction`
    pub fn evaluate<D: QueryableDocument>(
        rule: &ExtractionRule,
        document: &D,
    ) -> Result<Value, ScraperError> {
        let resolved = match &rule.method {
            None => Err(Unresolved::NoExtractionMethod),
            Some(ExtractionMethod::CssSelector(selector)) => {
                Self::extract_selector(rule, selector, document)
            }
            Some(ExtractionMethod::HierarchicalPath(path)) => {
                Self::extract_path(rule, path, document)
            }
            Some(ExtractionMethod::Pattern(pattern)) => {
                Self::extract_pattern(rule, pattern, document)
            }
            Some(ExtractionMethod::StructuredPath(path)) => {
                Self::extract_structured(rule, path, document)
            }
        };

        match resolved {
            Ok(value) => Ok(value),
            Err(unresolved) if rule.required => {
                Err(ScraperError::extraction(&rule.name, unresolved.reason()))
            }
            Err(unresolved) => {
                debug!(
                    "Rule '{}' fell back to default: {}",
                    rule.name,
                    unresolved.reason()
                );
                Ok(rule.default_value())
            }
        }
    }

    /// 按顺序求值所有规则
    ///
    /// 遇到第一个必填规则失败时中止
    pub fn extract_all<D: QueryableDocument>(
        rules: &[ExtractionRule],
        document: &D,
    ) -> Result<ExtractionResult, ScraperError> {
        let mut result = ExtractionResult::new();
        for rule in rules {
            let value = Self::evaluate(rule, document)?;
            result.insert(rule.name.clone(), value);
        }
        Ok(result)
    }

    fn extract_selector<D: QueryableDocument>(
        rule: &ExtractionRule,
        selector: &str,
        document: &D,
    ) -> Result<Value, Unresolved> {
        if rule.multiple {
            let nodes = document
                .select_all(selector)
                .map_err(|e| Unresolved::Invalid(e.to_string()))?;
            if nodes.is_empty() {
                return Err(Unresolved::NoMatch);
            }
            Ok(Value::Array(
                nodes
                    .iter()
                    .map(|node| Self::finish(rule, Self::node_value(rule, node, document)))
                    .collect(),
            ))
        } else {
            let node = document
                .select_first(selector)
                .map_err(|e| Unresolved::Invalid(e.to_string()))?
                .ok_or(Unresolved::NoMatch)?;
            Ok(Self::finish(rule, Self::node_value(rule, &node, document)))
        }
    }

    fn extract_path<D: QueryableDocument>(
        rule: &ExtractionRule,
        path: &str,
        document: &D,
    ) -> Result<Value, Unresolved> {
        let matches = document
            .select_path(path)
            .map_err(|e| Unresolved::Invalid(e.to_string()))?;
        if matches.is_empty() {
            return Err(Unresolved::NoMatch);
        }

        let mut values = matches.iter().map(|m| {
            let raw = match m {
                PathMatch::Node(node) => Self::node_value(rule, node, document),
                PathMatch::Value(text) => Value::String(text.clone()),
            };
            Self::finish(rule, raw)
        });

        if rule.multiple {
            Ok(Value::Array(values.collect()))
        } else {
            values.next().ok_or(Unresolved::NoMatch)
        }
    }

    fn extract_pattern<D: QueryableDocument>(
        rule: &ExtractionRule,
        pattern: &str,
        document: &D,
    ) -> Result<Value, Unresolved> {
        let regex = Regex::new(pattern).map_err(|e| Unresolved::Invalid(e.to_string()))?;
        let text = document.raw_text();

        // First capture group when the pattern has one, else the whole match
        let group = usize::from(regex.captures_len() > 1);
        let pick = |caps: &regex::Captures| -> Value {
            caps.get(group)
                .map(|m| Value::String(m.as_str().to_string()))
                .unwrap_or(Value::Null)
        };

        if rule.multiple {
            let values: Vec<Value> = regex
                .captures_iter(text)
                .map(|caps| Self::finish(rule, pick(&caps)))
                .collect();
            if values.is_empty() {
                return Err(Unresolved::NoMatch);
            }
            Ok(Value::Array(values))
        } else {
            let caps = regex.captures(text).ok_or(Unresolved::NoMatch)?;
            Ok(Self::finish(rule, pick(&caps)))
        }
    }

    fn extract_structured<D: QueryableDocument>(
        rule: &ExtractionRule,
        path: &str,
        document: &D,
    ) -> Result<Value, Unresolved> {
        document
            .structured_blocks()
            .iter()
            .find_map(|block| resolve_structured_path(block, path).cloned())
            .map(|value| Self::finish(rule, value))
            .ok_or(Unresolved::NoMatch)
    }

    fn node_value<D: QueryableDocument>(
        rule: &ExtractionRule,
        node: &D::Node<'_>,
        document: &D,
    ) -> Value {
        match &rule.attribute {
            Some(attribute) => document
                .node_attribute(node, attribute)
                .map(Value::String)
                .unwrap_or(Value::Null),
            None => Value::String(document.node_text(node)),
        }
    }

    fn finish(rule: &ExtractionRule, value: Value) -> Value {
        match &rule.transform {
            Some(transform) => apply_transform(value, transform),
            None => value,
        }
    }
}

/// 在 JSON 值上解析点分隔路径
///
/// 数字段用于数组下标；缺失的键、越界下标或 null 都视为无法解析。空路径返回整个块。
pub fn resolve_structured_path<'a>(block: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = block;
    for segment in path.split('.').filter(|s| !s.is_empty()) {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
        if current.is_null() {
            return None;
        }
    }
    if current.is_null() {
        None
    } else {
        Some(current)
    }
}

#[cfg(test)]
#[path = "extraction_service_test.rs"]
mod tests;
