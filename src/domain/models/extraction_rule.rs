// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::utils::errors::ScraperError;
use regex::Regex;
use scraper::Selector;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// 提取方法
///
/// 一条规则只携带一种方法。反序列化时若同时出现多个方法字段，
/// 按 selector > hierarchical_path > pattern > structured_path 的顺序取第一个。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionMethod {
    /// CSS 选择器
    CssSelector(String),
    /// 层级路径查询 (XPath 子集)
    HierarchicalPath(String),
    /// 正则表达式，作用于整个原始文档文本
    Pattern(String),
    /// 点分隔的 JSON 路径，作用于文档内嵌的结构化数据块
    StructuredPath(String),
}

impl ExtractionMethod {
    /// 方法名称
    pub fn label(&self) -> &'static str {
        match self {
            ExtractionMethod::CssSelector(_) => "selector",
            ExtractionMethod::HierarchicalPath(_) => "hierarchical_path",
            ExtractionMethod::Pattern(_) => "pattern",
            ExtractionMethod::StructuredPath(_) => "structured_path",
        }
    }
}

/// 值转换
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transform {
    Strip,
    Lower,
    Upper,
    Int,
    Float,
    Bool,
    /// 未知名称，值原样通过
    Unknown(String),
}

impl Transform {
    pub fn from_name(name: &str) -> Self {
        match name {
            "strip" => Transform::Strip,
            "lower" => Transform::Lower,
            "upper" => Transform::Upper,
            "int" => Transform::Int,
            "float" => Transform::Float,
            "bool" => Transform::Bool,
            other => Transform::Unknown(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Transform::Strip => "strip",
            Transform::Lower => "lower",
            Transform::Upper => "upper",
            Transform::Int => "int",
            Transform::Float => "float",
            Transform::Bool => "bool",
            Transform::Unknown(name) => name,
        }
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<String> for Transform {
    fn from(name: String) -> Self {
        Transform::from_name(&name)
    }
}

impl From<Transform> for String {
    fn from(transform: Transform) -> Self {
        transform.name().to_string()
    }
}

/// 提取规则
///
/// 描述如何从文档中取出一个命名值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawExtractionRule", into = "RawExtractionRule")]
pub struct ExtractionRule {
    /// 输出映射中的键
    pub name: String,
    /// 提取方法，为 None 时只能返回默认值
    pub method: Option<ExtractionMethod>,
    /// 读取属性而不是文本
    pub attribute: Option<String>,
    /// 后处理转换
    pub transform: Option<Transform>,
    /// 提取不到时使用的值
    pub default: Option<Value>,
    /// 是否必填
    pub required: bool,
    /// 收集全部匹配还是只取第一个
    pub multiple: bool,
}

impl ExtractionRule {
    fn with_method(name: impl Into<String>, method: Option<ExtractionMethod>) -> Self {
        Self {
            name: name.into(),
            method,
            attribute: None,
            transform: None,
            default: None,
            required: false,
            multiple: false,
        }
    }

    pub fn selector(name: impl Into<String>, selector: impl Into<String>) -> Self {
        Self::with_method(name, Some(ExtractionMethod::CssSelector(selector.into())))
    }

    pub fn hierarchical_path(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::with_method(name, Some(ExtractionMethod::HierarchicalPath(path.into())))
    }

    pub fn pattern(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::with_method(name, Some(ExtractionMethod::Pattern(pattern.into())))
    }

    pub fn structured_path(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::with_method(name, Some(ExtractionMethod::StructuredPath(path.into())))
    }

    /// 不带提取方法的规则
    pub fn unbound(name: impl Into<String>) -> Self {
        Self::with_method(name, None)
    }

    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    pub fn with_transform(mut self, transform: &str) -> Self {
        self.transform = Some(Transform::from_name(transform));
        self
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }

    /// 规则的默认值，未设置时为 null
    pub fn default_value(&self) -> Value {
        self.default.clone().unwrap_or(Value::Null)
    }

    /// 校验规则
    ///
    /// 选择器和路径不能为空，正则和 CSS 选择器必须能编译
    pub fn validate(&self) -> Result<(), ScraperError> {
        if self.name.trim().is_empty() {
            return Err(ScraperError::Validation(
                "Extraction rule name cannot be empty".to_string(),
            ));
        }

        match &self.method {
            Some(ExtractionMethod::CssSelector(selector)) => {
                if selector.trim().is_empty() {
                    return Err(ScraperError::Validation(format!(
                        "selector cannot be empty (rule '{}')",
                        self.name
                    )));
                }
                Selector::parse(selector).map_err(|e| {
                    ScraperError::Validation(format!(
                        "Invalid selector '{}' in rule '{}': {}",
                        selector, self.name, e
                    ))
                })?;
            }
            Some(ExtractionMethod::HierarchicalPath(path)) => {
                if path.trim().is_empty() {
                    return Err(ScraperError::Validation(format!(
                        "hierarchical_path cannot be empty (rule '{}')",
                        self.name
                    )));
                }
            }
            Some(ExtractionMethod::Pattern(pattern)) => {
                Regex::new(pattern).map_err(|e| {
                    ScraperError::Validation(format!(
                        "Invalid pattern in rule '{}': {}",
                        self.name, e
                    ))
                })?;
            }
            Some(ExtractionMethod::StructuredPath(_)) | None => {}
        }

        Ok(())
    }
}

/// 序列化形式
///
/// 四个方法字段平铺在同一层，兼容 xpath / regex / json_path 旧字段名
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawExtractionRule {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    selector: Option<String>,
    #[serde(default, alias = "xpath", skip_serializing_if = "Option::is_none")]
    hierarchical_path: Option<String>,
    #[serde(default, alias = "regex", skip_serializing_if = "Option::is_none")]
    pattern: Option<String>,
    #[serde(default, alias = "json_path", skip_serializing_if = "Option::is_none")]
    structured_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    attribute: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    transform: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default: Option<Value>,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    multiple: bool,
}

impl TryFrom<RawExtractionRule> for ExtractionRule {
    type Error = ScraperError;

    fn try_from(raw: RawExtractionRule) -> Result<Self, Self::Error> {
        let method = raw
            .selector
            .map(ExtractionMethod::CssSelector)
            .or_else(|| raw.hierarchical_path.map(ExtractionMethod::HierarchicalPath))
            .or_else(|| raw.pattern.map(ExtractionMethod::Pattern))
            .or_else(|| raw.structured_path.map(ExtractionMethod::StructuredPath));

        let rule = ExtractionRule {
            name: raw.name,
            method,
            attribute: raw.attribute,
            transform: raw.transform.map(Transform::from),
            default: raw.default,
            required: raw.required,
            multiple: raw.multiple,
        };
        rule.validate()?;
        Ok(rule)
    }
}

impl From<ExtractionRule> for RawExtractionRule {
    fn from(rule: ExtractionRule) -> Self {
        let mut raw = RawExtractionRule {
            name: rule.name,
            attribute: rule.attribute,
            transform: rule.transform.map(String::from),
            default: rule.default,
            required: rule.required,
            multiple: rule.multiple,
            ..Default::default()
        };
        match rule.method {
            Some(ExtractionMethod::CssSelector(s)) => raw.selector = Some(s),
            Some(ExtractionMethod::HierarchicalPath(p)) => raw.hierarchical_path = Some(p),
            Some(ExtractionMethod::Pattern(p)) => raw.pattern = Some(p),
            Some(ExtractionMethod::StructuredPath(p)) => raw.structured_path = Some(p),
            None => {}
        }
        raw
    }
}
