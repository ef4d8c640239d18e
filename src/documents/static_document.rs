// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::documents::path_query::PathQuery;
use crate::documents::{DocumentError, PathMatch, QueryableDocument};
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use tracing::debug;

/// 静态 HTML 文档
///
/// 基于 scraper 解析的文档树。`Html` 不是 `Send`，因此只在同步代码中构造和使用。
pub struct StaticDocument {
    raw: String,
    html: Html,
}

impl StaticDocument {
    /// 解析 HTML 文本
    pub fn parse(content: impl Into<String>) -> Self {
        let raw = content.into();
        let html = Html::parse_document(&raw);
        Self { raw, html }
    }

    /// 底层文档树
    pub fn html(&self) -> &Html {
        &self.html
    }

    pub(crate) fn compile_selector(selector: &str) -> Result<Selector, DocumentError> {
        Selector::parse(selector).map_err(|e| DocumentError::InvalidSelector {
            selector: selector.to_string(),
            reason: e.to_string(),
        })
    }
}

/// 元素的文本内容，拼接后去除首尾空白
pub fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

impl QueryableDocument for StaticDocument {
    type Node<'a> = ElementRef<'a>;

    fn select_first(&self, selector: &str) -> Result<Option<ElementRef<'_>>, DocumentError> {
        let selector = Self::compile_selector(selector)?;
        Ok(self.html.select(&selector).next())
    }

    fn select_all(&self, selector: &str) -> Result<Vec<ElementRef<'_>>, DocumentError> {
        let selector = Self::compile_selector(selector)?;
        Ok(self.html.select(&selector).collect())
    }

    fn select_path(&self, path: &str) -> Result<Vec<PathMatch<ElementRef<'_>>>, DocumentError> {
        let query = PathQuery::parse(path)?;
        query.evaluate(&self.html)
    }

    fn node_text(&self, node: &ElementRef<'_>) -> String {
        element_text(node)
    }

    fn node_attribute(&self, node: &ElementRef<'_>, name: &str) -> Option<String> {
        node.value().attr(name).map(str::to_string)
    }

    fn raw_text(&self) -> &str {
        &self.raw
    }

    fn structured_blocks(&self) -> Vec<Value> {
        let Ok(selector) = Self::compile_selector(r#"script[type="application/ld+json"]"#) else {
            return Vec::new();
        };

        self.html
            .select(&selector)
            .filter_map(|script| {
                let body = script.text().collect::<String>();
                match serde_json::from_str::<Value>(body.trim()) {
                    Ok(value) => Some(value),
                    Err(e) => {
                        debug!("Skipping malformed JSON-LD block: {}", e);
                        None
                    }
                }
            })
            .collect()
    }
}
