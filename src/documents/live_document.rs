// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::documents::static_document::{element_text, StaticDocument};
use crate::documents::{DocumentError, PathMatch, QueryableDocument};
use scraper::ElementRef;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// 从浏览器实时 DOM 中捕获的元素
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedElement {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

/// 浏览器文档节点
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LiveNode<'a> {
    /// 浏览器内选择器直接返回的元素
    Captured(&'a CapturedElement),
    /// 渲染后标记中的元素
    Rendered(ElementRef<'a>),
}

/// 浏览器渲染后的文档
///
/// 选择器优先使用页面内 `querySelectorAll` 捕获的结果，
/// 未捕获的选择器与层级路径回退到渲染后 HTML 的解析树。
pub struct LiveDocument {
    captured: HashMap<String, Vec<CapturedElement>>,
    rendered: StaticDocument,
}

impl LiveDocument {
    pub fn new(rendered_content: impl Into<String>, captured: HashMap<String, Vec<CapturedElement>>) -> Self {
        Self {
            captured,
            rendered: StaticDocument::parse(rendered_content),
        }
    }

    /// 是否有该选择器的实时捕获结果
    pub fn has_captured(&self, selector: &str) -> bool {
        self.captured.contains_key(selector)
    }

    pub fn rendered(&self) -> &StaticDocument {
        &self.rendered
    }
}

impl QueryableDocument for LiveDocument {
    type Node<'a> = LiveNode<'a>;

    fn select_first(&self, selector: &str) -> Result<Option<LiveNode<'_>>, DocumentError> {
        if let Some(elements) = self.captured.get(selector) {
            return Ok(elements.first().map(LiveNode::Captured));
        }
        Ok(self.rendered.select_first(selector)?.map(LiveNode::Rendered))
    }

    fn select_all(&self, selector: &str) -> Result<Vec<LiveNode<'_>>, DocumentError> {
        if let Some(elements) = self.captured.get(selector) {
            return Ok(elements.iter().map(LiveNode::Captured).collect());
        }
        Ok(self
            .rendered
            .select_all(selector)?
            .into_iter()
            .map(LiveNode::Rendered)
            .collect())
    }

    fn select_path(&self, path: &str) -> Result<Vec<PathMatch<LiveNode<'_>>>, DocumentError> {
        Ok(self
            .rendered
            .select_path(path)?
            .into_iter()
            .map(|m| match m {
                PathMatch::Node(el) => PathMatch::Node(LiveNode::Rendered(el)),
                PathMatch::Value(v) => PathMatch::Value(v),
            })
            .collect())
    }

    fn node_text(&self, node: &LiveNode<'_>) -> String {
        match node {
            LiveNode::Captured(el) => el.text.trim().to_string(),
            LiveNode::Rendered(el) => element_text(el),
        }
    }

    fn node_attribute(&self, node: &LiveNode<'_>, name: &str) -> Option<String> {
        match node {
            LiveNode::Captured(el) => el.attributes.get(name).cloned(),
            LiveNode::Rendered(el) => el.value().attr(name).map(str::to_string),
        }
    }

    fn raw_text(&self) -> &str {
        self.rendered.raw_text()
    }

    fn structured_blocks(&self) -> Vec<Value> {
        self.rendered.structured_blocks()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn captured(text: &str, href: &str) -> CapturedElement {
        CapturedElement {
            text: text.to_string(),
            attributes: HashMap::from([("href".to_string(), href.to_string())]),
        }
    }

    fn document() -> LiveDocument {
        let html = r#"<html><body>
            <a class="dyn" href="/static">Static</a>
            <p id="intro">  Hello  </p>
        </body></html>"#;
        let mut map = HashMap::new();
        map.insert(
            "a.dyn".to_string(),
            vec![captured(" Rendered by JS ", "/live-1"), captured("Second", "/live-2")],
        );
        map.insert("div.missing".to_string(), Vec::new());
        LiveDocument::new(html, map)
    }

    #[test]
    fn test_captured_results_take_precedence() {
        let doc = document();
        let first = doc.select_first("a.dyn").unwrap().unwrap();
        assert_eq!(doc.node_text(&first), "Rendered by JS");
        assert_eq!(doc.node_attribute(&first, "href").as_deref(), Some("/live-1"));
        assert_eq!(doc.select_all("a.dyn").unwrap().len(), 2);
    }

    #[test]
    fn test_empty_capture_means_no_match() {
        let doc = document();
        assert!(doc.select_first("div.missing").unwrap().is_none());
    }

    #[test]
    fn test_uncaptured_selector_falls_back_to_markup() {
        let doc = document();
        let intro = doc.select_first("#intro").unwrap().unwrap();
        assert_eq!(doc.node_text(&intro), "Hello");
        assert!(doc.select_first("p[[").is_err());
    }

    #[test]
    fn test_paths_use_rendered_markup() {
        let doc = document();
        let matches = doc.select_path("//a/@href").unwrap();
        assert_eq!(matches, vec![PathMatch::Value("/static".to_string())]);
    }
}
