// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 可查询文档
//!
//! 提取引擎只依赖 [`QueryableDocument`]，不关心文档来自静态 HTML 还是浏览器 DOM。

pub mod live_document;
pub mod path_query;
pub mod static_document;

pub use live_document::{CapturedElement, LiveDocument, LiveNode};
pub use static_document::StaticDocument;

use serde_json::Value;
use thiserror::Error;

/// 文档查询错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    /// 选择器无法解析
    #[error("Invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },
    /// 路径表达式无法解析或求值
    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },
}

/// 层级路径的匹配项
///
/// 路径可以停在元素上，也可以以 `text()` 或 `@attr` 结尾直接得到字符串
#[derive(Debug, Clone, PartialEq)]
pub enum PathMatch<N> {
    Node(N),
    Value(String),
}

/// 可查询文档接口
///
/// 每次抓取创建一个实例，由产生它的抓取操作独占
pub trait QueryableDocument {
    /// 文档节点句柄
    type Node<'a>
    where
        Self: 'a;

    /// 第一个匹配选择器的节点
    fn select_first(&self, selector: &str) -> Result<Option<Self::Node<'_>>, DocumentError>;

    /// 所有匹配选择器的节点，按文档顺序，不去重
    fn select_all(&self, selector: &str) -> Result<Vec<Self::Node<'_>>, DocumentError>;

    /// 层级路径查询
    fn select_path(&self, path: &str) -> Result<Vec<PathMatch<Self::Node<'_>>>, DocumentError>;

    /// 节点文本（去除首尾空白）
    fn node_text(&self, node: &Self::Node<'_>) -> String;

    /// 节点属性
    fn node_attribute(&self, node: &Self::Node<'_>, name: &str) -> Option<String>;

    /// 完整的原始标记文本
    fn raw_text(&self) -> &str;

    /// 内嵌的结构化数据块（JSON-LD），按文档顺序
    fn structured_blocks(&self) -> Vec<Value>;
}
