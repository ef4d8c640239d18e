// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// 提取结果，键顺序与规则求值顺序一致
pub type ExtractionResult = Map<String, Value>;

/// 页面元数据
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub keywords: Option<String>,
    pub author: Option<String>,
    pub language: Option<String>,
    pub canonical_url: Option<String>,
    /// Open Graph 属性
    pub og_data: BTreeMap<String, String>,
    /// Twitter Card 属性
    pub twitter_data: BTreeMap<String, String>,
    /// schema.org (JSON-LD) 数据块
    pub schema_data: Vec<Value>,
}

/// 页面链接
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkInfo {
    pub url: String,
    pub text: String,
    pub title: String,
}

/// 页面图片
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInfo {
    pub src: String,
    pub alt: String,
    pub title: String,
    pub width: String,
    pub height: String,
}

/// 下拉框选项
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub value: String,
    pub text: String,
}

/// 表单字段 (input, select, textarea)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormField {
    /// input 的 type 属性，其余为元素名
    #[serde(rename = "type")]
    pub field_type: String,
    pub name: Option<String>,
    pub id: Option<String>,
    pub value: Option<String>,
    pub placeholder: Option<String>,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<SelectOption>>,
}

/// 页面表单
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormInfo {
    pub action: String,
    /// 小写的提交方法，缺省为 get
    pub method: String,
    pub id: Option<String>,
    pub inputs: Vec<FormField>,
}

/// 浏览器 Cookie
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CookieInfo {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
}

/// 浏览器捕获的网络请求
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkRequest {
    pub url: String,
    pub method: String,
    pub resource_type: Option<String>,
}

/// 单页抓取结果
///
/// 每次抓取构造一次，构造完成后不再修改
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageData {
    /// 实际抓取的 URL（重定向之后）
    pub url: String,
    /// HTTP 状态码，浏览器后端无法获取时为 None
    pub status_code: Option<u16>,
    /// 响应头
    pub headers: BTreeMap<String, String>,
    /// 原始内容
    pub content: Option<String>,
    /// 规则提取结果
    pub extracted_data: Option<ExtractionResult>,
    /// 页面元数据
    pub metadata: Option<PageMetadata>,
    pub links: Option<Vec<LinkInfo>>,
    pub images: Option<Vec<ImageInfo>>,
    /// 表格，每个表格为若干行
    pub tables: Option<Vec<Vec<Value>>>,
    pub forms: Option<Vec<FormInfo>>,
    /// 页面标题（浏览器）
    pub title: Option<String>,
    /// 截图 (base64 encoded)
    pub screenshot: Option<String>,
    pub cookies: Option<Vec<CookieInfo>>,
    pub console_logs: Option<Vec<String>>,
    pub network_requests: Option<Vec<NetworkRequest>>,
}

impl PageData {
    /// 读取提取结果中的字段
    pub fn extracted(&self, name: &str) -> Option<&Value> {
        self.extracted_data.as_ref().and_then(|data| data.get(name))
    }
}
