// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// 抓取器类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScraperType {
    WebHttp,
    WebBrowser,
}

impl ScraperType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScraperType::WebHttp => "web_http",
            ScraperType::WebBrowser => "web_browser",
        }
    }
}

/// 抓取操作元数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScraperMetadata {
    pub scraper_type: ScraperType,
    pub source: String,
    pub timestamp: DateTime<Utc>,
    pub duration_seconds: Option<f64>,
    pub records_scraped: usize,
    pub errors_count: usize,
    pub warnings: Vec<String>,
    pub tags: BTreeMap<String, Value>,
}

impl ScraperMetadata {
    pub fn new(scraper_type: ScraperType, source: impl Into<String>) -> Self {
        Self {
            scraper_type,
            source: source.into(),
            timestamp: Utc::now(),
            duration_seconds: None,
            records_scraped: 0,
            errors_count: 0,
            warnings: Vec::new(),
            tags: BTreeMap::new(),
        }
    }
}

/// 抓取结果
///
/// 序列化后包含 success / data / error / metadata 四个键
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScraperResult<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub metadata: ScraperMetadata,
}

impl<T> ScraperResult<T> {
    pub fn succeeded(data: T, metadata: ScraperMetadata) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            metadata,
        }
    }

    pub fn failed(error: impl Into<String>, metadata: ScraperMetadata) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            metadata,
        }
    }
}

/// 抓取统计
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScraperStats {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub total_duration: f64,
    pub average_response_time: f64,
}

/// 按固定规则统计记录数
///
/// null 为 0，数组为长度，对象与其他值为 1
pub fn count_records(data: &Value) -> usize {
    match data {
        Value::Null => 0,
        Value::Array(items) => items.len(),
        _ => 1,
    }
}
