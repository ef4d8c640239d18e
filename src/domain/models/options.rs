// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::extraction_rule::ExtractionRule;
use crate::domain::models::scrape_result::ScraperType;
use crate::utils::errors::ScraperError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// 后端类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrapeMethod {
    /// 静态 HTML (HTTP 抓取)
    #[default]
    Static,
    /// 无头浏览器
    Browser,
}

impl ScrapeMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScrapeMethod::Static => "static",
            ScrapeMethod::Browser => "browser",
        }
    }

    /// 能处理该方式的抓取器类型
    pub fn scraper_type(&self) -> ScraperType {
        match self {
            ScrapeMethod::Static => ScraperType::WebHttp,
            ScrapeMethod::Browser => ScraperType::WebBrowser,
        }
    }
}

/// 页面交互动作
///
/// 浏览器后端在页面加载完成后依次执行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum PageAction {
    /// 等待
    Wait { milliseconds: u64 },
    /// 点击元素
    Click { selector: String },
    /// 输入文本
    Fill { selector: String, value: String },
    /// 选择下拉选项
    Select { selector: String, value: String },
    /// 悬停
    Hover { selector: String },
    /// 滚动 (down, up, bottom, top)
    Scroll { direction: String },
}

/// 单次抓取选项
///
/// 未识别的键在反序列化时被拒绝
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScrapeOptions {
    /// 后端类型，未设置时由抓取器决定；与抓取器不符时抓取失败
    pub method: Option<ScrapeMethod>,
    /// 超时时间（秒），覆盖全局默认值
    pub timeout: Option<f64>,
    /// 等待出现的选择器（浏览器）
    pub wait_for_selector: Option<String>,
    /// 等待选择器的最长时间（秒）
    pub wait_for_timeout: Option<f64>,
    /// 是否截图（浏览器）
    pub screenshot: bool,
    /// 请求携带的 Cookie
    pub cookies: HashMap<String, String>,
    /// 额外请求头（HTTP）
    pub headers: HashMap<String, String>,
    /// 页面加载后执行的脚本（浏览器）
    pub execute_js: Option<String>,
    /// 滚动到底部以触发懒加载（浏览器）
    pub scroll_to_bottom: bool,
    /// 捕获控制台输出（浏览器）
    pub capture_console: bool,
    /// 捕获网络请求（浏览器）
    pub capture_network: bool,
    /// 批量抓取的最大并发数
    pub max_concurrent: Option<usize>,
    /// 分页最大页数
    pub max_pages: Option<usize>,
    /// 下一页链接选择器
    pub pagination_selector: Option<String>,
    /// 下一页 URL 模板，支持 {page} 与 {offset}
    pub pagination_pattern: Option<String>,
    /// 出现该子串时停止翻页
    pub stop_condition: Option<String>,
    /// 提取规则，覆盖抓取器级别的默认规则
    pub extraction_rules: Option<Vec<ExtractionRule>>,
    /// 页面交互动作（浏览器）
    pub actions: Vec<PageAction>,
}

impl ScrapeOptions {
    /// 超时时间，非正数视为未设置
    pub fn timeout_duration(&self) -> Option<Duration> {
        positive_duration(self.timeout)
    }

    /// 等待选择器的时间，非正数视为未设置
    pub fn wait_for_duration(&self) -> Option<Duration> {
        positive_duration(self.wait_for_timeout)
    }

    pub fn with_rules(mut self, rules: Vec<ExtractionRule>) -> Self {
        self.extraction_rules = Some(rules);
        self
    }

    pub fn with_timeout(mut self, secs: f64) -> Self {
        self.timeout = Some(secs);
        self
    }

    /// 校验选项
    pub fn validate(&self) -> Result<(), ScraperError> {
        check_seconds("timeout", self.timeout)?;
        check_seconds("wait_for_timeout", self.wait_for_timeout)?;
        if self.max_concurrent == Some(0) {
            return Err(ScraperError::Validation(
                "max_concurrent must be at least 1".to_string(),
            ));
        }
        if let Some(rules) = &self.extraction_rules {
            for rule in rules {
                rule.validate()?;
            }
        }
        Ok(())
    }
}

fn positive_duration(secs: Option<f64>) -> Option<Duration> {
    secs.filter(|secs| *secs > 0.0)
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
}

/// 秒数必须非负且能表示为 `Duration`
fn check_seconds(field: &str, secs: Option<f64>) -> Result<(), ScraperError> {
    match secs {
        Some(secs) if Duration::try_from_secs_f64(secs).is_err() => Err(ScraperError::Validation(
            format!("{} must be a non-negative number of seconds, got {}", field, secs),
        )),
        _ => Ok(()),
    }
}

/// 分页配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    /// 是否启用选择器或模板翻页
    pub enabled: bool,
    /// 最大页数
    pub max_pages: Option<usize>,
    /// {offset} 模板的每页条数
    pub page_size: usize,
    /// 下一页链接选择器
    pub next_page_selector: Option<String>,
    /// 下一页 URL 模板
    pub next_page_url_pattern: Option<String>,
    /// 停止子串
    pub stop_condition: Option<String>,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_pages: None,
            page_size: 20,
            next_page_selector: None,
            next_page_url_pattern: None,
            stop_condition: None,
        }
    }
}

impl PaginationConfig {
    /// 合并单次抓取选项
    ///
    /// 选项中出现选择器或模板时自动启用分页
    pub fn merged_with(&self, options: &ScrapeOptions) -> Self {
        let mut merged = self.clone();
        if options.pagination_selector.is_some() {
            merged.next_page_selector = options.pagination_selector.clone();
            merged.enabled = true;
        }
        if options.pagination_pattern.is_some() {
            merged.next_page_url_pattern = options.pagination_pattern.clone();
            merged.enabled = true;
        }
        if options.max_pages.is_some() {
            merged.max_pages = options.max_pages;
        }
        if options.stop_condition.is_some() {
            merged.stop_condition = options.stop_condition.clone();
        }
        merged
    }
}

/// 重试配置（仅作为数据保留，当前没有执行路径）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub enabled: bool,
    pub max_attempts: u32,
    pub initial_delay_secs: f64,
    pub max_delay_secs: f64,
    pub exponential_base: f64,
    pub jitter: bool,
    pub retry_on_status_codes: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            initial_delay_secs: 1.0,
            max_delay_secs: 60.0,
            exponential_base: 2.0,
            jitter: true,
            retry_on_status_codes: vec![429, 500, 502, 503, 504],
        }
    }
}

/// 限流配置（仅作为数据保留）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub requests_per_second: f64,
    pub requests_per_minute: Option<u32>,
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_second: 10.0,
            requests_per_minute: None,
            burst_size: 10,
        }
    }
}

/// 缓存配置（仅作为数据保留）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub backend: String,
    pub ttl_seconds: u64,
    pub max_size_mb: u64,
    pub cache_key_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: "memory".to_string(),
            ttl_seconds: 3600,
            max_size_mb: 100,
            cache_key_prefix: "scraper".to_string(),
        }
    }
}
