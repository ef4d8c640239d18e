// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::time::Duration;
use thiserror::Error;

/// 抓取错误类型
///
/// 后端抓取函数可以返回任意变体，编排层统一将其转换为失败的 `ScraperResult`
#[derive(Error, Debug)]
pub enum ScraperError {
    /// 连接或导航失败
    #[error("Connection error: {message}")]
    Connection {
        message: String,
        url: Option<String>,
    },

    /// 必填规则无法满足
    #[error("Failed to extract required field '{rule}': {reason}")]
    Extraction { rule: String, reason: String },

    /// 规则或输入格式错误
    #[error("Validation error: {0}")]
    Validation(String),

    /// 超时
    #[error("Scraping operation timed out after {}s", .timeout.as_secs_f64())]
    Timeout { url: String, timeout: Duration },

    /// 响应或文档解析失败
    #[error("Parsing error: {0}")]
    Parsing(String),

    /// 配置错误
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// 浏览器自动化失败
    #[error("Browser error: {0}")]
    Browser(String),

    /// 未预料的错误
    #[error("Unexpected error: {0}")]
    Unexpected(#[from] anyhow::Error),
}

impl ScraperError {
    /// 创建连接错误
    pub fn connection(message: impl Into<String>, url: impl Into<String>) -> Self {
        ScraperError::Connection {
            message: message.into(),
            url: Some(url.into()),
        }
    }

    /// 创建提取错误
    pub fn extraction(rule: impl Into<String>, reason: impl Into<String>) -> Self {
        ScraperError::Extraction {
            rule: rule.into(),
            reason: reason.into(),
        }
    }

    /// 是否为已知的领域错误
    ///
    /// 未预料的错误在结果中会以 "Unexpected error" 前缀呈现
    pub fn is_known(&self) -> bool {
        !matches!(self, ScraperError::Unexpected(_))
    }

    /// 为超时错误补上实际生效的时长，其他错误原样返回
    pub fn with_timeout(self, limit: Option<Duration>) -> Self {
        match (self, limit) {
            (ScraperError::Timeout { url, .. }, Some(timeout)) => ScraperError::Timeout { url, timeout },
            (other, _) => other,
        }
    }

    /// 错误类别名称，用于日志和指标标签
    pub fn kind(&self) -> &'static str {
        match self {
            ScraperError::Connection { .. } => "connection",
            ScraperError::Extraction { .. } => "extraction",
            ScraperError::Validation(_) => "validation",
            ScraperError::Timeout { .. } => "timeout",
            ScraperError::Parsing(_) => "parsing",
            ScraperError::Configuration(_) => "configuration",
            ScraperError::Browser(_) => "browser",
            ScraperError::Unexpected(_) => "unexpected",
        }
    }
}

impl From<reqwest::Error> for ScraperError {
    fn from(e: reqwest::Error) -> Self {
        let url = e.url().map(|u| u.to_string());
        if e.is_timeout() {
            return ScraperError::Timeout {
                url: url.unwrap_or_default(),
                timeout: Duration::ZERO,
            };
        }
        if e.is_decode() || e.is_body() {
            return ScraperError::Parsing(e.to_string());
        }
        ScraperError::Connection {
            message: format!("HTTP error occurred: {}", e),
            url,
        }
    }
}

impl From<chromiumoxide::error::CdpError> for ScraperError {
    fn from(e: chromiumoxide::error::CdpError) -> Self {
        ScraperError::Browser(e.to_string())
    }
}

impl From<config::ConfigError> for ScraperError {
    fn from(e: config::ConfigError) -> Self {
        ScraperError::Configuration(e.to_string())
    }
}
