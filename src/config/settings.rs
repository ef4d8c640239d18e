// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::options::{
    CacheConfig, PaginationConfig, RateLimitConfig, RetryConfig, ScrapeMethod,
};
use crate::domain::services::page_analysis::AnalysisOptions;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// 默认 User-Agent
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// 应用程序配置设置
///
/// 包含抓取、提取、浏览器、分页以及暂未生效的重试、限速、缓存配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// 抓取配置
    pub scraper: ScraperSettings,
    /// 页面分析配置
    pub extraction: ExtractionSettings,
    /// 浏览器配置
    pub browser: BrowserSettings,
    /// 分页配置
    pub pagination: PaginationConfig,
    /// 重试配置（不生效）
    pub retry: RetryConfig,
    /// 限速配置（不生效）
    pub rate_limit: RateLimitConfig,
    /// 缓存配置（不生效）
    pub cache: CacheConfig,
}

/// 抓取配置设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperSettings {
    /// 请求使用的 User-Agent
    pub user_agent: String,
    /// 默认超时时间（秒）
    pub default_timeout_secs: f64,
    /// 批量抓取的默认并发数
    pub concurrent_requests: usize,
    /// 是否校验 TLS 证书
    pub verify_ssl: bool,
    /// 是否跟随重定向
    pub follow_redirects: bool,
    /// 最大重定向次数
    pub max_redirects: usize,
    /// 命令行使用的后端
    pub default_method: ScrapeMethod,
    /// 拒绝解析到私有网络地址的抓取源
    pub block_private_networks: bool,
    /// 禁止抓取的域名（包含子域名）
    pub blocked_domains: Vec<String>,
}

impl Default for ScraperSettings {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            default_timeout_secs: 30.0,
            concurrent_requests: 5,
            verify_ssl: true,
            follow_redirects: true,
            max_redirects: 10,
            default_method: ScrapeMethod::Static,
            block_private_networks: false,
            blocked_domains: Vec::new(),
        }
    }
}

impl ScraperSettings {
    /// 默认超时，非正数表示不限制
    pub fn default_timeout(&self) -> Option<Duration> {
        if self.default_timeout_secs > 0.0 {
            Duration::try_from_secs_f64(self.default_timeout_secs).ok()
        } else {
            None
        }
    }
}

/// 页面分析配置设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionSettings {
    pub extract_metadata: bool,
    pub extract_links: bool,
    pub extract_images: bool,
    pub extract_tables: bool,
    pub extract_forms: bool,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            extract_metadata: true,
            extract_links: true,
            extract_images: true,
            extract_tables: false,
            extract_forms: false,
        }
    }
}

impl ExtractionSettings {
    pub fn analysis_options(&self) -> AnalysisOptions {
        AnalysisOptions {
            metadata: self.extract_metadata,
            links: self.extract_links,
            images: self.extract_images,
            tables: self.extract_tables,
            forms: self.extract_forms,
        }
    }
}

/// 浏览器配置设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// 无头模式
    pub headless: bool,
    /// 视口宽度
    pub viewport_width: u32,
    /// 视口高度
    pub viewport_height: u32,
    /// 远程调试地址，设置后连接已有的 Chrome 而不是启动新进程
    pub remote_debugging_url: Option<String>,
    /// Chrome 可执行文件路径
    pub executable_path: Option<String>,
    /// 浏览器协议请求超时（秒）
    pub request_timeout_secs: u64,
    /// 等待选择器的默认超时（秒）
    pub wait_for_timeout_secs: f64,
    /// 截图格式 (png, jpeg)
    pub screenshot_format: String,
    /// 截图质量 (jpeg)
    pub screenshot_quality: u8,
    /// 是否截取整页
    pub screenshot_full_page: bool,
    /// 额外的 Chrome 启动参数
    pub args: Vec<String>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            viewport_width: 1920,
            viewport_height: 1080,
            remote_debugging_url: None,
            executable_path: None,
            request_timeout_secs: 30,
            wait_for_timeout_secs: 10.0,
            screenshot_format: "png".to_string(),
            screenshot_quality: 85,
            screenshot_full_page: true,
            args: vec![
                "--disable-gpu".to_string(),
                "--disable-dev-shm-usage".to_string(),
            ],
        }
    }
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 依次叠加内置默认值、`config/default`、`config/{APP_ENVIRONMENT}` 和 `EXTRACTRS__` 前缀的环境变量
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - 成功加载的配置
    /// * `Err(ConfigError)` - 配置加载失败
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        Self::load_from(Path::new("config"), &env)
    }

    /// 从指定目录加载配置
    pub fn load_from(dir: &Path, environment: &str) -> Result<Self, ConfigError> {
        let default_file = dir.join("default");
        let env_file = dir.join(environment);

        let builder = Config::builder()
            .set_default("scraper.default_method", "static")?
            .set_default("scraper.concurrent_requests", 5)?
            .add_source(File::with_name(&default_file.to_string_lossy()).required(false))
            .add_source(File::with_name(&env_file.to_string_lossy()).required(false))
            .add_source(
                Environment::with_prefix("EXTRACTRS")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
#[path = "settings_test.rs"]
mod tests;
