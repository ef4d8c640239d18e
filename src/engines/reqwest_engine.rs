// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::{ScraperSettings, Settings};
use crate::documents::StaticDocument;
use crate::domain::models::extraction_rule::ExtractionRule;
use crate::domain::models::options::ScrapeOptions;
use crate::domain::models::page::PageData;
use crate::domain::models::scrape_result::ScraperType;
use crate::domain::services::extraction_service::ExtractionService;
use crate::domain::services::page_analysis::{AnalysisOptions, PageAnalysisService};
use crate::engines::traits::PageFetcher;
use crate::engines::validators::{self, SourcePolicy};
use crate::utils::errors::ScraperError;
use async_trait::async_trait;
use futures::future::BoxFuture;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, COOKIE};
use reqwest::redirect::Policy;
use reqwest::{Client, Method, RequestBuilder};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tracing::{debug, info, warn};

/// sitemap 索引的最大嵌套深度
const MAX_SITEMAP_DEPTH: usize = 5;

/// HTTP 抓取引擎
///
/// 基于 reqwest 获取静态 HTML，共享资源为带连接池和 Cookie 存储的 `Client`
pub struct ReqwestEngine {
    settings: ScraperSettings,
    analysis: AnalysisOptions,
    policy: SourcePolicy,
}

impl ReqwestEngine {
    pub fn new(settings: &Settings) -> Self {
        Self {
            settings: settings.scraper.clone(),
            analysis: settings.extraction.analysis_options(),
            policy: SourcePolicy {
                block_private_networks: settings.scraper.block_private_networks,
                blocked_domains: settings.scraper.blocked_domains.clone(),
            },
        }
    }

    fn build_client(&self) -> Result<Client, ScraperError> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        default_headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

        let redirect = if self.settings.follow_redirects {
            Policy::limited(self.settings.max_redirects)
        } else {
            Policy::none()
        };

        // Deadlines are set per request so a per-call timeout can exceed the default
        Client::builder()
            .user_agent(self.settings.user_agent.as_str())
            .default_headers(default_headers)
            .redirect(redirect)
            .cookie_store(true)
            .danger_accept_invalid_certs(!self.settings.verify_ssl)
            .pool_max_idle_per_host(self.settings.concurrent_requests.max(1))
            .build()
            .map_err(|e| ScraperError::Configuration(format!("Failed to build HTTP client: {}", e)))
    }

    async fn checked_url(&self, source: &str) -> Result<url::Url, ScraperError> {
        let url = validators::validate_source(source)?;
        validators::enforce_policy(&url, &self.policy).await?;
        Ok(url)
    }

    /// 单次请求的超时，选项优先于全局默认值
    fn request_timeout(&self, options: &ScrapeOptions) -> Option<Duration> {
        options
            .timeout_duration()
            .or_else(|| self.settings.default_timeout())
    }

    /// 发送请求并读取完整响应
    ///
    /// 非 2xx 状态码视为连接错误，超时错误带上实际生效的时长
    async fn send(
        &self,
        request: RequestBuilder,
        options: &ScrapeOptions,
    ) -> Result<RawResponse, ScraperError> {
        let timeout = self.request_timeout(options);
        let request = match timeout {
            Some(timeout) => request.timeout(timeout),
            None => request,
        };
        let to_error = move |e: reqwest::Error| ScraperError::from(e).with_timeout(timeout);

        let response = request
            .headers(request_headers(options))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(to_error)?;

        let url = response.url().to_string();
        let status_code = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();
        let content = response.text().await.map_err(to_error)?;
        debug!("Fetched {} ({} bytes)", url, content.len());

        Ok(RawResponse {
            url,
            status_code,
            headers,
            content,
        })
    }

    /// 以任意 HTTP 方法发送请求
    ///
    /// 返回未经提取和分析的原始页面（地址、状态码、响应头、内容）
    pub async fn request(
        &self,
        client: &Client,
        method: &str,
        source: &str,
        body: Option<String>,
        options: &ScrapeOptions,
    ) -> Result<PageData, ScraperError> {
        let method = Method::from_bytes(method.to_uppercase().as_bytes())
            .map_err(|_| ScraperError::Validation(format!("Invalid HTTP method: {}", method)))?;
        let url = self.checked_url(source).await?;

        let mut request = client.request(method, url);
        if let Some(body) = body {
            request = request.body(body);
        }
        let response = self.send(request, options).await?;

        Ok(PageData {
            url: response.url,
            status_code: Some(response.status_code),
            headers: response.headers,
            content: Some(response.content),
            ..Default::default()
        })
    }

    /// 收集 sitemap 中的全部页面地址
    ///
    /// sitemap 索引会递归展开
    pub async fn fetch_sitemap(
        &self,
        client: &Client,
        sitemap_url: &str,
    ) -> Result<Vec<String>, ScraperError> {
        self.collect_sitemap(client, sitemap_url.to_string(), 0).await
    }

    fn collect_sitemap<'a>(
        &'a self,
        client: &'a Client,
        sitemap_url: String,
        depth: usize,
    ) -> BoxFuture<'a, Result<Vec<String>, ScraperError>> {
        Box::pin(async move {
            if depth > MAX_SITEMAP_DEPTH {
                warn!("Sitemap nesting too deep, skipping {}", sitemap_url);
                return Ok(Vec::new());
            }

            let url = self.checked_url(&sitemap_url).await?;
            let body = self
                .send(client.get(url), &ScrapeOptions::default())
                .await?
                .content;

            match parse_sitemap(&body) {
                SitemapEntries::Index(children) => {
                    debug!("Sitemap index {} lists {} sitemaps", sitemap_url, children.len());
                    let mut urls = Vec::new();
                    for child in children {
                        urls.extend(self.collect_sitemap(client, child, depth + 1).await?);
                    }
                    Ok(urls)
                }
                SitemapEntries::UrlSet(urls) => Ok(urls),
            }
        })
    }
}

/// 请求头与 Cookie
fn request_headers(options: &ScrapeOptions) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (k, v) in &options.headers {
        match (HeaderName::from_bytes(k.as_bytes()), HeaderValue::from_str(v)) {
            (Ok(k), Ok(v)) => {
                headers.insert(k, v);
            }
            _ => warn!("Skipping invalid header '{}'", k),
        }
    }

    if let Some(cookie) = cookie_header(&options.cookies) {
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            headers.insert(COOKIE, value);
        }
    }

    headers
}

/// 按名称排序拼接 Cookie 头
fn cookie_header(cookies: &HashMap<String, String>) -> Option<String> {
    if cookies.is_empty() {
        return None;
    }
    let sorted: BTreeMap<&String, &String> = cookies.iter().collect();
    Some(
        sorted
            .into_iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("; "),
    )
}

/// 解析 HTML 并完成提取与页面分析
///
/// 文档树只在这里同步存在，不跨越 await
fn build_page(
    url: String,
    status_code: u16,
    headers: BTreeMap<String, String>,
    content: String,
    rules: &[ExtractionRule],
    analysis: &AnalysisOptions,
) -> Result<PageData, ScraperError> {
    let document = StaticDocument::parse(content.as_str());

    let extracted_data = if rules.is_empty() {
        None
    } else {
        Some(ExtractionService::extract_all(rules, &document)?)
    };

    let mut page = PageData {
        url,
        status_code: Some(status_code),
        headers,
        extracted_data,
        ..Default::default()
    };
    if !content.is_empty() {
        let base = page.url.clone();
        PageAnalysisService::analyze(&document, &base, analysis, &mut page);
        page.title = page.metadata.as_ref().and_then(|m| m.title.clone());
    }
    page.content = Some(content);

    Ok(page)
}

/// 读取完毕的 HTTP 响应
struct RawResponse {
    url: String,
    status_code: u16,
    headers: BTreeMap<String, String>,
    content: String,
}

enum SitemapEntries {
    Index(Vec<String>),
    UrlSet(Vec<String>),
}

fn parse_sitemap(xml: &str) -> SitemapEntries {
    let document = StaticDocument::parse(xml);
    let html = document.html();
    let locs = |css: &str| -> Vec<String> {
        match StaticDocument::compile_selector(css) {
            Ok(selector) => html
                .select(&selector)
                .map(|loc| loc.text().collect::<String>().trim().to_string())
                .filter(|loc| !loc.is_empty())
                .collect(),
            Err(_) => Vec::new(),
        }
    };

    let is_index = StaticDocument::compile_selector("sitemapindex")
        .map(|s| html.select(&s).next().is_some())
        .unwrap_or(false);

    if is_index {
        SitemapEntries::Index(locs("sitemap > loc"))
    } else {
        SitemapEntries::UrlSet(locs("url > loc"))
    }
}

#[async_trait]
impl PageFetcher for ReqwestEngine {
    type Resource = Client;

    fn scraper_type(&self) -> ScraperType {
        ScraperType::WebHttp
    }

    async fn initialize(&self) -> Result<Client, ScraperError> {
        let client = self.build_client()?;
        info!("HTTP client initialized");
        Ok(client)
    }

    async fn cleanup(&self, _client: &Client) -> Result<(), ScraperError> {
        // Connections close when the last clone of the client is dropped
        info!("HTTP client closed");
        Ok(())
    }

    async fn fetch(
        &self,
        client: &Client,
        source: &str,
        options: &ScrapeOptions,
        rules: &[ExtractionRule],
    ) -> Result<PageData, ScraperError> {
        let url = self.checked_url(source).await?;
        let response = self.send(client.get(url), options).await?;

        build_page(
            response.url,
            response.status_code,
            response.headers,
            response.content,
            rules,
            &self.analysis,
        )
    }

    async fn check_source(&self, client: &Client, source: &str) -> Result<(), ScraperError> {
        let url = self.checked_url(source).await?;
        let mut request = client.head(url);
        if let Some(timeout) = self.settings.default_timeout() {
            request = request.timeout(timeout);
        }
        request
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ScraperError::connection(format!("URL validation failed: {}", e), source))?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "reqwest_engine_test.rs"]
mod tests;
