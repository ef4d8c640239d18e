// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::Settings;
use crate::domain::models::extraction_rule::ExtractionRule;
use crate::domain::models::options::ScrapeOptions;
use crate::domain::models::page::PageData;
use crate::domain::models::scrape_result::{
    count_records, ScraperMetadata, ScraperResult, ScraperStats, ScraperType,
};
use crate::domain::services::pagination_service::PaginationService;
use crate::engines::chromium_engine::ChromiumEngine;
use crate::engines::reqwest_engine::ReqwestEngine;
use crate::engines::traits::PageFetcher;
use crate::utils::errors::ScraperError;
use crate::utils::telemetry::{RECORDS_SCRAPED_TOTAL, SCRAPES_TOTAL, SCRAPE_DURATION_SECONDS};
use crate::utils::url_utils::absolutize;
use futures::future::join_all;
use futures::FutureExt;
use metrics::{counter, histogram};
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// HTTP 抓取器
pub type HttpScraper = Scraper<ReqwestEngine>;
/// 浏览器抓取器
pub type BrowserScraper = Scraper<ChromiumEngine>;

/// 抓取编排器
///
/// 在后端之上提供共享资源的生命周期管理、超时、错误归类、统计和批量并发。
/// `scrape` 永远不返回错误，所有失败都转换为 `success=false` 的结果。
pub struct Scraper<F: PageFetcher> {
    fetcher: F,
    settings: Settings,
    resource: tokio::sync::Mutex<Option<Arc<F::Resource>>>,
    default_rules: RwLock<Vec<ExtractionRule>>,
    stats: Mutex<ScraperStats>,
}

impl HttpScraper {
    /// 使用 reqwest 后端创建抓取器
    pub fn http(settings: Settings) -> Self {
        Self::new(ReqwestEngine::new(&settings), settings)
    }

    /// 读取 sitemap 中的全部页面地址
    pub async fn scrape_sitemap(&self, sitemap_url: &str) -> Result<Vec<String>, ScraperError> {
        let client = self.resource().await?;
        self.fetcher.fetch_sitemap(&client, sitemap_url).await
    }

    /// 以自定义方法和请求体发送请求，返回原始响应页面
    pub async fn make_request(
        &self,
        method: &str,
        source: &str,
        body: Option<String>,
        options: &ScrapeOptions,
    ) -> Result<PageData, ScraperError> {
        options.validate()?;
        let client = self.resource().await?;
        self.fetcher.request(&client, method, source, body, options).await
    }
}

impl BrowserScraper {
    /// 使用 chromiumoxide 后端创建抓取器
    pub fn browser(settings: Settings) -> Self {
        Self::new(ChromiumEngine::new(&settings), settings)
    }
}

impl<F: PageFetcher> Scraper<F> {
    pub fn new(fetcher: F, settings: Settings) -> Self {
        Self {
            fetcher,
            settings,
            resource: tokio::sync::Mutex::new(None),
            default_rules: RwLock::new(Vec::new()),
            stats: Mutex::new(ScraperStats::default()),
        }
    }

    pub fn scraper_type(&self) -> ScraperType {
        self.fetcher.scraper_type()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// 初始化共享资源，重复调用不会重新创建
    pub async fn initialize(&self) -> Result<(), ScraperError> {
        self.resource().await.map(|_| ())
    }

    async fn resource(&self) -> Result<Arc<F::Resource>, ScraperError> {
        let mut slot = self.resource.lock().await;
        if let Some(resource) = slot.as_ref() {
            return Ok(Arc::clone(resource));
        }

        let resource = Arc::new(self.fetcher.initialize().await?);
        *slot = Some(Arc::clone(&resource));
        Ok(resource)
    }

    /// 释放共享资源
    ///
    /// 未初始化或已关闭时直接返回；之后的抓取会重新初始化
    pub async fn close(&self) -> Result<(), ScraperError> {
        let resource = self.resource.lock().await.take();
        match resource {
            Some(resource) => self.fetcher.cleanup(&resource).await,
            None => Ok(()),
        }
    }

    /// 添加抓取器级别的默认提取规则
    pub fn add_extraction_rule(&self, rule: ExtractionRule) {
        self.default_rules.write().push(rule);
    }

    pub fn clear_extraction_rules(&self) {
        self.default_rules.write().clear();
    }

    pub fn extraction_rules(&self) -> Vec<ExtractionRule> {
        self.default_rules.read().clone()
    }

    /// 当前统计，平均响应时间在读取时计算
    pub fn get_stats(&self) -> ScraperStats {
        let mut stats = self.stats.lock().clone();
        if stats.total_requests > 0 {
            stats.average_response_time = stats.total_duration / stats.total_requests as f64;
        }
        stats
    }

    pub fn reset_stats(&self) {
        *self.stats.lock() = ScraperStats::default();
    }

    /// 抓取单个来源
    #[instrument(
        skip(self, options),
        fields(request_id = %Uuid::new_v4(), scraper_type = self.scraper_type().as_str())
    )]
    pub async fn scrape(&self, source: &str, options: &ScrapeOptions) -> ScraperResult<PageData> {
        let started = Instant::now();
        let mut metadata = ScraperMetadata::new(self.scraper_type(), source);
        info!("Starting scraping operation");

        let outcome = AssertUnwindSafe(self.run_scrape(source, options))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(ScraperError::Unexpected(anyhow::anyhow!(panic_message(&panic)))));

        let duration = started.elapsed().as_secs_f64();
        metadata.duration_seconds = Some(duration);
        let scraper_type = self.scraper_type().as_str();
        histogram!(SCRAPE_DURATION_SECONDS, "scraper_type" => scraper_type).record(duration);

        match outcome {
            Ok(page) => {
                metadata.records_scraped = serde_json::to_value(&page)
                    .map(|value| count_records(&value))
                    .unwrap_or(1);
                self.record(true, duration);
                counter!(SCRAPES_TOTAL, "scraper_type" => scraper_type, "outcome" => "success")
                    .increment(1);
                counter!(RECORDS_SCRAPED_TOTAL, "scraper_type" => scraper_type)
                    .increment(metadata.records_scraped as u64);
                info!(
                    duration,
                    records = metadata.records_scraped,
                    "Scraping completed successfully"
                );
                ScraperResult::succeeded(page, metadata)
            }
            Err(e) => {
                metadata.errors_count = 1;
                self.record(false, duration);
                counter!(SCRAPES_TOTAL, "scraper_type" => scraper_type, "outcome" => "failure")
                    .increment(1);
                if e.is_known() {
                    warn!(error = %e, kind = e.kind(), "Scraping failed with known error");
                } else {
                    error!(error = %e, "Scraping failed with unexpected error");
                }
                ScraperResult::failed(e.to_string(), metadata)
            }
        }
    }

    async fn run_scrape(&self, source: &str, options: &ScrapeOptions) -> Result<PageData, ScraperError> {
        options.validate()?;
        if let Some(method) = options.method {
            if method.scraper_type() != self.scraper_type() {
                return Err(ScraperError::Validation(format!(
                    "method '{}' is not supported by the {} scraper",
                    method.as_str(),
                    self.scraper_type().as_str()
                )));
            }
        }
        let resource = self.resource().await?;

        let rules = match &options.extraction_rules {
            Some(rules) => rules.clone(),
            None => self.extraction_rules(),
        };

        let fetch = self.fetcher.fetch(&resource, source, options, &rules);
        match self.effective_timeout(options) {
            Some(timeout) => tokio::time::timeout(timeout, fetch)
                .await
                .map_err(|_| ScraperError::Timeout {
                    url: source.to_string(),
                    timeout,
                })?,
            None => fetch.await,
        }
    }

    fn effective_timeout(&self, options: &ScrapeOptions) -> Option<Duration> {
        options
            .timeout_duration()
            .or_else(|| self.settings.scraper.default_timeout())
    }

    fn record(&self, success: bool, duration: f64) {
        let mut stats = self.stats.lock();
        stats.total_requests += 1;
        if success {
            stats.successful_requests += 1;
        } else {
            stats.failed_requests += 1;
        }
        stats.total_duration += duration;
    }

    /// 并发抓取多个来源
    ///
    /// 同时进行的抓取数不超过 `max_concurrent`（默认取配置的 `concurrent_requests`），
    /// 返回顺序与输入顺序一致
    pub async fn scrape_multiple<S: AsRef<str>>(
        &self,
        sources: &[S],
        max_concurrent: Option<usize>,
        options: &ScrapeOptions,
    ) -> Vec<ScraperResult<PageData>> {
        let permits = max_concurrent
            .or(options.max_concurrent)
            .unwrap_or(self.settings.scraper.concurrent_requests)
            .max(1);
        let semaphore = Semaphore::new(permits);
        debug!("Scraping {} sources with {} permits", sources.len(), permits);

        let tasks = sources.iter().map(|source| {
            let semaphore = &semaphore;
            async move {
                let _permit = semaphore.acquire().await;
                self.scrape(source.as_ref(), options).await
            }
        });

        join_all(tasks).await
    }

    /// 检查来源是否可达
    pub async fn validate(&self, source: &str) -> bool {
        let resource = match self.resource().await {
            Ok(resource) => resource,
            Err(e) => {
                warn!("Source validation failed for {}: {}", source, e);
                return false;
            }
        };

        match self.fetcher.check_source(&resource, source).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Source validation failed for {}: {}", source, e);
                false
            }
        }
    }

    /// 依次抓取分页
    ///
    /// 抓取失败、达到最大页数、出现停止子串或没有下一页时停止；
    /// 失败的那一页也包含在返回结果中
    pub async fn scrape_paginated(
        &self,
        start: &str,
        options: &ScrapeOptions,
    ) -> Vec<ScraperResult<PageData>> {
        let config = self.settings.pagination.merged_with(options);
        let mut results = Vec::new();
        let mut visited = HashSet::new();
        let mut current = start.to_string();
        let mut page_number = 1;

        loop {
            visited.insert(current.clone());
            let result = self.scrape(&current, options).await;
            let stop = PaginationService::stop_reason(&result, results.len() + 1, &config);
            let next = match (&stop, &result.data) {
                (None, Some(page)) => PaginationService::next_source(&current, page, page_number, &config)
                    .map(|next| absolutize(&[page.url.as_str(), current.as_str()], &next)),
                _ => None,
            };
            results.push(result);

            if let Some(reason) = stop {
                debug!("Pagination stopped after {} pages: {:?}", results.len(), reason);
                break;
            }
            match next {
                Some(next) if visited.contains(&next) => {
                    warn!("Pagination loop detected at {}, stopping", next);
                    break;
                }
                Some(next) => {
                    current = next;
                    page_number += 1;
                }
                None => break,
            }
        }

        results
    }

    /// 抓取所有分页，只返回成功页面的数据
    pub async fn scrape_all_pages(&self, start: &str, options: &ScrapeOptions) -> Vec<PageData> {
        self.scrape_paginated(start, options)
            .await
            .into_iter()
            .filter(|result| result.success)
            .filter_map(|result| result.data)
            .collect()
    }
}

fn panic_message(panic: &Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic during scrape".to_string()
    }
}

#[cfg(test)]
#[path = "scraper_test.rs"]
mod tests;
