// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::application::scraper::{BrowserScraper, HttpScraper};
use crate::config::settings::Settings;
use crate::domain::models::extraction_rule::ExtractionRule;
use crate::domain::models::options::{ScrapeMethod, ScrapeOptions};
use crate::domain::models::page::PageData;
use crate::domain::models::scrape_result::{ScraperResult, ScraperStats, ScraperType};
use crate::utils::errors::ScraperError;

/// 按抓取方式选择的抓取器
pub enum ScraperKind {
    Http(HttpScraper),
    Browser(BrowserScraper),
}

macro_rules! dispatch {
    ($self:ident, $scraper:ident => $body:expr) => {
        match $self {
            ScraperKind::Http($scraper) => $body,
            ScraperKind::Browser($scraper) => $body,
        }
    };
}

impl ScraperKind {
    pub fn new(method: ScrapeMethod, settings: Settings) -> Self {
        match method {
            ScrapeMethod::Static => ScraperKind::Http(HttpScraper::http(settings)),
            ScrapeMethod::Browser => ScraperKind::Browser(BrowserScraper::browser(settings)),
        }
    }

    /// 使用配置中的默认抓取方式
    pub fn from_settings(settings: Settings) -> Self {
        let method = settings.scraper.default_method;
        Self::new(method, settings)
    }

    pub fn scraper_type(&self) -> ScraperType {
        dispatch!(self, s => s.scraper_type())
    }

    pub async fn scrape(&self, source: &str, options: &ScrapeOptions) -> ScraperResult<PageData> {
        dispatch!(self, s => s.scrape(source, options).await)
    }

    pub async fn scrape_multiple<S: AsRef<str>>(
        &self,
        sources: &[S],
        max_concurrent: Option<usize>,
        options: &ScrapeOptions,
    ) -> Vec<ScraperResult<PageData>> {
        dispatch!(self, s => s.scrape_multiple(sources, max_concurrent, options).await)
    }

    pub async fn scrape_paginated(
        &self,
        start: &str,
        options: &ScrapeOptions,
    ) -> Vec<ScraperResult<PageData>> {
        dispatch!(self, s => s.scrape_paginated(start, options).await)
    }

    pub async fn scrape_all_pages(&self, start: &str, options: &ScrapeOptions) -> Vec<PageData> {
        dispatch!(self, s => s.scrape_all_pages(start, options).await)
    }

    pub async fn validate(&self, source: &str) -> bool {
        dispatch!(self, s => s.validate(source).await)
    }

    pub fn add_extraction_rule(&self, rule: ExtractionRule) {
        dispatch!(self, s => s.add_extraction_rule(rule))
    }

    pub fn clear_extraction_rules(&self) {
        dispatch!(self, s => s.clear_extraction_rules())
    }

    pub fn get_stats(&self) -> ScraperStats {
        dispatch!(self, s => s.get_stats())
    }

    pub fn reset_stats(&self) {
        dispatch!(self, s => s.reset_stats())
    }

    pub async fn close(&self) -> Result<(), ScraperError> {
        dispatch!(self, s => s.close().await)
    }
}
