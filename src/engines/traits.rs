// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::extraction_rule::ExtractionRule;
use crate::domain::models::options::ScrapeOptions;
use crate::domain::models::page::PageData;
use crate::domain::models::scrape_result::ScraperType;
use crate::utils::errors::ScraperError;
use async_trait::async_trait;

/// 抓取后端特质
///
/// 每个后端提供共享资源（HTTP 连接池或浏览器）的初始化与清理、
/// 单页抓取与提取，以及抓取源可达性检查。编排层负责超时、错误归类和并发控制。
#[async_trait]
pub trait PageFetcher: Send + Sync + 'static {
    /// 共享资源，在同一抓取器实例的所有操作间复用
    type Resource: Send + Sync + 'static;

    /// 后端类型
    fn scraper_type(&self) -> ScraperType;

    /// 创建共享资源
    async fn initialize(&self) -> Result<Self::Resource, ScraperError>;

    /// 释放共享资源
    async fn cleanup(&self, resource: &Self::Resource) -> Result<(), ScraperError>;

    /// 抓取一个页面并按规则提取
    ///
    /// 传输层失败必须转换为 `ScraperError`，不允许原始错误泄漏
    async fn fetch(
        &self,
        resource: &Self::Resource,
        source: &str,
        options: &ScrapeOptions,
        rules: &[ExtractionRule],
    ) -> Result<PageData, ScraperError>;

    /// 检查抓取源是否可达
    async fn check_source(
        &self,
        resource: &Self::Resource,
        source: &str,
    ) -> Result<(), ScraperError>;
}
