// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::documents::{QueryableDocument, StaticDocument};
use crate::domain::models::options::PaginationConfig;
use crate::domain::models::page::PageData;
use crate::domain::models::scrape_result::ScraperResult;
use crate::utils::url_utils::absolutize;
use serde_json::Value;
use tracing::debug;

/// 提取结果中约定的下一页键
pub const NEXT_PAGE_URL_KEY: &str = "next_page_url";

/// 停止翻页的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// 本页抓取失败
    FetchFailed,
    /// 达到最大页数
    MaxPagesReached,
    /// 页面内容包含停止子串
    StopConditionMet,
}

/// 分页服务
///
/// 根据已抓取的页面决定下一个要抓取的地址
pub struct PaginationService;

impl PaginationService {
    /// 在求下一页之前由调用方检查的停止条件
    pub fn stop_reason(
        result: &ScraperResult<PageData>,
        pages_visited: usize,
        config: &PaginationConfig,
    ) -> Option<StopReason> {
        let page = match (&result.data, result.success) {
            (Some(page), true) => page,
            _ => return Some(StopReason::FetchFailed),
        };

        if config.max_pages.is_some_and(|max| pages_visited >= max) {
            return Some(StopReason::MaxPagesReached);
        }

        if let (Some(condition), Some(content)) = (&config.stop_condition, &page.content) {
            if !condition.is_empty() && content.contains(condition.as_str()) {
                return Some(StopReason::StopConditionMet);
            }
        }

        None
    }

    /// 下一页地址
    ///
    /// 依次尝试：提取结果中的 `next_page_url`、下一页选择器、URL 模板
    pub fn next_source(
        current_source: &str,
        page: &PageData,
        page_number: usize,
        config: &PaginationConfig,
    ) -> Option<String> {
        if let Some(extracted) = &page.extracted_data {
            if let Some(next) = extracted.get(NEXT_PAGE_URL_KEY) {
                return match next {
                    Value::String(url) => Some(url.clone()),
                    _ => None,
                };
            }
        }

        if !config.enabled {
            return None;
        }

        if let (Some(selector), Some(content)) = (&config.next_page_selector, &page.content) {
            if let Some(href) = Self::next_link_href(content, selector) {
                return Some(absolutize(&[page.url.as_str(), current_source], &href));
            }
        }

        config
            .next_page_url_pattern
            .as_deref()
            .and_then(|pattern| format_pattern(pattern, page_number, config.page_size))
    }

    fn next_link_href(content: &str, selector: &str) -> Option<String> {
        let document = StaticDocument::parse(content);
        match document.select_first(selector) {
            Ok(Some(node)) => document
                .node_attribute(&node, "href")
                .filter(|href| !href.trim().is_empty()),
            Ok(None) => None,
            Err(e) => {
                debug!("Next page selector failed: {}", e);
                None
            }
        }
    }
}

/// 填充 URL 模板
///
/// `{page}` 替换为 page_number + 1，`{offset}` 替换为 page_number * page_size；
/// 两者都没有时返回 None
pub fn format_pattern(pattern: &str, page_number: usize, page_size: usize) -> Option<String> {
    if pattern.contains("{offset}") {
        return Some(pattern.replace("{offset}", &(page_number * page_size).to_string()));
    }
    if pattern.contains("{page}") {
        return Some(pattern.replace("{page}", &(page_number + 1).to_string()));
    }
    None
}
