// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 应用程序模块
///
/// 抓取编排：共享资源生命周期、超时、错误归类、批量并发和分页遍历
pub mod scraper;
pub mod scraper_kind;

pub use scraper::{BrowserScraper, HttpScraper, Scraper};
pub use scraper_kind::ScraperKind;
