// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use metrics::{describe_counter, describe_histogram};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// 抓取总数，标签 scraper_type / outcome
pub const SCRAPES_TOTAL: &str = "extractrs_scrapes_total";
/// 抓取耗时
pub const SCRAPE_DURATION_SECONDS: &str = "extractrs_scrape_duration_seconds";
/// 提取记录数
pub const RECORDS_SCRAPED_TOTAL: &str = "extractrs_records_scraped_total";

/// 初始化日志
///
/// `RUST_LOG` 未设置时使用 `info,extractrs=debug`；`EXTRACTRS_LOG_FORMAT=json` 时输出 JSON。
/// 重复调用是安全的。
pub fn init_telemetry() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,extractrs=debug".into());
    let json = std::env::var("EXTRACTRS_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let result = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
    };

    if result.is_ok() {
        describe_metrics();
    }
}

/// 注册指标描述
pub fn describe_metrics() {
    describe_counter!(SCRAPES_TOTAL, "Total number of scrape operations by outcome");
    describe_counter!(
        RECORDS_SCRAPED_TOTAL,
        "Total number of records produced by successful scrapes"
    );
    describe_histogram!(
        SCRAPE_DURATION_SECONDS,
        "Duration of scrape operations in seconds"
    );
}
