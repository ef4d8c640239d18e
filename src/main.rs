// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use extractrs::application::ScraperKind;
use extractrs::config::settings::Settings;
use extractrs::domain::models::options::ScrapeOptions;
use extractrs::utils::telemetry;
use tracing::{info, warn};

/// 主函数
///
/// 抓取命令行给出的每个 URL，并以 JSON 输出结果
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize logging
    telemetry::init_telemetry();
    info!("Starting extractrs...");

    // 2. Load configuration
    let settings = Settings::new()?;
    info!("Configuration loaded");

    let sources: Vec<String> = std::env::args().skip(1).collect();
    if sources.is_empty() {
        anyhow::bail!("usage: extractrs <url> [<url> ...]");
    }

    // 3. Build the scraper for the configured method
    let scraper = ScraperKind::from_settings(settings);
    info!("Using {} scraper", scraper.scraper_type().as_str());

    // 4. Scrape
    let results = scraper
        .scrape_multiple(&sources, None, &ScrapeOptions::default())
        .await;
    println!("{}", serde_json::to_string_pretty(&results)?);

    let failed = results.iter().filter(|r| !r.success).count();
    if failed > 0 {
        warn!("{} of {} sources failed", failed, results.len());
    }

    // 5. Release the shared backend resource
    scraper.close().await?;
    info!("Shutdown complete");

    Ok(())
}
