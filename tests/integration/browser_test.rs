// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::mount_page;
use extractrs::application::BrowserScraper;
use extractrs::config::settings::Settings;
use extractrs::domain::models::extraction_rule::ExtractionRule;
use extractrs::domain::models::options::{PageAction, ScrapeOptions};
use serde_json::json;
use wiremock::MockServer;

const APP: &str = r#"
<html>
  <head><title>Counter</title></head>
  <body>
    <button id="inc" onclick="document.getElementById('count').textContent = '1'; console.log('clicked')">+</button>
    <span id="count">0</span>
    <script>
      setTimeout(() => {
        const p = document.createElement('p');
        p.className = 'late';
        p.textContent = 'loaded';
        document.body.appendChild(p);
      }, 100);
    </script>
  </body>
</html>
"#;

#[tokio::test]
#[ignore = "requires a local Chrome installation"]
async fn test_browser_scrape_runs_actions_and_captures_console() {
    let server = MockServer::start().await;
    mount_page(&server, "/app", APP).await;

    let scraper = BrowserScraper::browser(Settings::default());
    let options = ScrapeOptions {
        wait_for_selector: Some(".late".to_string()),
        actions: vec![PageAction::Click {
            selector: "#inc".to_string(),
        }],
        capture_console: true,
        screenshot: true,
        ..Default::default()
    }
    .with_rules(vec![
        ExtractionRule::selector("count", "#count").with_transform("int"),
        ExtractionRule::selector("late", "p.late"),
    ]);

    let result = scraper
        .scrape(&format!("{}/app", server.uri()), &options)
        .await;
    scraper.close().await.unwrap();

    assert!(result.success, "{:?}", result.error);
    let page = result.data.unwrap();
    assert_eq!(page.status_code, None);
    assert_eq!(page.title.as_deref(), Some("Counter"));
    assert_eq!(page.extracted("count"), Some(&json!(1)));
    assert_eq!(page.extracted("late"), Some(&json!("loaded")));
    assert!(page.screenshot.is_some());
    assert!(page
        .console_logs
        .unwrap_or_default()
        .iter()
        .any(|line| line.contains("clicked")));
}

#[tokio::test]
#[ignore = "requires a local Chrome installation"]
async fn test_browser_validate_and_close_are_idempotent() {
    let server = MockServer::start().await;
    mount_page(&server, "/", "<p>ok</p>").await;

    let scraper = BrowserScraper::browser(Settings::default());
    assert!(scraper.validate(&format!("{}/", server.uri())).await);
    scraper.close().await.unwrap();
    scraper.close().await.unwrap();
}
