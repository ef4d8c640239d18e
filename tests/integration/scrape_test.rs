// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{html, http_scraper, mount_page};
use extractrs::application::HttpScraper;
use extractrs::config::settings::Settings;
use extractrs::domain::models::extraction_rule::ExtractionRule;
use extractrs::domain::models::options::ScrapeOptions;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_string, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PRODUCT: &str = r#"
<html>
  <head>
    <title>Widget Store</title>
    <meta name="description" content="The best widgets">
    <meta property="og:title" content="Widget">
    <script type="application/ld+json">{"price": {"value": "9.99", "currency": "USD"}}</script>
  </head>
  <body>
    <h1>  Widget  </h1>
    <p class="price">Now only $9.99!</p>
    <ul><li>red</li><li>blue</li></ul>
    <a href="/about" title="About us">About</a>
    <img src="img/w.png" alt="widget">
  </body>
</html>
"#;

#[tokio::test]
async fn test_scrape_extracts_rules_and_analyzes_page() {
    let server = MockServer::start().await;
    mount_page(&server, "/product", PRODUCT).await;

    let scraper = http_scraper();
    let options = ScrapeOptions::default().with_rules(vec![
        ExtractionRule::selector("name", "h1"),
        ExtractionRule::pattern("price", r"\$(\d+\.\d+)").with_transform("float"),
        ExtractionRule::selector("colors", "li").multiple().with_transform("upper"),
        ExtractionRule::structured_path("currency", "price.currency"),
        ExtractionRule::hierarchical_path("first_color", "//ul/li[1]/text()"),
        ExtractionRule::selector("sku", ".sku").with_default("N/A"),
    ]);

    let result = scraper
        .scrape(&format!("{}/product", server.uri()), &options)
        .await;
    scraper.close().await.unwrap();

    assert!(result.success, "{:?}", result.error);
    let page = result.data.as_ref().unwrap();
    assert_eq!(page.status_code, Some(200));
    assert_eq!(page.title.as_deref(), Some("Widget Store"));
    assert_eq!(page.extracted("name"), Some(&json!("Widget")));
    assert_eq!(page.extracted("price"), Some(&json!(9.99)));
    assert_eq!(page.extracted("colors"), Some(&json!(["RED", "BLUE"])));
    assert_eq!(page.extracted("currency"), Some(&json!("USD")));
    assert_eq!(page.extracted("first_color"), Some(&json!("red")));
    assert_eq!(page.extracted("sku"), Some(&json!("N/A")));

    let metadata = page.metadata.as_ref().unwrap();
    assert_eq!(metadata.description.as_deref(), Some("The best widgets"));
    assert_eq!(metadata.og_data.get("og:title").map(String::as_str), Some("Widget"));
    let links = page.links.as_ref().unwrap();
    assert_eq!(links[0].url, format!("{}/about", server.uri()));
    let images = page.images.as_ref().unwrap();
    assert_eq!(images[0].src, format!("{}/img/w.png", server.uri()));
}

#[tokio::test]
async fn test_result_serializes_to_documented_shape() {
    let server = MockServer::start().await;
    mount_page(&server, "/", "<html><body><h1>Hi</h1></body></html>").await;

    let scraper = http_scraper();
    let options = ScrapeOptions::default().with_rules(vec![ExtractionRule::selector("title", "h1")]);
    let result = scraper.scrape(&format!("{}/", server.uri()), &options).await;

    let value = serde_json::to_value(&result).unwrap();
    assert_eq!(value["success"], json!(true));
    assert_eq!(value["error"], json!(null));
    assert_eq!(value["data"]["extracted_data"]["title"], json!("Hi"));
    assert_eq!(value["metadata"]["scraper_type"], json!("web_http"));
    assert_eq!(value["metadata"]["records_scraped"], json!(1));
}

#[tokio::test]
async fn test_http_error_becomes_failed_result() {
    let server = MockServer::start().await;

    let scraper = http_scraper();
    let result = scraper
        .scrape(&format!("{}/missing", server.uri()), &ScrapeOptions::default())
        .await;

    assert!(!result.success);
    assert!(result.data.is_none());
    assert!(result.error.unwrap().contains("404"));
    assert_eq!(result.metadata.errors_count, 1);
    assert_eq!(scraper.get_stats().failed_requests, 1);
}

#[tokio::test]
async fn test_required_rule_fails_the_scrape() {
    let server = MockServer::start().await;
    mount_page(&server, "/", "<p>no price here</p>").await;

    let scraper = http_scraper();
    let options = ScrapeOptions::default()
        .with_rules(vec![ExtractionRule::selector("price", ".price").required()]);
    let result = scraper.scrape(&format!("{}/", server.uri()), &options).await;

    assert!(!result.success);
    assert!(result.error.unwrap().contains("'price'"));
}

#[tokio::test]
async fn test_slow_response_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(html("<p>late</p>").set_delay(Duration::from_millis(800)))
        .mount(&server)
        .await;

    let scraper = http_scraper();
    let result = scraper
        .scrape(
            &format!("{}/slow", server.uri()),
            &ScrapeOptions::default().with_timeout(0.1),
        )
        .await;

    assert!(!result.success);
    assert_eq!(
        result.error.as_deref(),
        Some("Scraping operation timed out after 0.1s")
    );
}

#[tokio::test]
async fn test_option_timeout_longer_than_default_is_honored() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(html("<h1>late</h1>").set_delay(Duration::from_millis(600)))
        .mount(&server)
        .await;

    let mut settings = Settings::default();
    settings.scraper.default_timeout_secs = 0.25;
    let scraper = HttpScraper::http(settings);
    let source = format!("{}/slow", server.uri());

    let result = scraper
        .scrape(&source, &ScrapeOptions::default().with_timeout(5.0))
        .await;
    assert!(result.success, "{:?}", result.error);

    let result = scraper.scrape(&source, &ScrapeOptions::default()).await;
    assert_eq!(
        result.error.as_deref(),
        Some("Scraping operation timed out after 0.25s")
    );
}

#[tokio::test]
async fn test_make_request_posts_body_and_forms_are_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .and(body_string(r#"{"user":"ann"}"#))
        .respond_with(html(r#"<form action="/next" method="post"><input name="otp"></form>"#))
        .mount(&server)
        .await;
    mount_page(
        &server,
        "/signup",
        r#"<form action="/join"><input type="email" name="email" required></form>"#,
    )
    .await;

    let scraper = http_scraper();
    let raw = scraper
        .make_request(
            "POST",
            &format!("{}/login", server.uri()),
            Some(json!({"user": "ann"}).to_string()),
            &ScrapeOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(raw.status_code, Some(200));
    assert!(raw.content.unwrap().contains("otp"));

    let mut settings = Settings::default();
    settings.extraction.extract_forms = true;
    let scraper = HttpScraper::http(settings);
    let result = scraper
        .scrape(&format!("{}/signup", server.uri()), &ScrapeOptions::default())
        .await;
    let forms = result.data.unwrap().forms.unwrap();
    assert_eq!(forms[0].action, "/join");
    assert_eq!(forms[0].method, "get");
    assert_eq!(forms[0].inputs[0].field_type, "email");
    assert!(forms[0].inputs[0].required);
}

#[tokio::test]
async fn test_scrape_multiple_keeps_input_order() {
    let server = MockServer::start().await;
    for (route, delay) in [("/a", 300), ("/b", 0), ("/c", 150)] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(
                html(format!("<h1>{}</h1>", route)).set_delay(Duration::from_millis(delay)),
            )
            .mount(&server)
            .await;
    }
    let sources: Vec<String> = ["/a", "/b", "/missing", "/c"]
        .iter()
        .map(|route| format!("{}{}", server.uri(), route))
        .collect();

    let scraper = http_scraper();
    let options = ScrapeOptions::default().with_rules(vec![ExtractionRule::selector("h", "h1")]);
    let results = scraper.scrape_multiple(&sources, Some(2), &options).await;

    let headings: Vec<Option<serde_json::Value>> = results
        .iter()
        .map(|r| r.data.as_ref().and_then(|d| d.extracted("h").cloned()))
        .collect();
    assert_eq!(
        headings,
        vec![Some(json!("/a")), Some(json!("/b")), None, Some(json!("/c"))]
    );
    let reported: Vec<&str> = results.iter().map(|r| r.metadata.source.as_str()).collect();
    assert_eq!(reported, sources.iter().map(String::as_str).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_validate_checks_reachability() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/up"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let scraper = http_scraper();
    assert!(scraper.validate(&format!("{}/up", server.uri())).await);
    assert!(!scraper.validate(&format!("{}/down", server.uri())).await);
    assert!(!scraper.validate("not a url").await);
}

#[tokio::test]
async fn test_sitemap_urls_can_be_scraped() {
    let server = MockServer::start().await;
    let base = server.uri();
    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
            <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
                <url><loc>{base}/one</loc></url>
                <url><loc>{base}/two</loc></url>
            </urlset>"#
        )))
        .mount(&server)
        .await;
    mount_page(&server, "/one", "<h1>One</h1>").await;
    mount_page(&server, "/two", "<h1>Two</h1>").await;

    let scraper = http_scraper();
    let urls = scraper
        .scrape_sitemap(&format!("{base}/sitemap.xml"))
        .await
        .unwrap();
    assert_eq!(urls, vec![format!("{base}/one"), format!("{base}/two")]);

    let results = scraper
        .scrape_multiple(&urls, None, &ScrapeOptions::default())
        .await;
    assert!(results.iter().all(|r| r.success));
    assert!(results[0].data.as_ref().unwrap().content.as_ref().unwrap().contains("One"));
    assert!(results[1].data.as_ref().unwrap().content.as_ref().unwrap().contains("Two"));
}
