// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{http_scraper, mount_page};
use extractrs::domain::models::extraction_rule::ExtractionRule;
use extractrs::domain::models::options::ScrapeOptions;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn listing(item: &str, next: Option<&str>) -> String {
    let next = next
        .map(|href| format!(r#"<a class="next" href="{}">Next</a>"#, href))
        .unwrap_or_default();
    format!(
        r#"<html><body><ul><li class="item">{}</li></ul>{}</body></html>"#,
        item, next
    )
}

fn item_rules() -> Vec<ExtractionRule> {
    vec![ExtractionRule::selector("item", "li.item")]
}

#[tokio::test]
async fn test_next_link_is_resolved_against_the_fetched_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/start"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("location", "/list/page1"),
        )
        .mount(&server)
        .await;
    mount_page(&server, "/list/page1", listing("first", Some("page2"))).await;
    mount_page(&server, "/list/page2", listing("second", Some("/list/page3"))).await;
    mount_page(&server, "/list/page3", listing("third", None)).await;

    let scraper = http_scraper();
    let options = ScrapeOptions {
        pagination_selector: Some("a.next".to_string()),
        ..Default::default()
    }
    .with_rules(item_rules());

    let results = scraper
        .scrape_paginated(&format!("{}/start", server.uri()), &options)
        .await;

    let urls: Vec<String> = results
        .iter()
        .map(|r| r.data.as_ref().unwrap().url.clone())
        .collect();
    assert_eq!(
        urls,
        vec![
            format!("{}/list/page1", server.uri()),
            format!("{}/list/page2", server.uri()),
            format!("{}/list/page3", server.uri()),
        ]
    );
    let items: Vec<_> = results
        .iter()
        .map(|r| r.data.as_ref().unwrap().extracted("item").cloned())
        .collect();
    assert_eq!(
        items,
        vec![Some(json!("first")), Some(json!("second")), Some(json!("third"))]
    );
}

#[tokio::test]
async fn test_url_pattern_pagination_until_failure() {
    let server = MockServer::start().await;
    for page in 1..=3 {
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("page", page.to_string()))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string(listing(&format!("result {}", page), None)),
            )
            .mount(&server)
            .await;
    }

    let scraper = http_scraper();
    let options = ScrapeOptions {
        pagination_pattern: Some(format!("{}/search?page={{page}}", server.uri())),
        ..Default::default()
    }
    .with_rules(item_rules());

    let start = format!("{}/search?page=1", server.uri());
    let results = scraper.scrape_paginated(&start, &options).await;

    // pages 1..=3 succeed, page 4 is a 404 and ends the traversal
    assert_eq!(results.len(), 4);
    assert!(results[..3].iter().all(|r| r.success));
    assert!(!results[3].success);

    let pages = scraper.scrape_all_pages(&start, &options).await;
    assert_eq!(pages.len(), 3);
    assert_eq!(pages[2].extracted("item"), Some(&json!("result 3")));
}

#[tokio::test]
async fn test_max_pages_caps_traversal() {
    let server = MockServer::start().await;
    mount_page(&server, "/p1", listing("1", Some("/p2"))).await;
    mount_page(&server, "/p2", listing("2", Some("/p3"))).await;
    mount_page(&server, "/p3", listing("3", None)).await;

    let scraper = http_scraper();
    let options = ScrapeOptions {
        pagination_selector: Some("a.next".to_string()),
        max_pages: Some(2),
        ..Default::default()
    };

    let results = scraper
        .scrape_paginated(&format!("{}/p1", server.uri()), &options)
        .await;
    assert_eq!(results.len(), 2);
}
