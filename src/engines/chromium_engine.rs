// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::{BrowserSettings, Settings};
use crate::documents::{CapturedElement, LiveDocument};
use crate::domain::models::extraction_rule::{ExtractionMethod, ExtractionRule};
use crate::domain::models::options::{PageAction, ScrapeOptions};
use crate::domain::models::page::{CookieInfo, NetworkRequest, PageData};
use crate::domain::models::scrape_result::ScraperType;
use crate::domain::services::extraction_service::ExtractionService;
use crate::domain::services::page_analysis::{AnalysisOptions, PageAnalysisService};
use crate::engines::traits::PageFetcher;
use crate::engines::validators::{self, SourcePolicy};
use crate::utils::errors::ScraperError;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chromiumoxide::cdp::browser_protocol::network::{CookieParam, EventRequestWillBeSent};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::cdp::js_protocol::runtime::{EvaluateParams, EventConsoleApiCalled};
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::{FutureExt, StreamExt};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::ops::Deref;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// 选择器轮询间隔
const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(100);
const DEFAULT_SELECTOR_WAIT: Duration = Duration::from_secs(10);
/// 滚动到底部的单步距离（像素）与最大步数
const SCROLL_STEP_PX: u32 = 100;
const MAX_SCROLL_STEPS: usize = 500;

/// 浏览器会话
///
/// 持有浏览器连接和处理 CDP 事件的后台任务
pub struct BrowserSession {
    browser: RwLock<Browser>,
    handler: JoinHandle<()>,
    remote: bool,
}

/// 抓取中的标签页
///
/// 正常结束时调用 `close`；抓取被取消（例如超时）时在 drop 中后台关闭
struct OpenPage {
    page: Page,
    closed: bool,
}

impl OpenPage {
    fn new(page: Page) -> Self {
        Self { page, closed: false }
    }

    async fn close(mut self) {
        self.closed = true;
        if let Err(e) = self.page.clone().close().await {
            debug!("Failed to close page: {}", e);
        }
    }
}

impl Deref for OpenPage {
    type Target = Page;

    fn deref(&self) -> &Page {
        &self.page
    }
}

impl Drop for OpenPage {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        let page = self.page.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = page.close().await {
                        debug!("Failed to close abandoned page: {}", e);
                    }
                });
            }
            Err(_) => warn!("No runtime available to close abandoned page"),
        }
    }
}

/// 无头浏览器抓取引擎
///
/// 基于 chromiumoxide，每次抓取打开一个新标签页，抓取结束后关闭
pub struct ChromiumEngine {
    settings: BrowserSettings,
    user_agent: String,
    analysis: AnalysisOptions,
    policy: SourcePolicy,
}

impl ChromiumEngine {
    pub fn new(settings: &Settings) -> Self {
        Self {
            settings: settings.browser.clone(),
            user_agent: settings.scraper.user_agent.clone(),
            analysis: settings.extraction.analysis_options(),
            policy: SourcePolicy {
                block_private_networks: settings.scraper.block_private_networks,
                blocked_domains: settings.scraper.blocked_domains.clone(),
            },
        }
    }

    fn browser_config(&self) -> Result<BrowserConfig, ScraperError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .request_timeout(Duration::from_secs(self.settings.request_timeout_secs))
            .window_size(self.settings.viewport_width, self.settings.viewport_height)
            .arg(format!("--user-agent={}", self.user_agent));

        if !self.settings.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &self.settings.executable_path {
            builder = builder.chrome_executable(path);
        }
        for arg in &self.settings.args {
            builder = builder.arg(arg.as_str());
        }

        builder.build().map_err(ScraperError::Configuration)
    }

    async fn checked_url(&self, source: &str) -> Result<url::Url, ScraperError> {
        let url = validators::validate_source(source)?;
        validators::enforce_policy(&url, &self.policy).await?;
        Ok(url)
    }

    async fn open_page(&self, session: &BrowserSession) -> Result<OpenPage, ScraperError> {
        let browser = session.browser.read().await;
        Ok(OpenPage::new(browser.new_page("about:blank").await?))
    }

    /// 加载页面并执行交互，返回渲染后的页面数据
    async fn drive_page(
        &self,
        page: &Page,
        source: &str,
        options: &ScrapeOptions,
        rules: &[ExtractionRule],
    ) -> Result<PageData, ScraperError> {
        if !options.cookies.is_empty() {
            let cookies = options
                .cookies
                .iter()
                .map(|(name, value)| {
                    CookieParam::builder()
                        .name(name.as_str())
                        .value(value.as_str())
                        .url(source)
                        .build()
                        .map_err(ScraperError::Validation)
                })
                .collect::<Result<Vec<_>, _>>()?;
            page.set_cookies(cookies).await?;
        }

        let mut console_events = if options.capture_console {
            Some(page.event_listener::<EventConsoleApiCalled>().await?)
        } else {
            None
        };
        let mut request_events = if options.capture_network {
            Some(page.event_listener::<EventRequestWillBeSent>().await?)
        } else {
            None
        };

        page.goto(source).await.map_err(|e| {
            ScraperError::connection(format!("Failed to navigate to {}: {}", source, e), source)
        })?;

        if let Some(selector) = &options.wait_for_selector {
            let timeout = options
                .wait_for_duration()
                .or_else(|| Duration::try_from_secs_f64(self.settings.wait_for_timeout_secs).ok())
                .unwrap_or(DEFAULT_SELECTOR_WAIT);
            if !wait_for_selector(page, selector, timeout).await {
                warn!("Timeout waiting for selector: {}", selector);
            }
        }

        for action in &options.actions {
            run_action(page, action).await?;
        }

        if let Some(script) = &options.execute_js {
            evaluate(page, script.as_str()).await?;
        }

        if options.scroll_to_bottom {
            scroll_to_bottom(page).await?;
        }

        let captured = capture_selectors(page, rules).await?;
        let content = page.content().await?;
        let final_url = page.url().await?.unwrap_or_else(|| source.to_string());
        let title = page.get_title().await?;

        let cookies = page
            .get_cookies()
            .await?
            .into_iter()
            .map(|c| CookieInfo {
                name: c.name,
                value: c.value,
                domain: c.domain,
                path: c.path,
            })
            .collect();

        let screenshot = if options.screenshot {
            Some(self.screenshot(page).await?)
        } else {
            None
        };

        // Only events that already arrived are drained
        let console_logs = console_events.as_mut().map(|events| {
            let mut logs = Vec::new();
            while let Some(Some(event)) = events.next().now_or_never() {
                logs.push(console_line(&event));
            }
            logs
        });
        let network_requests = request_events.as_mut().map(|events| {
            let mut requests = Vec::new();
            while let Some(Some(event)) = events.next().now_or_never() {
                requests.push(NetworkRequest {
                    url: event.request.url.clone(),
                    method: event.request.method.clone(),
                    resource_type: event
                        .r#type
                        .as_ref()
                        .map(|t| format!("{:?}", t).to_lowercase()),
                });
            }
            requests
        });

        let mut data = build_page(final_url, content, captured, rules, &self.analysis)?;
        data.title = title.or(data.title);
        data.cookies = Some(cookies);
        data.screenshot = screenshot;
        data.console_logs = console_logs.filter(|logs| !logs.is_empty());
        data.network_requests = network_requests.filter(|requests| !requests.is_empty());
        Ok(data)
    }

    async fn screenshot(&self, page: &Page) -> Result<String, ScraperError> {
        let jpeg = matches!(self.settings.screenshot_format.as_str(), "jpeg" | "jpg");
        let mut params = ScreenshotParams::builder().full_page(self.settings.screenshot_full_page);
        if jpeg {
            params = params
                .format(CaptureScreenshotFormat::Jpeg)
                .quality(self.settings.screenshot_quality as i64);
        } else {
            params = params.format(CaptureScreenshotFormat::Png);
        }

        let bytes = page
            .screenshot(params.build())
            .await
            .map_err(|e| ScraperError::Browser(format!("Page screenshot failed: {}", e)))?;
        Ok(BASE64.encode(bytes))
    }
}

/// 解析渲染后的页面并完成提取与页面分析
///
/// 文档树只在这里同步存在，不跨越 await
fn build_page(
    url: String,
    content: String,
    captured: HashMap<String, Vec<CapturedElement>>,
    rules: &[ExtractionRule],
    analysis: &AnalysisOptions,
) -> Result<PageData, ScraperError> {
    let document = LiveDocument::new(content.as_str(), captured);

    let extracted_data = if rules.is_empty() {
        None
    } else {
        Some(ExtractionService::extract_all(rules, &document)?)
    };

    let mut page = PageData {
        url,
        extracted_data,
        ..Default::default()
    };
    if !content.is_empty() {
        let base = page.url.clone();
        PageAnalysisService::analyze(document.rendered(), &base, analysis, &mut page);
        page.title = page.metadata.as_ref().and_then(|m| m.title.clone());
    }
    page.content = Some(content);

    Ok(page)
}

async fn evaluate(page: &Page, expression: &str) -> Result<chromiumoxide::js::EvaluationResult, ScraperError> {
    let params = EvaluateParams::builder()
        .expression(expression)
        .return_by_value(true)
        .await_promise(true)
        .build()
        .map_err(ScraperError::Validation)?;
    page.evaluate_expression(params)
        .await
        .map_err(|e| ScraperError::Browser(format!("Script evaluation failed: {}", e)))
}

async fn evaluate_value<T: DeserializeOwned>(page: &Page, expression: &str) -> Result<T, ScraperError> {
    evaluate(page, expression)
        .await?
        .into_value()
        .map_err(|e| ScraperError::Parsing(format!("Unexpected script result: {}", e)))
}

/// 轮询等待选择器出现，超时返回 false
async fn wait_for_selector(page: &Page, selector: &str, timeout: Duration) -> bool {
    let started = Instant::now();
    loop {
        if page.find_element(selector).await.is_ok() {
            return true;
        }
        if started.elapsed() >= timeout {
            return false;
        }
        tokio::time::sleep(SELECTOR_POLL_INTERVAL).await;
    }
}

async fn run_action(page: &Page, action: &PageAction) -> Result<(), ScraperError> {
    debug!("Running page action {:?}", action);
    match action {
        PageAction::Wait { milliseconds } => {
            tokio::time::sleep(Duration::from_millis(*milliseconds)).await;
        }
        PageAction::Click { selector } => {
            page.find_element(selector.as_str())
                .await
                .map_err(|e| ScraperError::Browser(format!("Click failed, element not found: {}", e)))?
                .click()
                .await
                .map_err(|e| ScraperError::Browser(format!("Click failed: {}", e)))?;
        }
        PageAction::Fill { selector, value } => {
            page.find_element(selector.as_str())
                .await
                .map_err(|e| ScraperError::Browser(format!("Fill failed, element not found: {}", e)))?
                .click()
                .await
                .map_err(|e| ScraperError::Browser(format!("Fill failed: {}", e)))?
                .type_str(value)
                .await
                .map_err(|e| ScraperError::Browser(format!("Fill failed: {}", e)))?;
        }
        PageAction::Select { selector, value } => {
            let script = format!(
                "(() => {{ const el = document.querySelector({sel}); if (!el) return false; \
                 el.value = {val}; el.dispatchEvent(new Event('change', {{ bubbles: true }})); return true; }})()",
                sel = js_string(selector),
                val = js_string(value),
            );
            let found: bool = evaluate_value(page, &script).await?;
            if !found {
                return Err(ScraperError::Browser(format!(
                    "Select failed, element not found: {}",
                    selector
                )));
            }
        }
        PageAction::Hover { selector } => {
            page.find_element(selector.as_str())
                .await
                .map_err(|e| ScraperError::Browser(format!("Hover failed, element not found: {}", e)))?
                .hover()
                .await
                .map_err(|e| ScraperError::Browser(format!("Hover failed: {}", e)))?;
        }
        PageAction::Scroll { direction } => {
            evaluate(page, scroll_script(direction)).await?;
        }
    }
    Ok(())
}

fn scroll_script(direction: &str) -> &'static str {
    match direction {
        "up" => "window.scrollBy(0, -window.innerHeight)",
        "bottom" => "window.scrollTo(0, document.body.scrollHeight)",
        "top" => "window.scrollTo(0, 0)",
        _ => "window.scrollBy(0, window.innerHeight)",
    }
}

/// 分步滚动到页面底部以触发懒加载
async fn scroll_to_bottom(page: &Page) -> Result<(), ScraperError> {
    let step = format!(
        "(() => {{ const s = document.scrollingElement || document.body; \
         s.scrollBy(0, {}); return s.scrollTop + window.innerHeight < s.scrollHeight; }})()",
        SCROLL_STEP_PX
    );
    for _ in 0..MAX_SCROLL_STEPS {
        let more: bool = evaluate_value(page, &step).await?;
        if !more {
            break;
        }
        tokio::time::sleep(SELECTOR_POLL_INTERVAL).await;
    }
    Ok(())
}

/// 在页面中执行 CSS 选择器规则，捕获匹配元素的文本和属性
async fn capture_selectors(
    page: &Page,
    rules: &[ExtractionRule],
) -> Result<HashMap<String, Vec<CapturedElement>>, ScraperError> {
    let selectors: Vec<&str> = rules
        .iter()
        .filter_map(|rule| match &rule.method {
            Some(ExtractionMethod::CssSelector(selector)) => Some(selector.as_str()),
            _ => None,
        })
        .collect();
    if selectors.is_empty() {
        return Ok(HashMap::new());
    }

    evaluate_value(page, &capture_script(&selectors)).await
}

fn capture_script(selectors: &[&str]) -> String {
    let list = serde_json::to_string(selectors).unwrap_or_else(|_| "[]".to_string());
    format!(
        r#"(() => {{
    const out = {{}};
    for (const s of {list}) {{
        try {{
            out[s] = Array.from(document.querySelectorAll(s)).map(el => ({{
                text: (el.textContent || '').trim(),
                attributes: Object.fromEntries(Array.from(el.attributes).map(a => [a.name, a.value]))
            }}));
        }} catch (e) {{}}
    }}
    return out;
}})()"#
    )
}

fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

fn console_line(event: &EventConsoleApiCalled) -> String {
    let text = event
        .args
        .iter()
        .map(|arg| match &arg.value {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => arg.description.clone().unwrap_or_default(),
        })
        .collect::<Vec<_>>()
        .join(" ");
    format!("[{}] {}", format!("{:?}", event.r#type).to_lowercase(), text)
}

#[async_trait]
impl PageFetcher for ChromiumEngine {
    type Resource = BrowserSession;

    fn scraper_type(&self) -> ScraperType {
        ScraperType::WebBrowser
    }

    async fn initialize(&self) -> Result<BrowserSession, ScraperError> {
        let remote = self.settings.remote_debugging_url.is_some();
        let (browser, mut handler) = if let Some(url) = &self.settings.remote_debugging_url {
            info!("Connecting to remote Chrome instance at: {}", url);
            Browser::connect(url.as_str())
                .await
                .map_err(|e| ScraperError::Browser(format!("Failed to connect to remote Chrome: {}", e)))?
        } else {
            Browser::launch(self.browser_config()?)
                .await
                .map_err(|e| ScraperError::Browser(format!("Failed to launch Chrome: {}", e)))?
        };

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        info!("Browser initialized (headless: {})", self.settings.headless);
        Ok(BrowserSession {
            browser: RwLock::new(browser),
            handler,
            remote,
        })
    }

    async fn cleanup(&self, session: &BrowserSession) -> Result<(), ScraperError> {
        if !session.remote {
            let mut browser = session.browser.write().await;
            if let Err(e) = browser.close().await {
                warn!("Failed to close browser: {}", e);
            }
            if let Err(e) = browser.wait().await {
                warn!("Failed to wait for browser process: {}", e);
            }
        }
        session.handler.abort();
        info!("Browser resources cleaned up");
        Ok(())
    }

    async fn fetch(
        &self,
        session: &BrowserSession,
        source: &str,
        options: &ScrapeOptions,
        rules: &[ExtractionRule],
    ) -> Result<PageData, ScraperError> {
        self.checked_url(source).await?;

        let page = self.open_page(session).await?;
        let result = self.drive_page(&page, source, options, rules).await;
        page.close().await;

        result
    }

    async fn check_source(&self, session: &BrowserSession, source: &str) -> Result<(), ScraperError> {
        self.checked_url(source).await?;

        let page = self.open_page(session).await?;
        let result = page
            .goto(source)
            .await
            .map(|_| ())
            .map_err(|e| ScraperError::connection(format!("URL validation failed: {}", e), source));
        page.close().await;

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_capture_script_embeds_selectors_as_json() {
        let script = capture_script(&["h1", "a[href=\"/x\"]"]);
        assert!(script.contains(r#"["h1","a[href=\"/x\"]"]"#));
        assert!(script.contains("querySelectorAll"));
    }

    #[test]
    fn test_scroll_script_defaults_to_down() {
        assert_eq!(scroll_script("sideways"), scroll_script("down"));
        assert!(scroll_script("top").contains("scrollTo(0, 0)"));
    }

    #[test]
    fn test_build_page_prefers_captured_elements() {
        let captured = HashMap::from([(
            "h1".to_string(),
            vec![CapturedElement {
                text: "Rendered later".to_string(),
                attributes: HashMap::new(),
            }],
        )]);
        let page = build_page(
            "https://b.test/".to_string(),
            "<html><head><title>B</title></head><body><h1>Initial</h1></body></html>".to_string(),
            captured,
            &[ExtractionRule::selector("heading", "h1")],
            &AnalysisOptions::default(),
        )
        .unwrap();

        assert_eq!(page.extracted("heading"), Some(&json!("Rendered later")));
        assert_eq!(page.title.as_deref(), Some("B"));
        assert_eq!(page.status_code, None);
    }

    #[tokio::test]
    #[ignore = "requires a local Chrome installation"]
    async fn test_browser_sees_script_rendered_content() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/app"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string(
                        "<html><head><title>App</title></head><body><div id='root'></div>\
                         <script>document.getElementById('root').innerHTML = '<p class=\"msg\">ready</p>';</script>\
                         </body></html>",
                    ),
            )
            .mount(&server)
            .await;

        let engine = ChromiumEngine::new(&Settings::default());
        let session = engine.initialize().await.unwrap();
        let options = ScrapeOptions {
            wait_for_selector: Some(".msg".to_string()),
            ..Default::default()
        };
        let page = engine
            .fetch(
                &session,
                &format!("{}/app", server.uri()),
                &options,
                &[ExtractionRule::selector("message", ".msg")],
            )
            .await
            .unwrap();
        engine.cleanup(&session).await.unwrap();

        assert_eq!(page.extracted("message"), Some(&json!("ready")));
        assert_eq!(page.title.as_deref(), Some("App"));
        assert!(page.cookies.is_some());
    }

    #[tokio::test]
    #[ignore = "requires a local Chrome installation"]
    async fn test_cancelled_fetch_closes_its_tab() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/hang"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<p>late</p>")
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let engine = ChromiumEngine::new(&Settings::default());
        let session = engine.initialize().await.unwrap();
        let before = session.browser.read().await.pages().await.unwrap().len();

        let url = format!("{}/hang", server.uri());
        let options = ScrapeOptions::default();
        let fetch = engine.fetch(&session, &url, &options, &[]);
        assert!(tokio::time::timeout(Duration::from_millis(500), fetch).await.is_err());
        tokio::time::sleep(Duration::from_millis(500)).await;

        let after = session.browser.read().await.pages().await.unwrap().len();
        engine.cleanup(&session).await.unwrap();
        assert_eq!(after, before);
    }
}
