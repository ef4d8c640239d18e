// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::documents::static_document::element_text;
use crate::documents::{QueryableDocument, StaticDocument};
use crate::domain::models::page::{
    FormField, FormInfo, ImageInfo, LinkInfo, PageData, PageMetadata, SelectOption,
};
use crate::utils::url_utils::absolutize;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Selector};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

static META: Lazy<Selector> = Lazy::new(|| Selector::parse("meta").unwrap());
static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());
static CANONICAL: Lazy<Selector> = Lazy::new(|| Selector::parse(r#"link[rel="canonical"]"#).unwrap());
static LINKS: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());
static IMAGES: Lazy<Selector> = Lazy::new(|| Selector::parse("img").unwrap());
static TABLES: Lazy<Selector> = Lazy::new(|| Selector::parse("table").unwrap());
static THEAD_ROW: Lazy<Selector> = Lazy::new(|| Selector::parse("thead tr").unwrap());
static TBODY: Lazy<Selector> = Lazy::new(|| Selector::parse("tbody").unwrap());
static ROW: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").unwrap());
static CELL: Lazy<Selector> = Lazy::new(|| Selector::parse("th, td").unwrap());
static HEADER_CELL: Lazy<Selector> = Lazy::new(|| Selector::parse("th").unwrap());
static FORMS: Lazy<Selector> = Lazy::new(|| Selector::parse("form").unwrap());
static FORM_FIELDS: Lazy<Selector> = Lazy::new(|| Selector::parse("input, select, textarea").unwrap());
static OPTIONS: Lazy<Selector> = Lazy::new(|| Selector::parse("option").unwrap());

/// 页面分析开关
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisOptions {
    pub metadata: bool,
    pub links: bool,
    pub images: bool,
    pub tables: bool,
    pub forms: bool,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            metadata: true,
            links: true,
            images: true,
            tables: false,
            forms: false,
        }
    }
}

/// 页面分析服务
///
/// 收集元数据、链接、图片与表格，填充到 `PageData`
pub struct PageAnalysisService;

impl PageAnalysisService {
    /// 按开关分析文档
    pub fn analyze(
        document: &StaticDocument,
        base_url: &str,
        options: &AnalysisOptions,
        page: &mut PageData,
    ) {
        if options.metadata {
            page.metadata = Some(Self::extract_metadata(document));
        }
        if options.links {
            page.links = Some(Self::extract_links(document, base_url));
        }
        if options.images {
            page.images = Some(Self::extract_images(document, base_url));
        }
        if options.tables {
            page.tables = Some(Self::extract_tables(document));
        }
        if options.forms {
            page.forms = Some(Self::extract_forms(document));
        }
    }

    /// 页面元数据
    pub fn extract_metadata(document: &StaticDocument) -> PageMetadata {
        let html = document.html();
        let mut metadata = PageMetadata {
            title: html.select(&TITLE).next().map(|t| element_text(&t)),
            language: html.root_element().value().attr("lang").map(str::to_string),
            canonical_url: html
                .select(&CANONICAL)
                .next()
                .and_then(|link| link.value().attr("href"))
                .map(str::to_string),
            schema_data: document.structured_blocks(),
            ..Default::default()
        };

        for meta in html.select(&META) {
            let name = meta.value().attr("name").unwrap_or_default().to_lowercase();
            let property = meta.value().attr("property").unwrap_or_default().to_lowercase();
            let content = meta.value().attr("content").unwrap_or_default().to_string();

            match name.as_str() {
                "description" => metadata.description = Some(content),
                "keywords" => metadata.keywords = Some(content),
                "author" => metadata.author = Some(content),
                _ if property.starts_with("og:") => {
                    metadata.og_data.insert(property, content);
                }
                _ if name.starts_with("twitter:") => {
                    metadata.twitter_data.insert(name, content);
                }
                _ => {}
            }
        }

        metadata
    }

    /// 页面链接，相对地址按 base_url 解析
    pub fn extract_links(document: &StaticDocument, base_url: &str) -> Vec<LinkInfo> {
        document
            .html()
            .select(&LINKS)
            .filter_map(|link| {
                let href = link.value().attr("href")?;
                Some(LinkInfo {
                    url: absolutize(&[base_url], href),
                    text: element_text(&link),
                    title: link.value().attr("title").unwrap_or_default().to_string(),
                })
            })
            .collect()
    }

    /// 页面图片
    pub fn extract_images(document: &StaticDocument, base_url: &str) -> Vec<ImageInfo> {
        document
            .html()
            .select(&IMAGES)
            .map(|img| {
                let attr = |name: &str| img.value().attr(name).unwrap_or_default().to_string();
                let src = attr("src");
                ImageInfo {
                    src: if src.is_empty() {
                        src
                    } else {
                        absolutize(&[base_url], &src)
                    },
                    alt: attr("alt"),
                    title: attr("title"),
                    width: attr("width"),
                    height: attr("height"),
                }
            })
            .collect()
    }

    /// 页面表格
    ///
    /// 单元格数量与表头一致的行转换为以表头为键的对象，否则为字符串数组。没有行的表格被忽略。
    pub fn extract_tables(document: &StaticDocument) -> Vec<Vec<Value>> {
        document
            .html()
            .select(&TABLES)
            .filter_map(|table| {
                let rows = parse_table(table);
                (!rows.is_empty()).then_some(rows)
            })
            .collect()
    }

    /// 页面表单及其字段，下拉框附带选项
    pub fn extract_forms(document: &StaticDocument) -> Vec<FormInfo> {
        document
            .html()
            .select(&FORMS)
            .map(|form| FormInfo {
                action: form.value().attr("action").unwrap_or_default().to_string(),
                method: form.value().attr("method").unwrap_or("get").to_lowercase(),
                id: form.value().attr("id").map(str::to_string),
                inputs: form.select(&FORM_FIELDS).map(form_field).collect(),
            })
            .collect()
    }
}

fn form_field(field: ElementRef<'_>) -> FormField {
    let element = field.value();
    let attr = |name: &str| element.attr(name).map(str::to_string);
    let name = element.name();

    let options = (name == "select").then(|| {
        field
            .select(&OPTIONS)
            .map(|option| {
                let text = element_text(&option);
                SelectOption {
                    value: option.value().attr("value").map(str::to_string).unwrap_or_else(|| text.clone()),
                    text,
                }
            })
            .collect()
    });

    FormField {
        field_type: if name == "input" {
            attr("type").unwrap_or_else(|| "text".to_string())
        } else {
            name.to_string()
        },
        name: attr("name"),
        id: attr("id"),
        value: attr("value"),
        placeholder: attr("placeholder"),
        required: element.attr("required").is_some(),
        options,
    }
}

fn cell_texts(row: ElementRef<'_>, selector: &Selector) -> Vec<String> {
    row.select(selector).map(|cell| element_text(&cell)).collect()
}

fn parse_table(table: ElementRef<'_>) -> Vec<Value> {
    let mut headers = table
        .select(&THEAD_ROW)
        .next()
        .map(|row| cell_texts(row, &CELL))
        .unwrap_or_default();
    let mut header_from_body = false;

    if headers.is_empty() {
        if let Some(first) = table.select(&ROW).next() {
            headers = cell_texts(first, &HEADER_CELL);
            header_from_body = !headers.is_empty();
        }
    }

    let body = table.select(&TBODY).next().unwrap_or(table);
    let mut rows = Vec::new();

    for (index, tr) in body.select(&ROW).enumerate() {
        // Header rows already captured above
        if tr.ancestors().filter_map(ElementRef::wrap).any(|a| a.value().name() == "thead") {
            continue;
        }
        let cells = cell_texts(tr, &CELL);
        if cells.is_empty() {
            continue;
        }
        if index == 0 && header_from_body && cells == headers {
            continue;
        }

        if !headers.is_empty() && cells.len() == headers.len() {
            let object: Map<String, Value> = headers
                .iter()
                .cloned()
                .zip(cells.into_iter().map(Value::String))
                .collect();
            rows.push(Value::Object(object));
        } else {
            rows.push(Value::Array(cells.into_iter().map(Value::String).collect()));
        }
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PAGE: &str = r#"
        <html lang="en">
            <head>
                <title> Catalog </title>
                <meta name="Description" content="All products">
                <meta name="keywords" content="a,b">
                <meta name="author" content="Jane">
                <meta property="og:title" content="OG Catalog">
                <meta name="twitter:card" content="summary">
                <link rel="canonical" href="https://shop.test/catalog">
                <script type="application/ld+json">{"@type": "WebPage"}</script>
            </head>
            <body>
                <a href="/item/1" title="First">Item 1</a>
                <a href="https://other.test/x">External</a>
                <a>No href</a>
                <img src="img/a.png" alt="A" width="10" height="20">
                <img alt="missing src">
                <table>
                    <thead><tr><th>Name</th><th>Price</th></tr></thead>
                    <tbody>
                        <tr><td>Widget</td><td>9.99</td></tr>
                        <tr><td colspan="2">Total only</td></tr>
                    </tbody>
                </table>
                <table>
                    <tr><th>K</th><th>V</th></tr>
                    <tr><td>a</td><td>1</td></tr>
                </table>
                <table></table>
            </body>
        </html>
    "#;

    #[test]
    fn test_metadata() {
        let doc = StaticDocument::parse(PAGE);
        let meta = PageAnalysisService::extract_metadata(&doc);
        assert_eq!(meta.title.as_deref(), Some("Catalog"));
        assert_eq!(meta.description.as_deref(), Some("All products"));
        assert_eq!(meta.keywords.as_deref(), Some("a,b"));
        assert_eq!(meta.author.as_deref(), Some("Jane"));
        assert_eq!(meta.language.as_deref(), Some("en"));
        assert_eq!(meta.canonical_url.as_deref(), Some("https://shop.test/catalog"));
        assert_eq!(meta.og_data.get("og:title").map(String::as_str), Some("OG Catalog"));
        assert_eq!(meta.twitter_data.get("twitter:card").map(String::as_str), Some("summary"));
        assert_eq!(meta.schema_data, vec![json!({"@type": "WebPage"})]);
    }

    #[test]
    fn test_links_and_images_are_absolutized() {
        let doc = StaticDocument::parse(PAGE);
        let links = PageAnalysisService::extract_links(&doc, "https://shop.test/catalog/");
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].url, "https://shop.test/item/1");
        assert_eq!(links[0].title, "First");
        assert_eq!(links[1].url, "https://other.test/x");

        let images = PageAnalysisService::extract_images(&doc, "https://shop.test/catalog/");
        assert_eq!(images[0].src, "https://shop.test/catalog/img/a.png");
        assert_eq!(images[0].width, "10");
        assert_eq!(images[1].src, "");
    }

    #[test]
    fn test_tables() {
        let doc = StaticDocument::parse(PAGE);
        let tables = PageAnalysisService::extract_tables(&doc);
        assert_eq!(tables.len(), 2);
        assert_eq!(
            tables[0],
            vec![json!({"Name": "Widget", "Price": "9.99"}), json!(["Total only"])]
        );
        assert_eq!(tables[1], vec![json!({"K": "a", "V": "1"})]);
    }

    #[test]
    fn test_analyze_respects_switches() {
        let doc = StaticDocument::parse(PAGE);
        let mut page = PageData::default();
        let options = AnalysisOptions {
            metadata: true,
            links: false,
            images: false,
            tables: true,
            forms: false,
        };
        PageAnalysisService::analyze(&doc, "https://shop.test/", &options, &mut page);
        assert!(page.metadata.is_some());
        assert!(page.links.is_none());
        assert!(page.images.is_none());
        assert_eq!(page.tables.map(|t| t.len()), Some(2));
        assert!(page.forms.is_none());
    }

    #[test]
    fn test_forms() {
        let doc = StaticDocument::parse(
            r#"<form id="search" action="/find" method="POST">
                   <input name="q" placeholder="Search" required>
                   <input type="hidden" name="page" value="1">
                   <select name="sort">
                       <option value="new">Newest</option>
                       <option>Oldest</option>
                   </select>
                   <textarea name="note"></textarea>
               </form>
               <form></form>"#,
        );
        let forms = PageAnalysisService::extract_forms(&doc);
        assert_eq!(forms.len(), 2);

        let search = &forms[0];
        assert_eq!(search.action, "/find");
        assert_eq!(search.method, "post");
        assert_eq!(search.id.as_deref(), Some("search"));
        let types: Vec<&str> = search.inputs.iter().map(|f| f.field_type.as_str()).collect();
        assert_eq!(types, vec!["text", "hidden", "select", "textarea"]);
        assert!(search.inputs[0].required);
        assert_eq!(search.inputs[0].placeholder.as_deref(), Some("Search"));
        assert_eq!(search.inputs[1].value.as_deref(), Some("1"));
        assert_eq!(
            search.inputs[2].options,
            Some(vec![
                SelectOption {
                    value: "new".to_string(),
                    text: "Newest".to_string()
                },
                SelectOption {
                    value: "Oldest".to_string(),
                    text: "Oldest".to_string()
                },
            ])
        );
        assert!(search.inputs[3].options.is_none());

        assert_eq!(forms[1].method, "get");
        assert!(forms[1].inputs.is_empty());
        assert_eq!(
            serde_json::to_value(&search.inputs[0]).unwrap()["type"],
            json!("text")
        );
    }
}
