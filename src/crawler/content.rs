//! Page content extraction
//!
//! A step extracts either a markdown rendition of the page or, when the
//! caller supplies a JSON schema, an object filled according to that schema.
//! The content is opaque JSON to the rest of the crawler.

use crate::crawler::fetcher::RenderedPage;
use crate::RippleError;
use async_trait::async_trait;
use scraper::{Html, Selector};
use serde_json::{json, Map, Number, Value};

/// What a step extracts from a page
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionMode {
    /// `{title, markdown, markdown_length}`
    Markdown,

    /// An object whose fields are described by a JSON schema
    Structured { schema: Value },
}

impl ExtractionMode {
    /// Picks the mode for an optional schema
    ///
    /// A missing, null, or empty schema selects markdown.
    pub fn from_schema(schema: Option<&Value>) -> Self {
        match schema {
            None | Some(Value::Null) => Self::Markdown,
            Some(Value::Object(map)) if map.is_empty() => Self::Markdown,
            Some(schema) => Self::Structured {
                schema: schema.clone(),
            },
        }
    }
}

/// Capability that turns a rendered page into content
#[async_trait]
pub trait ContentExtractor: Send + Sync {
    async fn markdown(&self, page: &RenderedPage) -> Result<Value, RippleError>;

    async fn structured(&self, page: &RenderedPage, schema: &Value) -> Result<Value, RippleError>;
}

/// Runs the extraction `mode` asks for
pub async fn extract_content(
    extractor: &dyn ContentExtractor,
    page: &RenderedPage,
    mode: &ExtractionMode,
) -> Result<Value, RippleError> {
    match mode {
        ExtractionMode::Markdown => extractor.markdown(page).await,
        ExtractionMode::Structured { schema } => extractor.structured(page, schema).await,
    }
}

/// Deterministic extractor working on the page HTML
///
/// Markdown comes from `htmd`. Structured extraction fills each schema
/// property from, in order: JSON-LD blocks, microdata (`itemprop`), and
/// `<meta>` tags, with the page title and URL as a last resort for
/// `title` and `url`.
#[derive(Debug, Clone, Default)]
pub struct HtmlContentExtractor;

impl HtmlContentExtractor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ContentExtractor for HtmlContentExtractor {
    async fn markdown(&self, page: &RenderedPage) -> Result<Value, RippleError> {
        let markdown = html_to_markdown(&page.html);
        Ok(json!({
            "title": page.title.clone().unwrap_or_default(),
            "markdown_length": markdown.chars().count(),
            "markdown": markdown,
        }))
    }

    async fn structured(&self, page: &RenderedPage, schema: &Value) -> Result<Value, RippleError> {
        let extraction_error = |message: String| RippleError::Extraction {
            url: page.url.to_string(),
            message,
        };

        let properties = schema
            .get("properties")
            .and_then(Value::as_object)
            .ok_or_else(|| extraction_error("schema has no properties".to_string()))?;

        let sources = PageSources::parse(page);
        let mut data = Map::new();

        for (name, property) in properties {
            let expected = property.get("type").and_then(Value::as_str);
            if let Some(value) = sources.lookup(name).and_then(|v| coerce(v, expected)) {
                data.insert(name.clone(), value);
            }
        }

        let missing: Vec<&str> = schema
            .get("required")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
            .filter(|field| !data.contains_key(*field))
            .collect();

        if !missing.is_empty() {
            return Err(extraction_error(format!(
                "required fields not found: {}",
                missing.join(", ")
            )));
        }

        Ok(Value::Object(data))
    }
}

/// Convert HTML to Markdown
fn html_to_markdown(html: &str) -> String {
    htmd::convert(html).unwrap_or_else(|_| {
        // Fallback: strip tags and return plain text
        let document = Html::parse_document(html);
        document.root_element().text().collect::<String>()
    })
}

/// Machine-readable data found in a page
struct PageSources {
    jsonld: Vec<Map<String, Value>>,
    microdata: Vec<(String, String)>,
    meta: Vec<(String, String)>,
    title: Option<String>,
    url: String,
}

impl PageSources {
    fn parse(page: &RenderedPage) -> Self {
        let document = Html::parse_document(&page.html);
        Self {
            jsonld: extract_jsonld(&document),
            microdata: extract_microdata(&document),
            meta: extract_meta(&document),
            title: page.title.clone(),
            url: page.url.to_string(),
        }
    }

    fn lookup(&self, name: &str) -> Option<Value> {
        let key = name.to_ascii_lowercase();

        let from_jsonld = self.jsonld.iter().find_map(|object| {
            object
                .iter()
                .find(|(k, _)| k.to_ascii_lowercase() == key)
                .map(|(_, v)| v.clone())
        });
        if from_jsonld.is_some() {
            return from_jsonld;
        }

        let pairs = self.microdata.iter().chain(self.meta.iter());
        for (k, v) in pairs {
            if *k == key {
                return Some(Value::String(v.clone()));
            }
        }

        match key.as_str() {
            "title" => self.title.clone().map(Value::String),
            "url" => Some(Value::String(self.url.clone())),
            _ => None,
        }
    }
}

/// Collects JSON-LD objects, flattening arrays and `@graph` containers
fn extract_jsonld(document: &Html) -> Vec<Map<String, Value>> {
    let selector = match Selector::parse(r#"script[type="application/ld+json"]"#) {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };

    let mut objects = Vec::new();
    for element in document.select(&selector) {
        let text: String = element.text().collect();
        match serde_json::from_str::<Value>(text.trim()) {
            Ok(value) => flatten_jsonld(value, &mut objects),
            Err(e) => tracing::debug!("Ignoring malformed JSON-LD block: {}", e),
        }
    }
    objects
}

fn flatten_jsonld(value: Value, out: &mut Vec<Map<String, Value>>) {
    match value {
        Value::Array(items) => {
            for item in items {
                flatten_jsonld(item, out);
            }
        }
        Value::Object(mut object) => {
            if let Some(graph) = object.remove("@graph") {
                flatten_jsonld(graph, out);
            }
            if !object.is_empty() {
                out.push(object);
            }
        }
        _ => {}
    }
}

/// Collects `itemprop` values: the `content` attribute, a link target, or the text
fn extract_microdata(document: &Html) -> Vec<(String, String)> {
    let selector = match Selector::parse("[itemprop]") {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };

    document
        .select(&selector)
        .filter_map(|element| {
            let attrs = element.value();
            let name = attrs.attr("itemprop")?.trim().to_ascii_lowercase();
            let value = attrs
                .attr("content")
                .or_else(|| attrs.attr("href"))
                .or_else(|| attrs.attr("src"))
                .map(|v| v.trim().to_string())
                .unwrap_or_else(|| {
                    element
                        .text()
                        .collect::<Vec<_>>()
                        .join(" ")
                        .split_whitespace()
                        .collect::<Vec<_>>()
                        .join(" ")
                });
            (!name.is_empty() && !value.is_empty()).then_some((name, value))
        })
        .collect()
}

/// Collects `<meta>` tags by `name` or `property`
///
/// Prefixed keys (`og:title`, `twitter:title`) are recorded under both the
/// full key and the bare one, the full key first.
fn extract_meta(document: &Html) -> Vec<(String, String)> {
    let selector = match Selector::parse("meta[content]") {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };

    let mut pairs = Vec::new();
    for element in document.select(&selector) {
        let attrs = element.value();
        let key = match attrs.attr("name").or_else(|| attrs.attr("property")) {
            Some(k) => k.trim().to_ascii_lowercase(),
            None => continue,
        };
        let content = attrs.attr("content").unwrap_or("").trim().to_string();
        if key.is_empty() || content.is_empty() {
            continue;
        }

        if let Some((_, bare)) = key.split_once(':') {
            pairs.push((bare.to_string(), content.clone()));
        }
        pairs.push((key, content));
    }

    // Full keys win over bare ones
    pairs.sort_by_key(|(k, _)| !k.contains(':'));
    pairs
}

/// Converts a found value to the JSON type the schema declares
///
/// Returns `None` when the value cannot be represented as that type.
fn coerce(value: Value, expected: Option<&str>) -> Option<Value> {
    match expected {
        Some("string") => match value {
            Value::String(s) => Some(Value::String(s)),
            Value::Number(n) => Some(Value::String(n.to_string())),
            Value::Bool(b) => Some(Value::String(b.to_string())),
            // JSON-LD nests names: "author": {"@type": "Person", "name": "..."}
            Value::Object(mut object) => object
                .remove("name")
                .and_then(|name| coerce(name, Some("string"))),
            Value::Array(items) => items
                .into_iter()
                .find_map(|item| coerce(item, Some("string"))),
            Value::Null => None,
        },
        Some("number") => match value {
            Value::Number(n) => Some(Value::Number(n)),
            Value::String(s) => parse_number(&s)
                .and_then(Number::from_f64)
                .map(Value::Number),
            _ => None,
        },
        Some("integer") => match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
                .map(Value::from),
            Value::String(s) => s.trim().parse::<i64>().ok().map(Value::from),
            _ => None,
        },
        Some("boolean") => match value {
            Value::Bool(b) => Some(Value::Bool(b)),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Some(Value::Bool(true)),
                "false" | "no" | "0" => Some(Value::Bool(false)),
                _ => None,
            },
            _ => None,
        },
        Some("array") => match value {
            Value::Array(items) => Some(Value::Array(items)),
            Value::Null => None,
            other => Some(Value::Array(vec![other])),
        },
        Some("object") => match value {
            Value::Object(object) => Some(Value::Object(object)),
            _ => None,
        },
        _ => (!value.is_null()).then_some(value),
    }
}

fn parse_number(text: &str) -> Option<f64> {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | '-'))
        .collect();
    cleaned.parse().ok()
}
