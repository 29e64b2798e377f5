//! HTML content extraction.
//!
//! The conversion pipeline talks to extraction through the [`Extractor`]
//! trait. Two implementations ship with the crate:
//!
//! - **[`BuiltinExtractor`]** picks the main content region with CSS
//!   selectors (`scraper`), drops boilerplate, and renders markdown via
//!   `htmd` or plain text via a DOM walk.
//! - **[`HttpExtractor`]** posts the HTML to an external extraction service
//!   and reads back `{ "text": ... }`.
//!
//! An extractor returns `Ok(None)` when it ran but found nothing worth
//! keeping; the caller turns that into an "extraction empty" failure.

use async_trait::async_trait;
use scraper::{Html, Node, Selector};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use crate::config::ExtractorConfig;
use crate::models::{ExtractOptions, OutputFormat};

#[derive(Debug, Error)]
pub enum ExtractError {
    /// The extractor ran and rejected the input.
    #[error("extraction failed: {0}")]
    Failed(String),
    /// The extraction service could not be reached or timed out.
    #[error("extraction service unavailable: {0}")]
    Unavailable(String),
}

/// Converts raw HTML into readable text or markdown.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Short identifier used in logs (e.g. `"builtin"`).
    fn name(&self) -> &str;

    /// Extract the main content of `html`. Metadata is never requested.
    async fn extract(
        &self,
        html: &str,
        options: &ExtractOptions,
    ) -> Result<Option<String>, ExtractError>;
}

/// Build the extractor selected by `[extractor].provider`.
pub fn create_extractor(config: &ExtractorConfig) -> anyhow::Result<Box<dyn Extractor>> {
    match config.provider.as_str() {
        "builtin" => Ok(Box::new(BuiltinExtractor)),
        "http" => {
            let url = config
                .url
                .clone()
                .ok_or_else(|| anyhow::anyhow!("extractor.url required for http provider"))?;
            Ok(Box::new(HttpExtractor::new(url, config.timeout_secs)?))
        }
        other => anyhow::bail!("Unknown extractor provider: {}", other),
    }
}

// ============ Builtin extractor ============

/// Candidate containers for the main content, tried in order.
const MAIN_SELECTORS: &[&str] = &[
    "main",
    "article",
    "[role='main']",
    "#content",
    "#main",
    ".content",
    ".main",
    ".post-content",
    ".entry-content",
];

/// Elements that never carry article text.
const BOILERPLATE_SELECTORS: &[&str] = &[
    "script",
    "style",
    "noscript",
    "iframe",
    "template",
    "svg",
    "form",
    "nav",
    "aside",
    "footer",
    "body > header",
    ".nav",
    ".navbar",
    ".sidebar",
    ".menu",
    ".advertisement",
    ".ads",
    "#nav",
    "#sidebar",
    "#footer",
];

const COMMENT_SELECTORS: &[&str] = &[
    "#comments",
    ".comments",
    ".comment",
    ".comment-list",
    "#disqus_thread",
];

const TABLE_SELECTORS: &[&str] = &["table"];

/// Tags that start a new paragraph in plain-text output.
const PARAGRAPH_TAGS: &[&str] = &[
    "p",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "blockquote",
    "pre",
    "ul",
    "ol",
    "table",
    "figure",
    "hr",
    "section",
    "article",
    "div",
];

/// Tags that start a new line in plain-text output.
const LINE_TAGS: &[&str] = &["li", "tr", "br", "dt", "dd", "figcaption"];

/// Local extraction with `scraper` + `htmd`.
pub struct BuiltinExtractor;

impl BuiltinExtractor {
    fn extract_sync(html: &str, options: &ExtractOptions) -> Result<Option<String>, ExtractError> {
        let document = Html::parse_document(html);
        let main = Self::main_content(&document);
        let cleaned = Self::remove_unwanted(&main, options);

        let text = render_text(&cleaned);
        if text.trim().is_empty() {
            return Ok(None);
        }

        let out = match options.output_format {
            OutputFormat::Txt => text,
            OutputFormat::Markdown => {
                htmd::convert(&cleaned).map_err(|e| ExtractError::Failed(e.to_string()))?
            }
            OutputFormat::Html => cleaned,
        };

        if out.trim().is_empty() {
            Ok(None)
        } else {
            Ok(Some(out))
        }
    }

    /// HTML of the first main-content container, or the whole body.
    fn main_content(document: &Html) -> String {
        for selector_str in MAIN_SELECTORS {
            if let Ok(selector) = Selector::parse(selector_str) {
                if let Some(main) = document.select(&selector).next() {
                    return main.html();
                }
            }
        }

        if let Ok(body_selector) = Selector::parse("body") {
            if let Some(body) = document.select(&body_selector).next() {
                return body.html();
            }
        }

        document.html()
    }

    /// Remove boilerplate, plus tables and comment sections unless requested.
    fn remove_unwanted(html: &str, options: &ExtractOptions) -> String {
        let mut selectors: Vec<&str> = BOILERPLATE_SELECTORS.to_vec();
        if !options.include_tables {
            selectors.extend_from_slice(TABLE_SELECTORS);
        }
        if !options.include_comments {
            selectors.extend_from_slice(COMMENT_SELECTORS);
        }

        let document = Html::parse_document(html);
        let mut result = html.to_string();
        for selector_str in selectors {
            if let Ok(selector) = Selector::parse(selector_str) {
                for element in document.select(&selector) {
                    result = result.replace(&element.html(), "");
                }
            }
        }
        result
    }
}

#[async_trait]
impl Extractor for BuiltinExtractor {
    fn name(&self) -> &str {
        "builtin"
    }

    async fn extract(
        &self,
        html: &str,
        options: &ExtractOptions,
    ) -> Result<Option<String>, ExtractError> {
        Self::extract_sync(html, options)
    }
}

/// Flatten HTML to plain text, breaking lines at block boundaries.
fn render_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut out = String::new();

    for node in document.root_element().descendants() {
        match node.value() {
            Node::Text(text) => push_inline(&mut out, text),
            Node::Element(el) => {
                let name = el.name();
                if PARAGRAPH_TAGS.contains(&name) {
                    ensure_newlines(&mut out, 2);
                } else if LINE_TAGS.contains(&name) {
                    ensure_newlines(&mut out, 1);
                } else if name == "td" || name == "th" {
                    push_inline(&mut out, " ");
                }
            }
            _ => {}
        }
    }

    out
}

/// Append `text` with internal whitespace runs collapsed to one space.
fn push_inline(out: &mut String, text: &str) {
    let leading_space = text.starts_with(char::is_whitespace);
    let trailing_space = text.ends_with(char::is_whitespace);
    let words: Vec<&str> = text.split_whitespace().collect();

    let at_line_start = out.is_empty() || out.ends_with('\n');
    if (leading_space || words.is_empty()) && !at_line_start && !out.ends_with(' ') {
        out.push(' ');
    }
    if words.is_empty() {
        return;
    }
    out.push_str(&words.join(" "));
    if trailing_space {
        out.push(' ');
    }
}

/// Make `out` end with at least `n` newlines (no-op at the very start).
fn ensure_newlines(out: &mut String, n: usize) {
    if out.is_empty() {
        return;
    }
    let trimmed_len = out.trim_end_matches(' ').len();
    out.truncate(trimmed_len);
    let existing = out.chars().rev().take_while(|c| *c == '\n').count();
    for _ in existing..n {
        out.push('\n');
    }
}

// ============ HTTP extractor ============

/// Extraction delegated to a remote service.
///
/// Sends `POST {url}` with `{html, output_format, include_tables,
/// include_comments, with_metadata: false}` and expects `{"text": string | null}`.
pub struct HttpExtractor {
    url: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct ExtractResponse {
    #[serde(default)]
    text: Option<String>,
}

impl HttpExtractor {
    pub fn new(url: String, timeout_secs: u64) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self { url, client })
    }
}

#[async_trait]
impl Extractor for HttpExtractor {
    fn name(&self) -> &str {
        "http"
    }

    async fn extract(
        &self,
        html: &str,
        options: &ExtractOptions,
    ) -> Result<Option<String>, ExtractError> {
        let body = serde_json::json!({
            "html": html,
            "output_format": options.output_format.as_str(),
            "include_tables": options.include_tables,
            "include_comments": options.include_comments,
            "with_metadata": false,
        });

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                ExtractError::Unavailable(format!(
                    "extraction service at {} unreachable: {}",
                    self.url, e
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            let msg = format!("extraction service error {}: {}", status, body_text);
            return Err(if status.is_server_error() {
                ExtractError::Unavailable(msg)
            } else {
                ExtractError::Failed(msg)
            });
        }

        let parsed: ExtractResponse = response
            .json()
            .await
            .map_err(|e| ExtractError::Failed(format!("invalid extraction response: {}", e)))?;

        Ok(parsed.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(format: OutputFormat) -> ExtractOptions {
        ExtractOptions {
            output_format: format,
            ..ExtractOptions::default()
        }
    }

    #[test]
    fn markdown_from_simple_paragraph() {
        let out = BuiltinExtractor::extract_sync("<p>Hello</p>", &opts(OutputFormat::Markdown))
            .unwrap()
            .unwrap();
        assert!(out.contains("Hello"));
    }

    #[test]
    fn empty_body_yields_none() {
        let out = BuiltinExtractor::extract_sync(
            "<html><head><title>t</title></head><body></body></html>",
            &opts(OutputFormat::Markdown),
        )
        .unwrap();
        assert!(out.is_none());
    }

    #[test]
    fn scripts_only_yields_none() {
        let out = BuiltinExtractor::extract_sync(
            "<html><body><script>var x = 1;</script><style>p{}</style></body></html>",
            &opts(OutputFormat::Txt),
        )
        .unwrap();
        assert!(out.is_none());
    }

    #[test]
    fn prefers_article_over_chrome() {
        let html = r#"<html><body>
            <nav><a href="/">Home</a> <a href="/world">World</a></nav>
            <article><h1>Headline</h1><p>First paragraph.</p><p>Second paragraph.</p></article>
            <footer>Copyright</footer>
        </body></html>"#;
        let out = BuiltinExtractor::extract_sync(html, &opts(OutputFormat::Txt))
            .unwrap()
            .unwrap();
        assert!(out.contains("Headline"));
        assert!(out.contains("First paragraph."));
        assert!(out.contains("Second paragraph."));
        assert!(!out.contains("Home"));
        assert!(!out.contains("Copyright"));
    }

    #[test]
    fn text_breaks_between_paragraphs() {
        let out = BuiltinExtractor::extract_sync(
            "<p>One</p><p>Two</p><ul><li>a</li><li>b</li></ul>",
            &opts(OutputFormat::Txt),
        )
        .unwrap()
        .unwrap();
        let lines: Vec<&str> = out.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
        assert_eq!(lines, vec!["One", "Two", "a", "b"]);
    }

    #[test]
    fn tables_respect_flag() {
        let html = "<article><p>Intro</p><table><tr><td>cell-value</td></tr></table></article>";
        let with = BuiltinExtractor::extract_sync(html, &opts(OutputFormat::Txt))
            .unwrap()
            .unwrap();
        assert!(with.contains("cell-value"));

        let without_opts = ExtractOptions {
            output_format: OutputFormat::Txt,
            include_tables: false,
            include_comments: false,
        };
        let without = BuiltinExtractor::extract_sync(html, &without_opts)
            .unwrap()
            .unwrap();
        assert!(!without.contains("cell-value"));
        assert!(without.contains("Intro"));
    }

    #[test]
    fn comments_respect_flag() {
        let html = r#"<article><p>Story</p><div class="comments"><p>first!</p></div></article>"#;
        let default = BuiltinExtractor::extract_sync(html, &opts(OutputFormat::Txt))
            .unwrap()
            .unwrap();
        assert!(!default.contains("first!"));

        let with_comments = ExtractOptions {
            output_format: OutputFormat::Txt,
            include_tables: true,
            include_comments: true,
        };
        let out = BuiltinExtractor::extract_sync(html, &with_comments)
            .unwrap()
            .unwrap();
        assert!(out.contains("first!"));
    }

    #[test]
    fn inline_whitespace_collapsed() {
        let text = render_text("<p>  spread \n   out   <b>bold</b> end </p>");
        assert_eq!(text.trim(), "spread out bold end");
    }

    #[tokio::test]
    async fn unreachable_http_extractor_is_unavailable() {
        let extractor = HttpExtractor::new("http://127.0.0.1:9/extract".to_string(), 2).unwrap();
        let err = extractor
            .extract("<p>x</p>", &ExtractOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::Unavailable(_)));
    }
}
