use anyhow::{Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, UPGRADE_INSECURE_REQUESTS,
};
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::ExtractError;

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Raw pages with less visible text than this are treated as hard paywalls
/// when they also carry a paywall phrase.
pub const PAYWALL_TEXT_THRESHOLD: usize = 500;
/// Anything shorter is not worth a model call.
pub const MIN_CONTENT_CHARS: usize = 100;
/// Below this many images the original document is searched for more.
const IMAGE_SUPPLEMENT_THRESHOLD: usize = 3;

const PAYWALL_INDICATORS: &[&str] = &[
    "paywall",
    "subscription required",
    "subscribe to read",
    "premium content",
    "member-only",
    "subscribers only",
];

const UNWANTED_TAGS: &str = "script, style, nav, header, footer, aside, advertisement, ad, \
    sidebar, menu, iframe, noscript, form, button";

const BLOCK_TAGS: &[&str] = &[
    "h1", "h2", "h3", "h4", "h5", "h6", "p", "li", "blockquote", "pre", "code",
];

const RULE: &str = "================================================================================";

static UNWANTED_CLASS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)advertisement|ad-container|social-share|comments|related-posts|newsletter-signup|popup|modal|cookie-banner",
    )
    .expect("valid regex")
});
static CAPTION_CLASS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)caption").expect("valid regex"));
static MAIN_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(main|content|article|post|entry)").expect("valid regex"));
static MAIN_CLASS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(main|content|article|post|entry|body)").expect("valid regex"));
static MANY_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("valid regex"));
static MANY_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r" {2,}").expect("valid regex"));

static SEL_UNWANTED: Lazy<Selector> = Lazy::new(|| selector(UNWANTED_TAGS));
static SEL_CLASSED: Lazy<Selector> = Lazy::new(|| selector("[class]"));
static SEL_BLOCKS: Lazy<Selector> =
    Lazy::new(|| selector("h1, h2, h3, h4, h5, h6, p, li, blockquote, pre, code"));
static SEL_IMG: Lazy<Selector> = Lazy::new(|| selector("img"));
static SEL_FIGCAPTION: Lazy<Selector> = Lazy::new(|| selector("figcaption"));
static SEL_CONTAINERS: Lazy<Selector> = Lazy::new(|| selector("main, article, div, section"));
static SEL_BODY: Lazy<Selector> = Lazy::new(|| selector("body"));
static SEL_TITLE: Lazy<Selector> = Lazy::new(|| selector("title"));
static SEL_INVISIBLE: Lazy<Selector> = Lazy::new(|| selector("script, style, noscript, template"));

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector")
}

/// Anything that can turn a URL into LLM-ready text.
#[async_trait]
pub trait ArticleExtractor: Send + Sync {
    /// `None` means "no usable content"; the reason has already been logged.
    async fn extract(&self, url: &str) -> Option<String>;
}

pub struct ContentExtractor {
    client: Client,
}

impl ContentExtractor {
    pub fn new() -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
        headers.insert(UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));

        let client = Client::builder()
            .timeout(FETCH_TIMEOUT)
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// Fetch `url` and extract its main content, reporting why it failed.
    pub async fn try_extract(&self, url: &str) -> Result<String, ExtractError> {
        let parsed = validate_url(url)?;

        info!(%url, "Scraping URL");
        let response = self
            .client
            .get(parsed.clone())
            .send()
            .await?
            .error_for_status()?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_lowercase();
        if content_type.contains("pdf") {
            return Err(ExtractError::UnsupportedFormat(content_type));
        }

        let html = response.text().await?;
        extract_from_html(&html, &parsed)
    }
}

#[async_trait]
impl ArticleExtractor for ContentExtractor {
    async fn extract(&self, url: &str) -> Option<String> {
        match self.try_extract(url).await {
            Ok(content) => {
                info!(%url, chars = content.chars().count(), "Successfully scraped content");
                Some(content)
            }
            Err(ExtractError::Http(e)) if e.is_timeout() => {
                warn!(%url, "Timeout while scraping");
                None
            }
            Err(e @ (ExtractError::UnsupportedFormat(_) | ExtractError::Paywalled)) => {
                info!(%url, reason = %e, "Skipping article");
                None
            }
            Err(e) => {
                warn!(%url, error = %e, "Failed to extract article");
                None
            }
        }
    }
}

/// Reject URLs we cannot or will not scrape, before any network traffic.
pub fn validate_url(url: &str) -> Result<Url, ExtractError> {
    let parsed = Url::parse(url).map_err(|_| ExtractError::InvalidUrl(url.to_string()))?;
    if parsed.scheme().is_empty() || !parsed.has_host() {
        return Err(ExtractError::InvalidUrl(url.to_string()));
    }
    if parsed.path().to_lowercase().ends_with(".pdf") {
        return Err(ExtractError::UnsupportedFormat("pdf".to_string()));
    }
    Ok(parsed)
}

/// Everything after the fetch: paywall check, readability pass, heuristic fallback.
pub fn extract_from_html(html: &str, url: &Url) -> Result<String, ExtractError> {
    if is_hard_paywall(html) {
        return Err(ExtractError::Paywalled);
    }

    let (title, readable_html) = match readability(html, url) {
        Some((title, content)) => (title, content),
        None => {
            debug!(%url, "Readability pass produced nothing");
            (document_title(html), String::new())
        }
    };

    let content = structured_extract(&readable_html, html, title.as_deref(), url);
    let len = content.chars().count();
    if len >= MIN_CONTENT_CHARS {
        return Ok(content);
    }

    warn!(%url, chars = len, "Extracted content is too short; using simple fallback");
    let fallback = simple_text_extract(html, title.as_deref());
    let len = fallback.chars().count();
    if len < MIN_CONTENT_CHARS {
        return Err(ExtractError::TooShort(len));
    }
    Ok(fallback)
}

/// A paywall phrase alone is not enough; the page must also be nearly empty.
pub fn is_hard_paywall(html: &str) -> bool {
    let lower = html.to_lowercase();
    if !PAYWALL_INDICATORS.iter().any(|p| lower.contains(p)) {
        return false;
    }
    visible_text_len(html) < PAYWALL_TEXT_THRESHOLD
}

fn visible_text_len(html: &str) -> usize {
    let mut doc = Html::parse_document(html);
    remove_matching(&mut doc, &SEL_INVISIBLE);
    let text: String = doc.root_element().text().collect();
    text.trim().chars().count()
}

fn readability(html: &str, url: &Url) -> Option<(Option<String>, String)> {
    let mut reader = dom_smoothie::Readability::new(html, Some(url.as_str()), None).ok()?;
    let article = reader.parse().ok()?;
    let title = Some(article.title.trim().to_string()).filter(|t| !t.is_empty());
    Some((title, article.content.to_string()))
}

fn document_title(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    doc.select(&SEL_TITLE)
        .next()
        .map(|t| normalized_text(&t))
        .filter(|t| !t.is_empty())
}

/// Format the readability fragment block by block, then append image metadata.
fn structured_extract(readable_html: &str, original_html: &str, title: Option<&str>, url: &Url) -> String {
    let mut fragment = Html::parse_fragment(readable_html);
    strip_boilerplate(&mut fragment);

    let mut parts: Vec<String> = Vec::new();
    if let Some(title) = title {
        parts.push(title_block(title));
    }
    parts.extend(format_blocks(&fragment));

    let mut images = collect_images(&fragment, url);
    if images.len() < IMAGE_SUPPLEMENT_THRESHOLD {
        let original = Html::parse_document(original_html);
        supplement_images(&mut images, &original);
    }
    if !images.is_empty() {
        parts.push(image_section(&images));
    }

    collapse_whitespace(parts.concat().trim())
}

fn title_block(title: &str) -> String {
    format!("Title: {}\n{}\n", title, RULE)
}

/// Drop unwanted tags and anything whose class looks like ads, sharing, popups, etc.
fn strip_boilerplate(doc: &mut Html) {
    remove_matching(doc, &SEL_UNWANTED);
    remove_where(doc, &SEL_CLASSED, |el| {
        el.value().classes().any(|c| UNWANTED_CLASS.is_match(c))
    });
}

fn remove_matching(doc: &mut Html, sel: &Selector) {
    remove_where(doc, sel, |_| true);
}

fn remove_where(doc: &mut Html, sel: &Selector, pred: impl Fn(&ElementRef) -> bool) {
    let ids: Vec<_> = doc
        .root_element()
        .select(sel)
        .filter(|el| pred(el))
        .map(|el| el.id())
        .collect();
    for id in ids {
        if let Some(mut node) = doc.tree.get_mut(id) {
            node.detach();
        }
    }
}

/// One text block per heading/paragraph/list item/quote/code element, in document order.
///
/// Elements nested inside another block element are covered by their ancestor's text.
pub fn format_blocks(doc: &Html) -> Vec<String> {
    let mut blocks = Vec::new();

    for el in doc.root_element().select(&SEL_BLOCKS) {
        let nested = el
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|a| BLOCK_TAGS.contains(&a.value().name()));
        if nested {
            continue;
        }

        let text = normalized_text(&el);
        if text.is_empty() {
            continue;
        }

        let name = el.value().name();
        let block = match name {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = name[1..].parse::<usize>().unwrap_or(1);
                format!("\n{} {}\n", "#".repeat(level), text)
            }
            "blockquote" => format!("\n> {}\n", text),
            "li" => format!("• {}\n", text),
            _ => format!("{}\n", text),
        };
        blocks.push(block);
    }

    blocks
}

fn normalized_text(el: &ElementRef) -> String {
    let raw: String = el.text().collect();
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageInfo {
    pub alt: Option<String>,
    pub title: Option<String>,
    pub src: Option<String>,
    pub caption: Option<String>,
}

impl ImageInfo {
    fn is_empty(&self) -> bool {
        self.alt.is_none() && self.title.is_none() && self.src.is_none() && self.caption.is_none()
    }
}

fn attr_text(el: &ElementRef, name: &str) -> Option<String> {
    el.value()
        .attr(name)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn collect_images(doc: &Html, base: &Url) -> Vec<ImageInfo> {
    doc.root_element()
        .select(&SEL_IMG)
        .map(|img| ImageInfo {
            alt: attr_text(&img, "alt"),
            title: attr_text(&img, "title"),
            src: attr_text(&img, "src")
                .and_then(|src| base.join(&src).ok())
                .map(|u| u.to_string()),
            caption: nearby_caption(&img),
        })
        .filter(|info| !info.is_empty())
        .collect()
}

/// A `<figcaption>` or caption-classed element under the image's parent.
fn nearby_caption(img: &ElementRef) -> Option<String> {
    let parent = img.parent().and_then(ElementRef::wrap)?;

    if let Some(caption) = parent
        .select(&SEL_FIGCAPTION)
        .map(|c| normalized_text(&c))
        .find(|c| !c.is_empty())
    {
        return Some(caption);
    }

    parent
        .select(&SEL_CLASSED)
        .filter(|el| el.value().classes().any(|c| CAPTION_CLASS.is_match(c)))
        .map(|el| normalized_text(&el))
        .find(|c| !c.is_empty())
}

/// Add alt-texted images from the untouched page, keyed by alt text.
fn supplement_images(images: &mut Vec<ImageInfo>, original: &Html) {
    for img in original.select(&SEL_IMG) {
        let Some(alt) = attr_text(&img, "alt") else {
            continue;
        };
        if images.iter().any(|i| i.alt.as_deref() == Some(alt.as_str())) {
            continue;
        }
        images.push(ImageInfo {
            alt: Some(alt),
            title: attr_text(&img, "title"),
            ..Default::default()
        });
    }
}

fn image_section(images: &[ImageInfo]) -> String {
    let mut out = format!("\n{}\nImages and Visual Content:\n{}\n", RULE, RULE);
    for (idx, img) in images.iter().enumerate() {
        out.push_str(&format!("\nImage {}:\n", idx + 1));
        if let Some(alt) = &img.alt {
            out.push_str(&format!("  Alt text: {}\n", alt));
        }
        if let Some(title) = &img.title {
            out.push_str(&format!("  Title: {}\n", title));
        }
        if let Some(caption) = &img.caption {
            out.push_str(&format!("  Caption: {}\n", caption));
        }
        if let Some(src) = &img.src {
            out.push_str(&format!("  Source: {}\n", src));
        }
    }
    out
}

/// Structural fallback for pages readability cannot handle.
pub fn simple_text_extract(html: &str, title: Option<&str>) -> String {
    let mut doc = Html::parse_document(html);
    remove_matching(&mut doc, &SEL_UNWANTED);

    let mut parts: Vec<String> = Vec::new();
    if let Some(title) = title {
        parts.push(title_block(title));
    }

    let container = main_container(&doc)
        .or_else(|| doc.root_element().select(&SEL_BODY).next())
        .unwrap_or_else(|| doc.root_element());
    parts.push(line_text(&container));

    collapse_whitespace(&parts.join("\n")).trim().to_string()
}

/// Best-guess content container: by id, then by class, then by `role="main"`.
fn main_container(doc: &Html) -> Option<ElementRef<'_>> {
    // Walk from the root so nodes detached by stripping are never candidates.
    let root = doc.root_element();

    let by_id = root.select(&SEL_CONTAINERS).find(|el| {
        el.value()
            .attr("id")
            .map(|id| MAIN_ID.is_match(id))
            .unwrap_or(false)
    });
    if by_id.is_some() {
        return by_id;
    }

    let by_class = root
        .select(&SEL_CONTAINERS)
        .find(|el| el.value().classes().any(|c| MAIN_CLASS.is_match(c)));
    if by_class.is_some() {
        return by_class;
    }

    root.select(&SEL_CONTAINERS)
        .find(|el| el.value().attr("role") == Some("main"))
}

/// Every non-blank text node, trimmed, one per line.
fn line_text(el: &ElementRef) -> String {
    el.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Squeeze 3+ newlines to a blank line and runs of spaces to one.
pub fn collapse_whitespace(text: &str) -> String {
    let text = MANY_NEWLINES.replace_all(text, "\n\n");
    MANY_SPACES.replace_all(&text, " ").into_owned()
}
