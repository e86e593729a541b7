use std::borrow::Cow;
use std::time::Duration;

use log::{debug, warn};
use reqwest::StatusCode;
use scraper::{Html, Selector};
use url::Url;

use crate::loader::{self, TextExtractor};
use crate::{Document, ExtractError, Segment, SourceKind, USER_AGENT};

pub const TIMEOUT: Duration = Duration::from_secs(20);

/// Elements whose text never reaches the reader
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Elements that start a new line of text
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "body", "dd", "div", "dl", "dt", "figcaption", "figure", "footer",
    "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "nav", "ol", "p", "pre", "section",
    "table", "td", "th", "tr", "ul",
];

/// Visible text of an HTML page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub title: Option<String>,
    pub body: String,
}

/// HTTP client for arbitrary sites
pub fn client(accept_invalid_certs: bool) -> Result<reqwest::Client, ExtractError> {
    if accept_invalid_certs {
        warn!("TLS certificate verification is disabled for generic web pages");
    }
    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .danger_accept_invalid_certs(accept_invalid_certs)
        .build()?;
    Ok(client)
}

/// Fetch a generic web page and keep its readable text
pub async fn extract(client: &reqwest::Client, url: &Url, pdf: &dyn TextExtractor) -> Result<Document, ExtractError> {
    debug!("Fetching web page: {url}");

    let resp = client.get(url.clone()).timeout(TIMEOUT).send().await?;
    check_status(resp.status(), url)?;
    let content_type = content_type(&resp);
    let bytes = resp.bytes().await?;

    debug!("Fetched {} bytes ({content_type})", bytes.len());
    page_to_document(url, &content_type, &bytes, pdf)
}

pub(crate) fn page_to_document(
    url: &Url,
    content_type: &str,
    bytes: &[u8],
    pdf: &dyn TextExtractor,
) -> Result<Document, ExtractError> {
    if content_type.starts_with("application/pdf") || loader::is_pdf(bytes) {
        let text = pdf.extract_bytes(bytes)?;
        return Document::new(SourceKind::GenericWeb, url.as_str(), vec![Segment::text(text)]);
    }

    let body = match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) if is_textual(content_type) => String::from_utf8_lossy(bytes),
        Err(_) => {
            return Err(ExtractError::external(format!(
                "{url} returned unsupported binary content ({}, {} bytes)",
                if content_type.is_empty() { "no content type" } else { content_type },
                bytes.len()
            )));
        }
    };
    if content_type.starts_with("text/plain") {
        return Document::new(SourceKind::GenericWeb, url.as_str(), vec![Segment::text(body)]);
    }

    let page = html_to_text(&body);
    Ok(Document::new(SourceKind::GenericWeb, url.as_str(), vec![Segment::text(page.body)])?.with_title(page.title))
}

/// Declared types whose bodies are text even when not valid UTF-8
fn is_textual(content_type: &str) -> bool {
    content_type.starts_with("text/") || content_type.contains("html") || content_type.contains("xml")
}

/// Map a non-success status onto the error taxonomy
pub(crate) fn check_status(status: StatusCode, url: &Url) -> Result<(), ExtractError> {
    if status.is_success() {
        return Ok(());
    }
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Err(ExtractError::PermissionDenied(format!("{url} returned {status}")))
        }
        _ => Err(ExtractError::external(format!("{url} returned {status}"))),
    }
}

/// Lowercased media type from the response headers, parameters stripped
pub(crate) fn content_type(resp: &reqwest::Response) -> String {
    resp.headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|v| v.trim().to_ascii_lowercase())
        .unwrap_or_default()
}

/// True when the text opens like an HTML document
pub fn looks_like_html(text: &str) -> bool {
    let head: String = text
        .trim_start_matches('\u{feff}')
        .trim_start()
        .chars()
        .take(32)
        .collect::<String>()
        .to_ascii_lowercase();
    head.starts_with("<!doctype html") || head.starts_with("<html")
}

/// Strip scripts and styles and join the visible body text.
///
/// Inline text runs together; each block element and `<br>` starts a new line.
pub fn html_to_text(html: &str) -> Page {
    let doc = Html::parse_document(html);

    let title = Selector::parse("title")
        .ok()
        .and_then(|sel| doc.select(&sel).next().map(|n| n.text().collect::<String>()))
        .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|t| !t.is_empty());

    let Ok(body_sel) = Selector::parse("body") else {
        return Page {
            title,
            body: String::new(),
        };
    };

    // Text grouped by the block element that contains it
    let mut blocks = Vec::new();
    for node in doc.select(&body_sel).flat_map(|body| body.descendants()) {
        if node.value().as_element().is_some_and(|e| e.name() == "br") {
            blocks.push((Some(node.id()), String::new()));
            continue;
        }
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let text: &str = text;
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| HIDDEN_ELEMENTS.contains(&e.name()))
        });
        if hidden {
            continue;
        }
        let block = node
            .ancestors()
            .find(|a| {
                a.value()
                    .as_element()
                    .is_some_and(|e| BLOCK_ELEMENTS.contains(&e.name()))
            })
            .map(|a| a.id());
        match blocks.last_mut() {
            Some((id, buf)) if *id == block => buf.push_str(text),
            _ => blocks.push((block, text.to_string())),
        }
    }

    let body = blocks
        .iter()
        .map(|(_, text)| text.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    Page { title, body }
}
