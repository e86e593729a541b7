pub mod classify;
pub mod config;
pub mod error;
pub mod google;
pub mod loader;
pub mod output;
pub mod pdf;
pub mod resolver;
pub mod subtitles;
pub mod summarize;
pub mod web;
pub mod youtube;

use serde::Serialize;

pub use classify::{SourceKind, classify};
pub use error::ExtractError;
pub use resolver::Resolver;

/// Browser-like identification sent to every remote source
pub const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// A single piece of extracted text
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

impl Segment {
    /// Untimed segment
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            start: None,
            duration: None,
        }
    }

    /// Caption fragment with timing
    pub fn timed(text: impl Into<String>, start: f64, duration: f64) -> Self {
        Self {
            text: text.into(),
            start: Some(start),
            duration: Some(duration),
        }
    }
}

/// Normalized text extracted from a source URL
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub source: SourceKind,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub segments: Vec<Segment>,
}

impl Document {
    /// Build a document, dropping blank segments. Fails with `NoContent` when nothing is left.
    pub fn new(source: SourceKind, url: &str, segments: Vec<Segment>) -> Result<Self, ExtractError> {
        let segments: Vec<Segment> = segments
            .into_iter()
            .filter_map(|mut s| {
                let trimmed = s.text.trim();
                if trimmed.is_empty() {
                    return None;
                }
                if trimmed.len() != s.text.len() {
                    s.text = trimmed.to_string();
                }
                Some(s)
            })
            .collect();

        if segments.is_empty() {
            return Err(ExtractError::NoContent(format!("no readable text found at {url}")));
        }

        Ok(Self {
            source,
            url: url.to_string(),
            title: None,
            segments,
        })
    }

    pub fn with_title(mut self, title: Option<String>) -> Self {
        self.title = title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty());
        self
    }

    /// All segment text joined by single spaces
    pub fn text(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Validate caller input as an absolute http(s) URL
pub fn validate_url(input: &str) -> Result<url::Url, ExtractError> {
    let input = input.trim();
    let url = url::Url::parse(input).map_err(|e| ExtractError::InvalidInput(format!("not a valid URL: {input} ({e})")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ExtractError::InvalidInput(format!(
            "unsupported URL scheme '{}': {input}",
            url.scheme()
        )));
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(ExtractError::InvalidInput(format!("URL has no host: {input}")));
    }

    Ok(url)
}
