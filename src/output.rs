use eyre::Result;
use serde::Serialize;

use crate::Document;

/// What one processed URL produced
#[derive(Debug, Serialize)]
pub struct Report<'a> {
    pub document: &'a Document,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<&'a str>,
}

/// Render extracted text (one segment per line)
pub fn render_text(document: &Document) -> String {
    document
        .segments
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render the document and summary as pretty JSON
pub fn render_json(report: &Report<'_>) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}
