use std::path::Path;

use eyre::{Result, WrapErr, bail};
use log::debug;

use crate::web;

/// Turns downloaded bytes or a local file into plain text
pub trait TextExtractor: Send + Sync {
    fn extract_bytes(&self, bytes: &[u8]) -> Result<String>;

    fn extract_path(&self, path: &Path) -> Result<String> {
        let bytes = std::fs::read(path).wrap_err_with(|| format!("reading {}", path.display()))?;
        self.extract_bytes(&bytes)
    }
}

/// PDF text via `pdf-extract`
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfLoader;

impl TextExtractor for PdfLoader {
    fn extract_bytes(&self, bytes: &[u8]) -> Result<String> {
        debug!("Extracting PDF text from {} bytes", bytes.len());
        pdf_extract::extract_text_from_mem(bytes).wrap_err("failed to extract text from PDF")
    }

    fn extract_path(&self, path: &Path) -> Result<String> {
        debug!("Extracting PDF text from {}", path.display());
        pdf_extract::extract_text(path).wrap_err_with(|| format!("failed to extract text from {}", path.display()))
    }
}

/// Best-effort text from an arbitrary downloaded document
#[derive(Debug, Default, Clone, Copy)]
pub struct DocumentLoader;

impl TextExtractor for DocumentLoader {
    fn extract_bytes(&self, bytes: &[u8]) -> Result<String> {
        if is_pdf(bytes) {
            debug!("Document has PDF magic bytes");
            return PdfLoader.extract_bytes(bytes);
        }

        let Ok(text) = std::str::from_utf8(bytes) else {
            bail!("unsupported binary document ({} bytes)", bytes.len());
        };

        if web::looks_like_html(text) {
            let page = web::html_to_text(text);
            return Ok(page.body);
        }

        Ok(text.to_string())
    }
}

pub fn is_pdf(head: &[u8]) -> bool {
    head.starts_with(b"%PDF-")
}
