use std::time::Duration;

use log::debug;
use url::Url;

use crate::loader::TextExtractor;
use crate::web::check_status;
use crate::{Document, ExtractError, Segment, SourceKind};

pub const TIMEOUT: Duration = Duration::from_secs(20);

/// Extract text from a directly linked PDF, kept in memory
pub async fn extract(client: &reqwest::Client, url: &Url, pdf: &dyn TextExtractor) -> Result<Document, ExtractError> {
    debug!("Downloading PDF: {url}");

    let resp = client.get(url.clone()).timeout(TIMEOUT).send().await?;
    check_status(resp.status(), url)?;
    let bytes = resp.bytes().await?;

    debug!("Downloaded {} bytes", bytes.len());
    pdf_to_document(url, &bytes, pdf)
}

fn pdf_to_document(url: &Url, bytes: &[u8], pdf: &dyn TextExtractor) -> Result<Document, ExtractError> {
    let text = pdf.extract_bytes(bytes)?;
    Document::new(SourceKind::Pdf, url.as_str(), vec![Segment::text(text)])
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedPdf(&'static str);

    impl TextExtractor for FixedPdf {
        fn extract_bytes(&self, _bytes: &[u8]) -> eyre::Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct BrokenPdf;

    impl TextExtractor for BrokenPdf {
        fn extract_bytes(&self, _bytes: &[u8]) -> eyre::Result<String> {
            eyre::bail!("xref table missing")
        }
    }

    fn url() -> Url {
        Url::parse("https://example.com/paper.pdf").unwrap()
    }

    #[test]
    fn test_pdf_text() {
        let doc = pdf_to_document(&url(), b"%PDF-1.7", &FixedPdf("Abstract\nWe study...")).unwrap();
        assert_eq!(doc.source, SourceKind::Pdf);
        assert_eq!(doc.text(), "Abstract\nWe study...");
    }

    #[test]
    fn test_scanned_pdf_is_no_content() {
        let result = pdf_to_document(&url(), b"%PDF-1.7", &FixedPdf("\n\n  \n"));
        assert!(matches!(result, Err(ExtractError::NoContent(_))));
    }

    #[test]
    fn test_parse_failure_is_external() {
        let result = pdf_to_document(&url(), b"garbage", &BrokenPdf);
        match result {
            Err(ExtractError::ExternalFailure(e)) => assert!(e.to_string().contains("xref")),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
