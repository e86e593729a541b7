use std::io::Write;
use std::time::Duration;

use log::debug;
use reqwest::StatusCode;
use url::Url;

use crate::loader::TextExtractor;
use crate::web::{content_type, looks_like_html};
use crate::{Document, ExtractError, Segment, SourceKind};

pub const DOC_TIMEOUT: Duration = Duration::from_secs(15);
pub const DRIVE_TIMEOUT: Duration = Duration::from_secs(20);

/// Id from a `/d/<id>/...` Google Docs or Drive path
pub fn file_id(url: &Url) -> Result<String, ExtractError> {
    let mut segments = url.path_segments().into_iter().flatten();
    segments
        .by_ref()
        .find(|s| *s == "d")
        .and_then(|_| segments.next())
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ExtractError::InvalidInput(format!("no document id after /d/ in {url}")))
}

/// Fetch a Google Doc through its plain-text export
pub async fn extract_doc(client: &reqwest::Client, url: &Url) -> Result<Document, ExtractError> {
    let id = file_id(url)?;
    let export_url = format!("https://docs.google.com/document/d/{id}/export?format=txt");
    debug!("Exporting Google Doc: {export_url}");

    let resp = client.get(&export_url).timeout(DOC_TIMEOUT).send().await?;
    check_status(resp.status(), "Google Doc export")?;
    let body = resp.text().await?;

    export_to_document(url, &body)
}

/// Google answers unshared files with an error status, so any failure counts as denied
fn check_status(status: StatusCode, what: &str) -> Result<(), ExtractError> {
    if status.is_success() {
        return Ok(());
    }
    Err(ExtractError::PermissionDenied(format!(
        "{what} returned {status}; is it shared publicly?"
    )))
}

fn export_to_document(url: &Url, body: &str) -> Result<Document, ExtractError> {
    let body = body.trim_start_matches('\u{feff}');
    // A sharing or login wall comes back as an HTML page with a success status
    if looks_like_html(body) {
        return Err(ExtractError::PermissionDenied(
            "Google Doc export returned an HTML page instead of text; is the document shared publicly?".to_string(),
        ));
    }
    Document::new(SourceKind::GoogleDoc, url.as_str(), vec![Segment::text(body)])
}

/// Download a Google Drive file and extract its text
pub async fn extract_drive_file(
    client: &reqwest::Client,
    url: &Url,
    pdf: &dyn TextExtractor,
    documents: &dyn TextExtractor,
) -> Result<Document, ExtractError> {
    let id = file_id(url)?;
    let download_url = format!("https://drive.google.com/uc?export=download&id={id}");
    debug!("Downloading Drive file: {download_url}");

    let resp = client.get(&download_url).timeout(DRIVE_TIMEOUT).send().await?;
    check_status(resp.status(), "Drive download")?;
    let content_type = content_type(&resp);
    let bytes = resp.bytes().await?;

    debug!("Downloaded {} bytes ({content_type})", bytes.len());
    download_to_document(url, &content_type, &bytes, pdf, documents)
}

pub(crate) fn download_to_document(
    url: &Url,
    content_type: &str,
    bytes: &[u8],
    pdf: &dyn TextExtractor,
    documents: &dyn TextExtractor,
) -> Result<Document, ExtractError> {
    let (suffix, extractor) = if content_type == "application/pdf" {
        (".pdf", pdf)
    } else {
        // Sign-in redirects and the virus-scan interstitial arrive as 200 HTML
        if content_type == "text/html" || looks_like_html(&String::from_utf8_lossy(&bytes[..bytes.len().min(64)])) {
            return Err(ExtractError::PermissionDenied(
                "Drive download returned an HTML page instead of the file; is it shared publicly?".to_string(),
            ));
        }
        (suffix_for(content_type), documents)
    };

    // Removed when `file` drops, whichever way this function exits
    let mut file = tempfile::Builder::new().prefix("urlsum-").suffix(suffix).tempfile()?;
    file.write_all(bytes)?;
    file.flush()?;
    debug!("Saved download to {}", file.path().display());

    let text = extractor.extract_path(file.path())?;
    Document::new(SourceKind::GoogleDriveFile, url.as_str(), vec![Segment::text(text)])
}

fn suffix_for(content_type: &str) -> &'static str {
    match content_type {
        "text/plain" => ".txt",
        "text/csv" => ".csv",
        "text/markdown" => ".md",
        "application/json" => ".json",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    use crate::loader::DocumentLoader;

    /// Records the path it was handed and answers with a fixed result
    struct Recording {
        seen: Mutex<Option<PathBuf>>,
        reply: Result<&'static str, &'static str>,
        delete_first: bool,
    }

    impl Recording {
        fn ok(text: &'static str) -> Self {
            Self {
                seen: Mutex::new(None),
                reply: Ok(text),
                delete_first: false,
            }
        }

        fn failing(msg: &'static str) -> Self {
            Self {
                seen: Mutex::new(None),
                reply: Err(msg),
                delete_first: false,
            }
        }

        fn seen(&self) -> PathBuf {
            self.seen.lock().unwrap().clone().expect("extractor was not called")
        }
    }

    impl TextExtractor for Recording {
        fn extract_bytes(&self, _bytes: &[u8]) -> eyre::Result<String> {
            panic!("drive downloads must go through a file");
        }

        fn extract_path(&self, path: &Path) -> eyre::Result<String> {
            assert!(path.exists(), "temp file should exist during extraction");
            *self.seen.lock().unwrap() = Some(path.to_path_buf());
            if self.delete_first {
                std::fs::remove_file(path)?;
            }
            match self.reply {
                Ok(text) => Ok(text.to_string()),
                Err(msg) => Err(eyre::eyre!(msg)),
            }
        }
    }

    fn doc_url() -> Url {
        Url::parse("https://docs.google.com/document/d/1AbC-dEf_123/edit?usp=sharing").unwrap()
    }

    fn drive_url() -> Url {
        Url::parse("https://drive.google.com/file/d/1XyZ987/view?usp=sharing").unwrap()
    }

    #[test]
    fn test_file_id_doc() {
        assert_eq!(file_id(&doc_url()).unwrap(), "1AbC-dEf_123");
    }

    #[test]
    fn test_file_id_drive() {
        assert_eq!(file_id(&drive_url()).unwrap(), "1XyZ987");
    }

    #[test]
    fn test_file_id_missing() {
        let url = Url::parse("https://docs.google.com/document/u/0/").unwrap();
        assert!(matches!(file_id(&url), Err(ExtractError::InvalidInput(_))));
        let url = Url::parse("https://drive.google.com/file/d/").unwrap();
        assert!(matches!(file_id(&url), Err(ExtractError::InvalidInput(_))));
    }

    #[test]
    fn test_export_text() {
        let doc = export_to_document(&doc_url(), "\u{feff}Project plan\r\n\r\nPhase one").unwrap();
        assert_eq!(doc.source, SourceKind::GoogleDoc);
        assert!(doc.text().starts_with("Project plan"));
    }

    #[test]
    fn test_export_html_wall_is_permission_denied() {
        let html = "<!DOCTYPE html><html><head><title>Sign in</title></head><body></body></html>";
        assert!(matches!(
            export_to_document(&doc_url(), html),
            Err(ExtractError::PermissionDenied(_))
        ));
    }

    #[test]
    fn test_export_html_wall_with_text_is_permission_denied() {
        let html = "<html><body><p>You need access</p></body></html>";
        assert!(matches!(
            export_to_document(&doc_url(), html),
            Err(ExtractError::PermissionDenied(_))
        ));
    }

    #[test]
    fn test_export_empty_is_no_content() {
        assert!(matches!(
            export_to_document(&doc_url(), " \n\n "),
            Err(ExtractError::NoContent(_))
        ));
    }

    #[test]
    fn test_drive_pdf_uses_pdf_extractor_and_cleans_up() {
        let pdf = Recording::ok("Invoice total 42");
        let doc = download_to_document(&drive_url(), "application/pdf", b"%PDF-1.4", &pdf, &DocumentLoader).unwrap();

        assert_eq!(doc.source, SourceKind::GoogleDriveFile);
        assert_eq!(doc.text(), "Invoice total 42");

        let path = pdf.seen();
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("pdf"));
        assert!(!path.exists(), "temp file should be removed");
    }

    #[test]
    fn test_drive_pdf_failure_still_cleans_up() {
        let pdf = Recording::failing("corrupt pdf");
        let result = download_to_document(&drive_url(), "application/pdf", b"%PDF-1.4", &pdf, &DocumentLoader);

        assert!(matches!(result, Err(ExtractError::ExternalFailure(_))));
        assert!(!pdf.seen().exists(), "temp file should be removed");
    }

    #[test]
    fn test_drive_cleanup_tolerates_missing_file() {
        let pdf = Recording {
            delete_first: true,
            ..Recording::ok("already gone")
        };
        let doc = download_to_document(&drive_url(), "application/pdf", b"%PDF-1.4", &pdf, &DocumentLoader).unwrap();
        assert_eq!(doc.text(), "already gone");
    }

    #[test]
    fn test_drive_other_types_use_document_extractor() {
        let pdf = Recording::ok("wrong extractor");
        let documents = Recording::ok("Plain notes");
        let doc = download_to_document(&drive_url(), "text/plain", b"Plain notes", &pdf, &documents).unwrap();

        assert_eq!(doc.text(), "Plain notes");
        assert!(pdf.seen.lock().unwrap().is_none());
        let path = documents.seen();
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("txt"));
        assert!(!path.exists());
    }

    #[test]
    fn test_drive_html_page_is_permission_denied() {
        let pdf = Recording::ok("wrong extractor");
        let documents = Recording::ok("wrong extractor");
        let html = b"<!DOCTYPE html><html><head><title>Google Drive</title></head><body><p>Sign in to continue to Google Drive</p></body></html>";

        let result = download_to_document(&drive_url(), "text/html", html, &pdf, &documents);
        assert!(matches!(result, Err(ExtractError::PermissionDenied(_))));
        assert!(documents.seen.lock().unwrap().is_none());

        // Same wall served without a useful content type
        let result = download_to_document(&drive_url(), "application/octet-stream", html, &pdf, &documents);
        assert!(matches!(result, Err(ExtractError::PermissionDenied(_))));
        assert!(pdf.seen.lock().unwrap().is_none());
    }

    #[test]
    fn test_check_status_denies_any_failure() {
        assert!(check_status(StatusCode::OK, "Drive download").is_ok());
        for status in [
            StatusCode::NOT_FOUND,
            StatusCode::INTERNAL_SERVER_ERROR,
            StatusCode::FORBIDDEN,
        ] {
            assert!(matches!(
                check_status(status, "Google Doc export"),
                Err(ExtractError::PermissionDenied(_))
            ));
        }
    }

    #[test]
    fn test_drive_empty_file_is_no_content() {
        let result = download_to_document(&drive_url(), "text/plain", b"   ", &Recording::ok(""), &DocumentLoader);
        assert!(matches!(result, Err(ExtractError::NoContent(_))));
    }
}
