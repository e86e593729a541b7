use serde::Serialize;
use url::Url;

/// Where a URL's text comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    #[serde(rename = "youtube")]
    YouTube,
    GoogleDoc,
    GoogleDriveFile,
    Pdf,
    GenericWeb,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::YouTube => write!(f, "youtube"),
            SourceKind::GoogleDoc => write!(f, "google-doc"),
            SourceKind::GoogleDriveFile => write!(f, "google-drive"),
            SourceKind::Pdf => write!(f, "pdf"),
            SourceKind::GenericWeb => write!(f, "web"),
        }
    }
}

/// Pick the extraction strategy for a validated URL.
///
/// Checks run in a fixed order and the first match wins, so a PDF shared
/// through Drive is `GoogleDriveFile`, not `Pdf`.
pub fn classify(url: &Url) -> SourceKind {
    let text = url.as_str();

    if text.contains("youtube.com") || text.contains("youtu.be") {
        SourceKind::YouTube
    } else if text.contains("docs.google.com/document") {
        SourceKind::GoogleDoc
    } else if text.contains("drive.google.com/file") {
        SourceKind::GoogleDriveFile
    } else if url.path().to_ascii_lowercase().ends_with(".pdf") {
        SourceKind::Pdf
    } else {
        SourceKind::GenericWeb
    }
}
