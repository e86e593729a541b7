use std::path::PathBuf;
use std::time::Duration;

use log::{debug, info};

use crate::loader::{DocumentLoader, PdfLoader, TextExtractor};
use crate::subtitles::{self, SubtitleTool, YtDlp};
use crate::youtube::{InnerTube, TranscriptService};
use crate::{Document, ExtractError, SourceKind, USER_AGENT, classify, google, pdf, validate_url, web, youtube};

/// Knobs the resolver is built from
#[derive(Debug, Clone)]
pub struct ResolverSettings {
    pub lang: String,
    pub accept_invalid_certs: bool,
    pub yt_dlp: PathBuf,
    pub subtitle_timeout: Duration,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            lang: "en".to_string(),
            accept_invalid_certs: true,
            yt_dlp: PathBuf::from("yt-dlp"),
            subtitle_timeout: subtitles::DEFAULT_TIMEOUT,
        }
    }
}

/// Turns a URL into a [`Document`] using the strategy its [`SourceKind`] calls for
pub struct Resolver {
    http: reqwest::Client,
    web: reqwest::Client,
    lang: String,
    transcripts: Box<dyn TranscriptService>,
    subtitles: Box<dyn SubtitleTool>,
    pdf: Box<dyn TextExtractor>,
    documents: Box<dyn TextExtractor>,
}

impl Resolver {
    pub fn new(settings: &ResolverSettings) -> Result<Self, ExtractError> {
        let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        let web = web::client(settings.accept_invalid_certs)?;

        Ok(Self {
            transcripts: Box::new(InnerTube::new(http.clone())),
            subtitles: Box::new(YtDlp::new(&settings.yt_dlp, settings.subtitle_timeout)),
            pdf: Box::new(PdfLoader),
            documents: Box::new(DocumentLoader),
            http,
            web,
            lang: settings.lang.clone(),
        })
    }

    pub fn with_transcripts(mut self, transcripts: impl TranscriptService + 'static) -> Self {
        self.transcripts = Box::new(transcripts);
        self
    }

    pub fn with_subtitles(mut self, subtitles: impl SubtitleTool + 'static) -> Self {
        self.subtitles = Box::new(subtitles);
        self
    }

    pub fn with_pdf(mut self, pdf: impl TextExtractor + 'static) -> Self {
        self.pdf = Box::new(pdf);
        self
    }

    pub fn with_documents(mut self, documents: impl TextExtractor + 'static) -> Self {
        self.documents = Box::new(documents);
        self
    }

    /// Validate, classify and extract. Malformed input fails before any network call.
    pub async fn resolve(&self, input: &str) -> Result<Document, ExtractError> {
        let url = validate_url(input)?;
        let kind = classify(&url);
        debug!("Classified {url} as {kind}");

        let doc = match kind {
            SourceKind::YouTube => {
                youtube::extract(&url, &self.lang, self.transcripts.as_ref(), self.subtitles.as_ref()).await?
            }
            SourceKind::GoogleDoc => google::extract_doc(&self.http, &url).await?,
            SourceKind::GoogleDriveFile => {
                google::extract_drive_file(&self.http, &url, self.pdf.as_ref(), self.documents.as_ref()).await?
            }
            SourceKind::Pdf => pdf::extract(&self.http, &url, self.pdf.as_ref()).await?,
            SourceKind::GenericWeb => web::extract(&self.web, &url, self.pdf.as_ref()).await?,
        };

        info!(
            "Resolved {} ({}): {} segments, {} chars",
            doc.url,
            doc.source,
            doc.segments.len(),
            doc.text().len()
        );
        Ok(doc)
    }
}
