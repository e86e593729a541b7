use std::time::Duration;

use async_trait::async_trait;
use eyre::WrapErr;
use log::{debug, info, warn};
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::subtitles::SubtitleTool;
use crate::{Document, ExtractError, Segment, SourceKind, USER_AGENT};

pub const TIMEOUT: Duration = Duration::from_secs(15);

/// Caption text from the primary transcript service
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    pub title: Option<String>,
    pub segments: Vec<Segment>,
}

/// How the primary transcript service failed
#[derive(Debug, Error)]
pub enum TranscriptError {
    /// Service unreachable, blocked, or answering with an error status
    #[error("transcript service unavailable: {0}")]
    Unavailable(String),

    /// No caption track in the requested language
    #[error("no transcript: {0}")]
    NoTranscript(String),

    /// A track was found but carried no text
    #[error("transcript is empty")]
    Empty,

    /// The caption payload could not be parsed
    #[error("malformed transcript: {0}")]
    Malformed(String),
}

impl TranscriptError {
    /// Whether the subtitle tool is worth trying after this failure
    pub fn allows_fallback(&self) -> bool {
        !matches!(self, TranscriptError::Malformed(_))
    }
}

/// Primary source of YouTube captions
#[async_trait]
pub trait TranscriptService: Send + Sync {
    async fn fetch_transcript(&self, video_id: &str, lang: &str) -> Result<Transcript, TranscriptError>;
}

/// Extract the video id from a YouTube URL
pub fn video_id(url: &Url) -> Result<String, ExtractError> {
    let re = Regex::new(r"(?:[?&]v=|youtu\.be/|/shorts/|/embed/)([^&?/#]+)").map_err(ExtractError::external)?;
    re.captures(url.as_str())
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| ExtractError::InvalidInput(format!("no video id in YouTube URL: {url}")))
}

/// Fetch a transcript, falling back to the subtitle tool when the service
/// is unavailable, has no English track, or returns nothing.
pub async fn extract(
    url: &Url,
    lang: &str,
    transcripts: &dyn TranscriptService,
    subtitles: &dyn SubtitleTool,
) -> Result<Document, ExtractError> {
    let video_id = video_id(url)?;
    debug!("YouTube video id: {video_id}");

    match transcripts.fetch_transcript(&video_id, lang).await {
        Ok(t) if t.segments.iter().any(|s| !s.text.trim().is_empty()) => {
            info!("Transcript for {video_id}: {} segments", t.segments.len());
            return Ok(Document::new(SourceKind::YouTube, url.as_str(), t.segments)?.with_title(t.title));
        }
        Ok(_) => warn!("Transcript for {video_id} is empty; trying subtitle tool"),
        Err(e) if e.allows_fallback() => warn!("{e}; trying subtitle tool for {video_id}"),
        Err(e) => return Err(ExtractError::ExternalFailure(eyre::Report::new(e))),
    }

    let fragments = subtitles
        .fetch_subtitles(&video_id, lang)
        .await
        .wrap_err_with(|| format!("subtitle fallback failed for {video_id}"))?;

    let text = join_fragments(fragments);
    Document::new(SourceKind::YouTube, url.as_str(), vec![Segment::text(text)])
}

/// Chronological caption text separated by spaces
fn join_fragments(mut fragments: Vec<Segment>) -> String {
    fragments.sort_by(|a, b| a.start.unwrap_or(0.0).total_cmp(&b.start.unwrap_or(0.0)));
    fragments
        .iter()
        .map(|s| s.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Deserialize)]
struct InnerTubePlayerResponse {
    captions: Option<CaptionsData>,
    #[serde(rename = "videoDetails")]
    video_details: Option<VideoDetails>,
}

#[derive(Debug, Deserialize)]
struct VideoDetails {
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CaptionsData {
    #[serde(rename = "playerCaptionsTracklistRenderer")]
    player_captions_tracklist_renderer: Option<CaptionTracklistRenderer>,
}

#[derive(Debug, Deserialize)]
struct CaptionTracklistRenderer {
    #[serde(rename = "captionTracks")]
    caption_tracks: Option<Vec<CaptionTrack>>,
}

#[derive(Debug, Deserialize)]
struct CaptionTrack {
    #[serde(rename = "baseUrl")]
    base_url: String,
    #[serde(rename = "languageCode")]
    language_code: String,
    /// `asr` marks auto-generated tracks
    kind: Option<String>,
}

/// Transcripts from YouTube's built-in captions via the InnerTube API
#[derive(Debug, Clone)]
pub struct InnerTube {
    client: reqwest::Client,
}

impl InnerTube {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn get_text(&self, url: &str) -> Result<String, TranscriptError> {
        self.client
            .get(url)
            .header("User-Agent", USER_AGENT)
            .timeout(TIMEOUT)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(unavailable)?
            .text()
            .await
            .map_err(unavailable)
    }
}

fn unavailable(e: impl std::fmt::Display) -> TranscriptError {
    TranscriptError::Unavailable(e.to_string())
}

#[async_trait]
impl TranscriptService for InnerTube {
    async fn fetch_transcript(&self, video_id: &str, lang: &str) -> Result<Transcript, TranscriptError> {
        // Step 1: Fetch the watch page to get the InnerTube API key
        let watch_url = format!("https://www.youtube.com/watch?v={video_id}");
        debug!("Fetching watch page: {watch_url}");

        let page_html = self.get_text(&watch_url).await?;
        let api_key = extract_api_key(&page_html).ok_or_else(|| {
            TranscriptError::Unavailable("could not extract InnerTube API key from watch page".to_string())
        })?;
        debug!("Extracted InnerTube API key: {api_key}");

        // Step 2: Call InnerTube player endpoint
        let player_url = format!("https://www.youtube.com/youtubei/v1/player?key={api_key}&prettyPrint=false");

        let body = serde_json::json!({
            "context": {
                "client": {
                    "hl": lang,
                    "gl": "US",
                    "clientName": "WEB",
                    "clientVersion": "2.20241126.01.00"
                }
            },
            "videoId": video_id
        });

        let resp: InnerTubePlayerResponse = self
            .client
            .post(&player_url)
            .header("User-Agent", USER_AGENT)
            .header("Content-Type", "application/json")
            .timeout(TIMEOUT)
            .json(&body)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(unavailable)?
            .json()
            .await
            .map_err(|e| TranscriptError::Malformed(e.to_string()))?;

        let title = resp.video_details.and_then(|vd| vd.title);

        let tracks = resp
            .captions
            .and_then(|c| c.player_captions_tracklist_renderer)
            .and_then(|r| r.caption_tracks)
            .unwrap_or_default();

        let track = pick_track(&tracks, lang)
            .ok_or_else(|| TranscriptError::NoTranscript(format!("no '{lang}' captions for video {video_id}")))?;
        debug!(
            "Using caption track: lang={} kind={}",
            track.language_code,
            track.kind.as_deref().unwrap_or("manual")
        );

        // Step 3: Fetch the caption XML
        let caption_xml = self.get_text(&track.base_url).await?;
        let segments = parse_caption_xml(&caption_xml).map_err(|e| TranscriptError::Malformed(format!("{e:#}")))?;

        if segments.is_empty() {
            return Err(TranscriptError::Empty);
        }

        Ok(Transcript { title, segments })
    }
}

/// Manually created track in `lang` first, then the auto-generated one
fn pick_track<'a>(tracks: &'a [CaptionTrack], lang: &str) -> Option<&'a CaptionTrack> {
    let in_lang: Vec<&CaptionTrack> = tracks
        .iter()
        .filter(|t| lang_matches(&t.language_code, lang))
        .collect();
    in_lang
        .iter()
        .find(|t| t.kind.as_deref() != Some("asr"))
        .or_else(|| in_lang.iter().find(|t| t.kind.as_deref() == Some("asr")))
        .copied()
}

fn lang_matches(code: &str, lang: &str) -> bool {
    code == lang
        || code
            .strip_prefix(lang)
            .is_some_and(|rest| rest.starts_with('-'))
}

fn extract_api_key(html: &str) -> Option<String> {
    let patterns = [
        r#""INNERTUBE_API_KEY"\s*:\s*"([^"]+)""#,
        // Fallback: try the newer pattern
        r#"innertubeApiKey\s*[=:]\s*"([^"]+)""#,
    ];
    patterns
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .find_map(|re| re.captures(html).map(|caps| caps[1].to_string()))
}

/// Parse YouTube timed text (`<text start=".." dur="..">`) into segments
pub(crate) fn parse_caption_xml(xml: &str) -> eyre::Result<Vec<Segment>> {
    use quick_xml::Reader;
    use quick_xml::events::Event;

    let mut reader = Reader::from_str(xml);
    let mut segments = Vec::new();
    let mut current_start: Option<f64> = None;
    let mut current_dur: Option<f64> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"text" => {
                let mut start = None;
                let mut dur = None;
                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"start" => {
                            start = String::from_utf8_lossy(&attr.value).parse::<f64>().ok();
                        }
                        b"dur" => {
                            dur = String::from_utf8_lossy(&attr.value).parse::<f64>().ok();
                        }
                        _ => {}
                    }
                }
                current_start = start;
                current_dur = dur;
            }
            Ok(Event::Empty(_)) => {
                // Self-closing <text .../> with no content
            }
            Ok(Event::Text(ref e)) => {
                if let Some(start) = current_start.take() {
                    let dur = current_dur.take().unwrap_or(0.0);
                    let raw_text = e.unescape().unwrap_or_default().to_string();
                    let text = html_escape::decode_html_entities(&raw_text).trim().to_string();
                    if !text.is_empty() {
                        segments.push(Segment::timed(text, start, dur));
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => eyre::bail!("error parsing caption XML: {e}"),
            _ => {}
        }
    }

    Ok(segments)
}
