use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use eyre::{Result, WrapErr, bail};
use log::debug;
use tokio::process::Command;

use crate::Segment;
use crate::youtube::parse_caption_xml;

/// Timed-text format requested from the tool; same XML as YouTube's caption endpoint
const SUB_FORMAT: &str = "srv1";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Fallback source of YouTube captions
#[async_trait]
pub trait SubtitleTool: Send + Sync {
    /// Caption fragments for the video, in any order
    async fn fetch_subtitles(&self, video_id: &str, lang: &str) -> Result<Vec<Segment>>;
}

/// Subtitles downloaded with `yt-dlp`
#[derive(Debug, Clone)]
pub struct YtDlp {
    program: PathBuf,
    timeout: Duration,
}

impl Default for YtDlp {
    fn default() -> Self {
        Self {
            program: PathBuf::from("yt-dlp"),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl YtDlp {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    fn command(&self, video_id: &str, lang: &str, out_dir: &Path) -> Command {
        let url = format!("https://www.youtube.com/watch?v={video_id}");
        let output_template = out_dir.join("%(id)s.%(ext)s");

        let mut cmd = Command::new(&self.program);
        cmd.args([
            "--skip-download",
            "--write-subs",
            "--write-auto-subs",
            "--sub-langs",
            &format!("{lang},{lang}-*"),
            "--sub-format",
            SUB_FORMAT,
            "--no-playlist",
            "--no-warnings",
            "-o",
        ])
        .arg(output_template)
        .arg(&url)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl SubtitleTool for YtDlp {
    async fn fetch_subtitles(&self, video_id: &str, lang: &str) -> Result<Vec<Segment>> {
        // Removed with everything yt-dlp wrote when `dir` drops
        let dir = tempfile::Builder::new()
            .prefix("urlsum-subs-")
            .tempdir()
            .wrap_err("failed to create subtitle directory")?;

        debug!("Running {} for {video_id} in {}", self.program.display(), dir.path().display());

        let child = match self.command(video_id, lang, dir.path()).spawn() {
            Ok(child) => child,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                bail!(
                    "yt-dlp not found. Install it to enable the subtitle fallback:\n  \
                     pip install yt-dlp\n  \
                     or: brew install yt-dlp"
                );
            }
            Err(e) => bail!("failed to run yt-dlp: {e}"),
        };

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => output.wrap_err("failed to wait for yt-dlp")?,
            Err(_) => bail!("yt-dlp did not finish within {}s", self.timeout.as_secs()),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("yt-dlp exited with status {}: {}", output.status, stderr.trim());
        }

        let Some(path) = find_subtitle_file(dir.path(), lang)? else {
            bail!("no '{lang}' subtitle track for video {video_id}");
        };
        debug!("Parsing subtitles from {}", path.display());

        let xml = std::fs::read_to_string(&path).wrap_err_with(|| format!("reading {}", path.display()))?;
        parse_caption_xml(&xml)
    }
}

/// Subtitle file for exactly `lang` if present, otherwise the first regional variant
fn find_subtitle_file(dir: &Path, lang: &str) -> Result<Option<PathBuf>> {
    let mut found: Vec<PathBuf> = std::fs::read_dir(dir)?
        .flatten()
        .map(|entry| entry.path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some(SUB_FORMAT))
        .collect();
    found.sort();

    let exact = format!(".{lang}.{SUB_FORMAT}");
    let preferred = found
        .iter()
        .position(|p| p.to_string_lossy().ends_with(&exact))
        .unwrap_or(0);
    Ok((!found.is_empty()).then(|| found.swap_remove(preferred)))
}
