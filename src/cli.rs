use clap::Parser;
use std::io::{self, BufRead};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(
    name = "urlsum",
    about = "Summarize YouTube videos, Google Docs, Drive files, PDFs and web pages",
    version = env!("GIT_DESCRIBE"),
)]
pub struct Cli {
    /// URL to summarize (reads one URL per line from stdin if omitted)
    pub url: Option<String>,

    /// Output format: text (default), json
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Preferred caption language for YouTube videos
    #[arg(short, long)]
    pub lang: Option<String>,

    /// LLM model for summarization
    #[arg(short, long)]
    pub model: Option<String>,

    /// Print the extracted text instead of summarizing it
    #[arg(short = 'x', long)]
    pub extract_only: bool,

    /// Write output to file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Skip TLS certificate checks for generic web pages
    #[arg(short = 'k', long, conflicts_with = "secure")]
    pub insecure: bool,

    /// Verify TLS certificates for generic web pages
    #[arg(long)]
    pub secure: bool,

    /// Show source kind and document metadata
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Flag value if given, otherwise `fallback`
    pub fn accept_invalid_certs(&self, fallback: bool) -> bool {
        if self.insecure {
            true
        } else if self.secure {
            false
        } else {
            fallback
        }
    }
}

/// Lines of URL input. A line that is not valid UTF-8 yields an error and
/// reading continues with the next one; any other read error ends the input.
pub fn input_lines(reader: impl BufRead) -> impl Iterator<Item = io::Result<String>> {
    let mut done = false;
    reader.lines().map_while(move |line| {
        if done {
            return None;
        }
        if let Err(e) = &line {
            done = e.kind() != io::ErrorKind::InvalidData;
        }
        Some(line)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_parse_defaults() {
        let cli = Cli::try_parse_from(["urlsum", "https://example.com"]).unwrap();
        assert_eq!(cli.url.as_deref(), Some("https://example.com"));
        assert!(cli.format.is_none());
        assert!(!cli.extract_only);
        assert!(cli.accept_invalid_certs(true));
        assert!(!cli.accept_invalid_certs(false));
    }

    #[test]
    fn test_parse_flags() {
        let cli = Cli::try_parse_from(["urlsum", "-x", "-f", "json", "-l", "de", "--secure", "https://example.com"]).unwrap();
        assert!(cli.extract_only);
        assert_eq!(cli.format, Some(OutputFormat::Json));
        assert_eq!(cli.lang.as_deref(), Some("de"));
        assert!(!cli.accept_invalid_certs(true));
    }

    #[test]
    fn test_insecure_conflicts_with_secure() {
        assert!(Cli::try_parse_from(["urlsum", "-k", "--secure"]).is_err());
    }

    #[test]
    fn test_input_lines_skip_undecodable_line() {
        let input = Cursor::new(b"https://a.example\n\xff\xfe\x81\nhttps://b.example\n".to_vec());
        let lines: Vec<_> = input_lines(input).collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].as_ref().unwrap(), "https://a.example");
        assert_eq!(lines[1].as_ref().unwrap_err().kind(), io::ErrorKind::InvalidData);
        assert_eq!(lines[2].as_ref().unwrap(), "https://b.example");
    }
}
