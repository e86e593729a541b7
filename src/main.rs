use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use clap::ValueEnum;
use eyre::{Result, bail};
use log::{error, info, warn};

use urlsum::Resolver;
use urlsum::config::{Config, Credentials};
use urlsum::output::{self, Report};
use urlsum::resolver::ResolverSettings;
use urlsum::subtitles;
use urlsum::summarize::{self, Summarizer};

mod cli;

use cli::{Cli, OutputFormat};

fn setup_logging() -> Result<()> {
    let log_dir = log_dir();
    std::fs::create_dir_all(&log_dir)?;
    let log_file = log_dir.join("urlsum.log");

    let target = Box::new(std::fs::OpenOptions::new().create(true).append(true).open(&log_file)?);

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized: {}", log_file.display());
    Ok(())
}

fn log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("urlsum")
        .join("logs")
}

fn tool_version(name: &str) -> Option<String> {
    Command::new(name)
        .arg("--version")
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| {
            String::from_utf8_lossy(&o.stdout)
                .trim()
                .lines()
                .next()
                .unwrap_or("")
                .to_string()
        })
}

fn build_after_help() -> String {
    let yt_dlp = tool_version("yt-dlp");

    let yt_dlp_line = match &yt_dlp {
        Some(v) => format!("  \x1b[32m✅\x1b[0m yt-dlp     {v}"),
        None => "  \x1b[31m❌\x1b[0m yt-dlp     (not found, needed for the YouTube subtitle fallback)".to_string(),
    };

    let log_path = log_dir().join("urlsum.log");

    format!(
        "\nOPTIONAL TOOLS:\n{yt_dlp_line}\n\nAPI KEYS (env or .env):\n  GROQ_API_KEY, OPENAI_API_KEY, ANTHROPIC_API_KEY\n\nConfig: {}\nLogs are written to: {}",
        urlsum::config::config_path().display(),
        log_path.display()
    )
}

/// Extract one URL and render it in the requested format
async fn process(
    resolver: &Resolver,
    summarizer: Option<&Summarizer>,
    url: &str,
    format: OutputFormat,
    verbose: bool,
) -> Result<String> {
    if io::stderr().is_terminal() {
        eprintln!("Loading content from {url} ...");
    }

    let document = resolver.resolve(url).await?;

    if verbose {
        eprintln!(
            "URL: {}\nSource: {}\nTitle: {}\nSegments: {}",
            document.url,
            document.source,
            document.title.as_deref().unwrap_or("-"),
            document.segments.len(),
        );
    }

    let summary = match summarizer {
        Some(s) => Some(s.summarize(&document).await?),
        None => None,
    };

    let rendered = match format {
        OutputFormat::Text => match &summary {
            Some(summary) => summary.clone(),
            None => output::render_text(&document),
        },
        OutputFormat::Json => output::render_json(&Report {
            document: &document,
            summary: summary.as_deref(),
        })?,
    };
    Ok(rendered)
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging()?;

    let after_help = build_after_help();
    let cmd = <Cli as clap::CommandFactory>::command().after_help(after_help);
    let matches = cmd.get_matches();
    let cli = <Cli as clap::FromArgMatches>::from_arg_matches(&matches)?;

    // Load config file (non-fatal if missing/invalid)
    let config = Config::load().unwrap_or_else(|e| {
        warn!("Ignoring config file {}: {e}", urlsum::config::config_path().display());
        Config::default()
    });

    // CLI flags take priority over config
    let lang = cli.lang.clone().or(config.default_lang.clone()).unwrap_or_else(|| "en".to_string());
    let model = cli
        .model
        .clone()
        .or(config.default_model.clone())
        .unwrap_or_else(|| summarize::DEFAULT_MODEL.to_string());
    let format = cli
        .format
        .or_else(|| {
            config
                .default_format
                .as_deref()
                .and_then(|f| OutputFormat::from_str(f, true).ok())
        })
        .unwrap_or(OutputFormat::Text);

    let settings = ResolverSettings {
        lang,
        accept_invalid_certs: cli.accept_invalid_certs(config.accept_invalid_certs.unwrap_or(true)),
        yt_dlp: config.yt_dlp.clone().unwrap_or_else(|| PathBuf::from("yt-dlp")),
        subtitle_timeout: config
            .subtitle_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(subtitles::DEFAULT_TIMEOUT),
    };

    if cli.verbose {
        let config_path = urlsum::config::config_path();
        if config_path.exists() {
            eprintln!("Config: {}", config_path.display());
        }
        eprintln!("Settings: {settings:?}");
    }

    let resolver = Resolver::new(&settings)?;

    // Fail before any request if the summarizer has no key
    let summarizer = if cli.extract_only {
        None
    } else {
        Some(Summarizer::new(reqwest::Client::new(), &model, &Credentials::from_env())?)
    };

    // URLs from the argument, or one per line from stdin as they arrive
    let urls: Box<dyn Iterator<Item = io::Result<String>>> = match cli.url.clone() {
        Some(url) => Box::new(std::iter::once(Ok(url))),
        None => Box::new(cli::input_lines(io::stdin().lock())),
    };

    let mut outputs = Vec::new();
    let mut processed = 0usize;
    let mut failed = 0usize;

    for line in urls {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                processed += 1;
                failed += 1;
                error!("Unreadable input line: {e}");
                eprintln!("Error: unreadable input line: {e}");
                continue;
            }
        };
        let url_input = line.trim();
        if url_input.is_empty() {
            continue;
        }
        processed += 1;

        match process(&resolver, summarizer.as_ref(), url_input, format, cli.verbose).await {
            Ok(rendered) => {
                if cli.output.is_some() {
                    outputs.push(rendered);
                } else {
                    println!("{rendered}");
                }
            }
            Err(e) => {
                failed += 1;
                error!("{url_input}: {e:#}");
                eprintln!("Error: {url_input}\n{e:?}");
            }
        }
    }

    if processed == 0 {
        bail!("no URL provided\n\nUsage: urlsum <URL>\n       echo <URL> | urlsum");
    }

    if let Some(ref path) = cli.output {
        std::fs::write(path, outputs.join("\n\n"))?;
        if cli.verbose {
            eprintln!("Output written to: {}", path.display());
        }
    }

    if failed > 0 {
        bail!("{failed} URL(s) could not be summarized");
    }

    Ok(())
}
