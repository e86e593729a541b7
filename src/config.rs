use std::path::PathBuf;

use eyre::{Result, bail};
use log::debug;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub default_lang: Option<String>,
    pub default_format: Option<String>,
    pub default_model: Option<String>,
    /// Skip certificate checks when fetching generic web pages
    pub accept_invalid_certs: Option<bool>,
    pub subtitle_timeout_secs: Option<u64>,
    /// Path to the yt-dlp executable
    pub yt_dlp: Option<PathBuf>,
}

impl Config {
    /// Load config from ~/.config/urlsum/config.toml if it exists
    pub fn load() -> Result<Self> {
        let path = config_path();
        if path.exists() {
            debug!("Loading config from {}", path.display());
            let content = std::fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            debug!("No config file found at {}", path.display());
            Ok(Config::default())
        }
    }
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from(".config"))
        .join("urlsum")
        .join("config.toml")
}

/// API keys for the summarization providers
#[derive(Clone, Default)]
pub struct Credentials {
    pub anthropic: Option<String>,
    pub openai: Option<String>,
    pub groq: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shown = |k: &Option<String>| if k.is_some() { "<set>" } else { "<unset>" };
        f.debug_struct("Credentials")
            .field("anthropic", &shown(&self.anthropic))
            .field("openai", &shown(&self.openai))
            .field("groq", &shown(&self.groq))
            .finish()
    }
}

impl Credentials {
    /// Read keys from the process environment, after loading `.env` if one exists
    pub fn from_env() -> Self {
        match dotenvy::dotenv() {
            Ok(path) => debug!("Loaded environment from {}", path.display()),
            Err(e) if e.not_found() => debug!("No .env file found"),
            Err(e) => debug!("Ignoring unreadable .env file: {e}"),
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |keys: &[&str]| {
            keys.iter()
                .filter_map(|&k| lookup(k))
                .map(|v| v.trim().to_string())
                .find(|v| !v.is_empty())
        };
        Self {
            anthropic: get(&["ANTHROPIC_API_KEY"]),
            openai: get(&["OPENAI_API_KEY", "OPENAI_API"]),
            groq: get(&["GROQ_API_KEY", "GROQ_API"]),
        }
    }

    /// The key named `var`, or an error naming what needs it
    pub fn require<'a>(key: &'a Option<String>, var: &str, purpose: &str) -> Result<&'a str> {
        match key.as_deref() {
            Some(k) => Ok(k),
            None => bail!("{var} environment variable not set (required for {purpose})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_parse_config() {
        let toml_str = r#"
default_lang = "es"
default_format = "json"
default_model = "gpt-4o"
accept_invalid_certs = false
subtitle_timeout_secs = 300
yt_dlp = "/usr/local/bin/yt-dlp"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.default_lang.as_deref(), Some("es"));
        assert_eq!(config.default_format.as_deref(), Some("json"));
        assert_eq!(config.default_model.as_deref(), Some("gpt-4o"));
        assert_eq!(config.accept_invalid_certs, Some(false));
        assert_eq!(config.subtitle_timeout_secs, Some(300));
        assert_eq!(config.yt_dlp, Some(PathBuf::from("/usr/local/bin/yt-dlp")));
    }

    #[test]
    fn test_parse_empty_config() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.default_lang.is_none());
        assert!(config.default_format.is_none());
        assert!(config.accept_invalid_certs.is_none());
    }

    #[test]
    fn test_parse_partial_config() {
        let config: Config = toml::from_str(r#"default_lang = "fr""#).unwrap();
        assert_eq!(config.default_lang.as_deref(), Some("fr"));
        assert!(config.default_model.is_none());
    }

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_credentials_from_lookup() {
        let creds = Credentials::from_lookup(lookup(&[("ANTHROPIC_API_KEY", "sk-ant"), ("GROQ_API", " gsk ")]));
        assert_eq!(creds.anthropic.as_deref(), Some("sk-ant"));
        assert_eq!(creds.groq.as_deref(), Some("gsk"));
        assert!(creds.openai.is_none());
    }

    #[test]
    fn test_credentials_prefer_standard_name() {
        let creds = Credentials::from_lookup(lookup(&[("GROQ_API_KEY", "primary"), ("GROQ_API", "legacy")]));
        assert_eq!(creds.groq.as_deref(), Some("primary"));
    }

    #[test]
    fn test_credentials_blank_is_missing() {
        let creds = Credentials::from_lookup(lookup(&[("OPENAI_API_KEY", "   ")]));
        assert!(creds.openai.is_none());
    }

    #[test]
    fn test_require_missing_key() {
        let creds = Credentials::default();
        let err = Credentials::require(&creds.groq, "GROQ_API_KEY", "Groq summarization").unwrap_err();
        assert!(err.to_string().contains("GROQ_API_KEY"));
    }

    #[test]
    fn test_debug_hides_keys() {
        let creds = Credentials {
            openai: Some("sk-secret".to_string()),
            ..Default::default()
        };
        let shown = format!("{creds:?}");
        assert!(!shown.contains("sk-secret"));
        assert!(shown.contains("<set>"));
    }
}
