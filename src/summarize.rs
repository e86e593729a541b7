use std::time::Duration;

use eyre::{Result, bail};
use log::debug;

use crate::Document;
use crate::config::Credentials;

const SUMMARY_PROMPT: &str = "Provide a concise summary of the following content in under 300 words.";

const TEMPERATURE: f64 = 0.2;

/// Upper bound on one summarization call, including the response body
pub const TIMEOUT: Duration = Duration::from_secs(90);

const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";
const GROQ_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const ANTHROPIC_URL: &str = "https://api.anthropic.com/v1/messages";

pub const DEFAULT_MODEL: &str = "llama-3.1-8b-instant";

/// Hosted API a model name is served by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Anthropic,
    OpenAi,
    Groq,
}

impl Provider {
    pub fn for_model(model: &str) -> Self {
        if model.starts_with("claude") {
            Provider::Anthropic
        } else if ["gpt-", "o1", "o3", "o4", "chatgpt-"].iter().any(|p| model.starts_with(p)) {
            Provider::OpenAi
        } else {
            Provider::Groq
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::Anthropic => write!(f, "Anthropic"),
            Provider::OpenAi => write!(f, "OpenAI"),
            Provider::Groq => write!(f, "Groq"),
        }
    }
}

/// One-shot document summaries from a hosted LLM
pub struct Summarizer {
    client: reqwest::Client,
    model: String,
    provider: Provider,
    api_key: String,
}

impl Summarizer {
    /// Fails when the key for the model's provider is missing
    pub fn new(client: reqwest::Client, model: &str, credentials: &Credentials) -> Result<Self> {
        let provider = Provider::for_model(model);
        let purpose = format!("{provider} summarization with {model}");
        let api_key = match provider {
            Provider::Anthropic => Credentials::require(&credentials.anthropic, "ANTHROPIC_API_KEY", &purpose)?,
            Provider::OpenAi => Credentials::require(&credentials.openai, "OPENAI_API_KEY", &purpose)?,
            Provider::Groq => Credentials::require(&credentials.groq, "GROQ_API_KEY", &purpose)?,
        }
        .to_string();

        Ok(Self {
            client,
            model: model.to_string(),
            provider,
            api_key,
        })
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// Summarize a document
    pub async fn summarize(&self, document: &Document) -> Result<String> {
        let prompt = build_prompt(document);
        debug!(
            "Summarizing {} chars via {} with model {}",
            prompt.len(),
            self.provider,
            self.model
        );

        match self.provider {
            Provider::Anthropic => self.summarize_anthropic(&prompt).await,
            Provider::OpenAi => self.summarize_openai_compatible(OPENAI_URL, &prompt).await,
            Provider::Groq => self.summarize_openai_compatible(GROQ_URL, &prompt).await,
        }
    }

    async fn summarize_anthropic(&self, prompt: &str) -> Result<String> {
        let resp = self.anthropic_request(prompt).send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("Anthropic API returned {status}: {body}");
        }

        let json: serde_json::Value = resp.json().await?;
        extract_anthropic_text(&json)
    }

    fn anthropic_request(&self, prompt: &str) -> reqwest::RequestBuilder {
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": 1024,
            "temperature": TEMPERATURE,
            "messages": [
                {
                    "role": "user",
                    "content": prompt
                }
            ]
        });

        self.client
            .post(ANTHROPIC_URL)
            .timeout(TIMEOUT)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&body)
    }

    async fn summarize_openai_compatible(&self, endpoint: &str, prompt: &str) -> Result<String> {
        let resp = self.openai_request(endpoint, prompt).send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("{} API returned {status}: {body}", self.provider);
        }

        let json: serde_json::Value = resp.json().await?;
        extract_openai_text(&json)
    }

    fn openai_request(&self, endpoint: &str, prompt: &str) -> reqwest::RequestBuilder {
        let body = serde_json::json!({
            "model": self.model,
            "temperature": TEMPERATURE,
            "stream": false,
            "messages": [
                {
                    "role": "user",
                    "content": prompt
                }
            ]
        });

        self.client
            .post(endpoint)
            .timeout(TIMEOUT)
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
    }
}

fn build_prompt(document: &Document) -> String {
    let content = match &document.title {
        Some(title) => format!("Title: {title}\n\n{}", document.text()),
        None => document.text(),
    };
    format!("{SUMMARY_PROMPT}\n\nContent:\n{content}\n")
}

fn extract_anthropic_text(json: &serde_json::Value) -> Result<String> {
    if let Some(content) = json.get("content").and_then(|c| c.as_array()) {
        let text: String = content
            .iter()
            .filter_map(|block| {
                if block.get("type")?.as_str()? == "text" {
                    block.get("text")?.as_str().map(|s| s.to_string())
                } else {
                    None
                }
            })
            .collect::<Vec<_>>()
            .join("");
        if !text.is_empty() {
            return Ok(text);
        }
    }
    bail!("unexpected Anthropic API response format");
}

/// Shared by OpenAI and Groq, which speak the same chat completions format
fn extract_openai_text(json: &serde_json::Value) -> Result<String> {
    if let Some(text) = json
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|t| t.as_str())
    {
        return Ok(text.to_string());
    }
    bail!("unexpected chat completions response format");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Segment, SourceKind};

    fn creds() -> Credentials {
        Credentials {
            anthropic: Some("sk-ant".to_string()),
            openai: None,
            groq: Some("gsk".to_string()),
        }
    }

    #[test]
    fn test_provider_for_model() {
        assert_eq!(Provider::for_model("claude-sonnet-4-6"), Provider::Anthropic);
        assert_eq!(Provider::for_model("gpt-4o-mini"), Provider::OpenAi);
        assert_eq!(Provider::for_model("o3-mini"), Provider::OpenAi);
        assert_eq!(Provider::for_model("llama-3.1-8b-instant"), Provider::Groq);
        assert_eq!(Provider::for_model(DEFAULT_MODEL), Provider::Groq);
    }

    #[test]
    fn test_summarizer_requires_provider_key() {
        let err = Summarizer::new(reqwest::Client::new(), "gpt-4o", &creds()).err().unwrap();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn test_summarizer_with_key() {
        let summarizer = Summarizer::new(reqwest::Client::new(), DEFAULT_MODEL, &creds()).unwrap();
        assert_eq!(summarizer.provider(), Provider::Groq);
    }

    #[test]
    fn test_requests_carry_timeout() {
        let summarizer = Summarizer::new(reqwest::Client::new(), "claude-sonnet-4-6", &creds()).unwrap();

        let request = summarizer.anthropic_request("prompt").build().unwrap();
        assert_eq!(request.timeout(), Some(&TIMEOUT));

        let request = summarizer.openai_request(GROQ_URL, "prompt").build().unwrap();
        assert_eq!(request.timeout(), Some(&TIMEOUT));
        assert_eq!(request.url().as_str(), GROQ_URL);
    }

    #[test]
    fn test_build_prompt() {
        let doc = Document::new(
            SourceKind::GenericWeb,
            "https://example.com",
            vec![Segment::text("First."), Segment::text("Second.")],
        )
        .unwrap()
        .with_title(Some("Example".to_string()));

        let prompt = build_prompt(&doc);
        assert!(prompt.starts_with(SUMMARY_PROMPT));
        assert!(prompt.contains("Title: Example\n\nFirst. Second."));
    }

    #[test]
    fn test_extract_anthropic_text() {
        let json = serde_json::json!({
            "content": [
                {
                    "type": "text",
                    "text": "Here is the summary."
                }
            ]
        });
        assert_eq!(extract_anthropic_text(&json).unwrap(), "Here is the summary.");
    }

    #[test]
    fn test_extract_anthropic_text_empty() {
        let json = serde_json::json!({"content": []});
        assert!(extract_anthropic_text(&json).is_err());
    }

    #[test]
    fn test_extract_openai_text() {
        let json = serde_json::json!({
            "choices": [
                {
                    "message": {
                        "role": "assistant",
                        "content": "Summary of the page."
                    }
                }
            ]
        });
        assert_eq!(extract_openai_text(&json).unwrap(), "Summary of the page.");
    }

    #[test]
    fn test_extract_openai_text_empty() {
        let json = serde_json::json!({"choices": []});
        assert!(extract_openai_text(&json).is_err());
    }
}
