use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

// --- Provider trait ---

#[async_trait]
pub trait AIProvider: Send + Sync {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String>;
    fn model_name(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderKind {
    Anthropic,
    OpenAI,
}

#[derive(Debug, Clone)]
pub struct ModelSpec {
    pub provider: ProviderKind,
    pub model_id: String,
    pub short_name: String,
}

impl ModelSpec {
    pub fn api_key_var(&self) -> &'static str {
        match self.provider {
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
            ProviderKind::OpenAI => "OPENAI_API_KEY",
        }
    }
}

pub const DEFAULT_MODEL: &str = "gpt-4o";

pub fn resolve_model(name: &str) -> Result<ModelSpec> {
    let (provider, model_id, short_name) = match name {
        // OpenAI (requires OPENAI_API_KEY)
        "gpt-4o" => (ProviderKind::OpenAI, "gpt-4o", "gpt-4o"),
        "gpt-4o-mini" => (ProviderKind::OpenAI, "gpt-4o-mini", "gpt-4o-mini"),
        "o3" => (ProviderKind::OpenAI, "o3", "o3"),
        // Anthropic API (requires ANTHROPIC_API_KEY)
        "api-sonnet" | "sonnet" => (
            ProviderKind::Anthropic,
            "claude-sonnet-4-5-20250929",
            "api-sonnet",
        ),
        "api-opus" | "opus" => (ProviderKind::Anthropic, "claude-opus-4-6", "api-opus"),
        "api-haiku" | "haiku" => (
            ProviderKind::Anthropic,
            "claude-haiku-4-5-20251001",
            "api-haiku",
        ),
        _ => {
            return Err(anyhow!(
                "Unknown model '{}'. Available: gpt-4o (default), gpt-4o-mini, o3, \
                 api-sonnet, api-opus, api-haiku",
                name
            ));
        }
    };

    Ok(ModelSpec {
        provider,
        model_id: model_id.to_string(),
        short_name: short_name.to_string(),
    })
}

pub fn create_provider(spec: &ModelSpec, api_key: String) -> Result<Box<dyn AIProvider>> {
    match spec.provider {
        ProviderKind::Anthropic => Ok(Box::new(AnthropicProvider::new(
            api_key,
            spec.model_id.clone(),
        )?)),
        ProviderKind::OpenAI => Ok(Box::new(OpenAIProvider::new(
            api_key,
            spec.model_id.clone(),
        )?)),
    }
}

fn build_client() -> Result<Client> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context("Failed to create HTTP client")
}

// --- Anthropic provider ---

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
}

#[derive(Debug)]
pub struct AnthropicProvider {
    api_key: String,
    model_id: String,
    api_url: String,
    client: Client,
}

impl AnthropicProvider {
    pub fn new(api_key: String, model_id: String) -> Result<Self> {
        Ok(Self {
            api_key,
            model_id,
            api_url: ANTHROPIC_API_URL.to_string(),
            client: build_client()?,
        })
    }

    pub fn from_env(model_id: String) -> Result<Self> {
        let api_key = env::var("ANTHROPIC_API_KEY")
            .context("ANTHROPIC_API_KEY environment variable not set. Set it with: export ANTHROPIC_API_KEY=your-key-here")?;
        Self::new(api_key, model_id)
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }
}

#[async_trait]
impl AIProvider for AnthropicProvider {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        let request = AnthropicRequest {
            model: &self.model_id,
            max_tokens,
            messages: vec![AnthropicMessage {
                role: "user",
                content: prompt,
            }],
        };

        debug!(model = %self.model_id, prompt_len = prompt.len(), "Sending Anthropic request");

        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .context("Failed to send request to Anthropic API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "Anthropic API request failed with status {}: {}",
                status,
                error_text
            ));
        }

        let api_response: AnthropicResponse = response
            .json()
            .await
            .context("Failed to parse Anthropic API response")?;

        api_response
            .content
            .into_iter()
            .find(|block| block.content_type == "text")
            .and_then(|block| block.text)
            .ok_or_else(|| anyhow!("No text content in Anthropic API response"))
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}

// --- OpenAI provider ---

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Debug, Serialize)]
struct OpenAIMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    max_completion_tokens: u32,
    messages: Vec<OpenAIMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug)]
pub struct OpenAIProvider {
    api_key: String,
    model_id: String,
    api_url: String,
    client: Client,
}

impl OpenAIProvider {
    pub fn new(api_key: String, model_id: String) -> Result<Self> {
        Ok(Self {
            api_key,
            model_id,
            api_url: OPENAI_API_URL.to_string(),
            client: build_client()?,
        })
    }

    pub fn from_env(model_id: String) -> Result<Self> {
        let api_key = env::var("OPENAI_API_KEY")
            .context("OPENAI_API_KEY environment variable not set. Set it with: export OPENAI_API_KEY=your-key-here")?;
        Self::new(api_key, model_id)
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }
}

#[async_trait]
impl AIProvider for OpenAIProvider {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        let request = OpenAIRequest {
            model: &self.model_id,
            max_completion_tokens: max_tokens,
            messages: vec![OpenAIMessage {
                role: "user",
                content: prompt,
            }],
        };

        debug!(model = %self.model_id, prompt_len = prompt.len(), "Sending OpenAI request");

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .context("Failed to send request to OpenAI API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "OpenAI API request failed with status {}: {}",
                status,
                error_text
            ));
        }

        let api_response: OpenAIResponse = response
            .json()
            .await
            .context("Failed to parse OpenAI API response")?;

        api_response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("No choices in OpenAI API response"))
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_model_openai() {
        let spec = resolve_model("gpt-4o").unwrap();
        assert_eq!(spec.model_id, "gpt-4o");
        assert_eq!(spec.provider, ProviderKind::OpenAI);
        assert_eq!(spec.api_key_var(), "OPENAI_API_KEY");

        let spec = resolve_model("o3").unwrap();
        assert_eq!(spec.provider, ProviderKind::OpenAI);

        let spec = resolve_model(DEFAULT_MODEL).unwrap();
        assert_eq!(spec.short_name, "gpt-4o");
    }

    #[test]
    fn test_resolve_model_anthropic_api() {
        let spec = resolve_model("api-sonnet").unwrap();
        assert_eq!(spec.model_id, "claude-sonnet-4-5-20250929");
        assert_eq!(spec.provider, ProviderKind::Anthropic);
        assert_eq!(spec.api_key_var(), "ANTHROPIC_API_KEY");

        let spec = resolve_model("opus").unwrap();
        assert_eq!(spec.short_name, "api-opus");
    }

    #[test]
    fn test_resolve_model_unknown() {
        let err = resolve_model("gpt-3").unwrap_err();
        assert!(err.to_string().contains("Unknown model 'gpt-3'"));
    }

    #[test]
    fn test_create_provider_uses_spec_model() {
        let spec = resolve_model("api-haiku").unwrap();
        let provider = create_provider(&spec, "test-key".to_string()).unwrap();
        assert_eq!(provider.model_name(), "claude-haiku-4-5-20251001");
    }

    #[test]
    fn test_openai_provider_requires_api_key() {
        let original = env::var("OPENAI_API_KEY").ok();
        unsafe {
            env::remove_var("OPENAI_API_KEY");
        }

        let result = OpenAIProvider::from_env("gpt-4o".to_string());

        if let Some(val) = original {
            unsafe {
                env::set_var("OPENAI_API_KEY", val);
            }
        }

        let err_msg = result.unwrap_err().to_string();
        assert!(err_msg.contains("OPENAI_API_KEY"));
    }

    #[tokio::test]
    async fn test_openai_provider_returns_first_choice() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer test-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"hello"}}]}"#)
            .create_async()
            .await;

        let provider = OpenAIProvider::new("test-key".to_string(), "gpt-4o".to_string())
            .unwrap()
            .with_api_url(format!("{}/v1/chat/completions", server.url()));

        let text = provider.complete("say hello", 64).await.unwrap();
        assert_eq!(text, "hello");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_openai_provider_reports_error_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(401)
            .with_body("invalid api key")
            .create_async()
            .await;

        let provider = OpenAIProvider::new("bad-key".to_string(), "gpt-4o".to_string())
            .unwrap()
            .with_api_url(format!("{}/v1/chat/completions", server.url()));

        let err = provider.complete("hi", 64).await.unwrap_err().to_string();
        assert!(err.contains("401"));
        assert!(err.contains("invalid api key"));
    }

    #[tokio::test]
    async fn test_anthropic_provider_returns_text_block() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/messages")
            .match_header("x-api-key", "test-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"content":[{"type":"text","text":"{\"ok\":true}"}]}"#)
            .create_async()
            .await;

        let provider = AnthropicProvider::new(
            "test-key".to_string(),
            "claude-sonnet-4-5-20250929".to_string(),
        )
        .unwrap()
        .with_api_url(format!("{}/v1/messages", server.url()));

        let text = provider.complete("json please", 64).await.unwrap();
        assert_eq!(text, r#"{"ok":true}"#);
        mock.assert_async().await;
    }
}
