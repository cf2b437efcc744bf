//! Remote advice generators.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::error::GeneratorError;

pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

pub const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const GEMINI_DEFAULT_MODEL: &str = "gemini-2.5-flash";

const TEMPERATURE: f32 = 0.7;
const MAX_OUTPUT_TOKENS: u32 = 1024;

/// Text in, text out. Implementations return the trimmed response.
#[async_trait]
pub trait AdviceGenerator: Send + Sync {
    async fn generate(&self, system_prompt: &str, user_message: &str)
        -> Result<String, GeneratorError>;

    fn name(&self) -> &str;
}

/// Reject blank keys and unfilled placeholders such as `YOUR_API_KEY`.
pub fn validate_api_key(provider: &str, api_key: &str) -> Result<String, GeneratorError> {
    let key = api_key.trim();
    if key.is_empty() || key.contains("YOUR_") || key.contains("_KEY_HERE") {
        return Err(GeneratorError::InvalidApiKey(provider.to_string()));
    }
    Ok(key.to_string())
}

fn http_client() -> Result<Client, GeneratorError> {
    Ok(Client::builder().timeout(Duration::from_secs(30)).build()?)
}

fn non_empty(text: &str) -> Result<String, GeneratorError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(GeneratorError::EmptyResponse);
    }
    Ok(trimmed.to_string())
}

async fn api_error(response: reqwest::Response) -> GeneratorError {
    let status = response.status();
    let message = response.text().await.unwrap_or_default();
    warn!(status = %status, "Advice request failed");
    GeneratorError::Api {
        status: status.as_u16(),
        message,
    }
}

// OpenAI-compatible chat completions

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAiGenerator {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiGenerator {
    pub fn new(api_key: &str, model: Option<&str>) -> Result<Self, GeneratorError> {
        Self::with_base_url(api_key, model, OPENAI_API_BASE)
    }

    pub fn with_base_url(
        api_key: &str,
        model: Option<&str>,
        base_url: &str,
    ) -> Result<Self, GeneratorError> {
        Ok(Self {
            client: http_client()?,
            api_key: validate_api_key("openai", api_key)?,
            model: model.unwrap_or(OPENAI_DEFAULT_MODEL).to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl AdviceGenerator for OpenAiGenerator {
    #[instrument(skip(self, system_prompt, user_message), fields(model = %self.model))]
    async fn generate(
        &self,
        system_prompt: &str,
        user_message: &str,
    ) -> Result<String, GeneratorError> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_message,
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_OUTPUT_TOKENS,
        };

        debug!("Requesting advice from OpenAI");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let body: ChatResponse = serde_json::from_slice(&response.bytes().await?)?;
        let text = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(GeneratorError::EmptyResponse)?;

        non_empty(&text)
    }

    fn name(&self) -> &str {
        "openai"
    }
}

// Gemini generateContent

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    system_instruction: GeminiContent<'a>,
    contents: [GeminiContent<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: [GeminiPart<'a>; 1],
}

#[derive(Debug, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiResponseContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: Option<String>,
}

pub struct GeminiGenerator {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiGenerator {
    pub fn new(api_key: &str, model: Option<&str>) -> Result<Self, GeneratorError> {
        Self::with_base_url(api_key, model, GEMINI_API_BASE)
    }

    pub fn with_base_url(
        api_key: &str,
        model: Option<&str>,
        base_url: &str,
    ) -> Result<Self, GeneratorError> {
        Ok(Self {
            client: http_client()?,
            api_key: validate_api_key("gemini", api_key)?,
            model: model.unwrap_or(GEMINI_DEFAULT_MODEL).to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl AdviceGenerator for GeminiGenerator {
    #[instrument(skip(self, system_prompt, user_message), fields(model = %self.model))]
    async fn generate(
        &self,
        system_prompt: &str,
        user_message: &str,
    ) -> Result<String, GeneratorError> {
        let request = GeminiRequest {
            system_instruction: GeminiContent {
                role: None,
                parts: [GeminiPart {
                    text: system_prompt,
                }],
            },
            contents: [GeminiContent {
                role: Some("user"),
                parts: [GeminiPart { text: user_message }],
            }],
            generation_config: GenerationConfig {
                temperature: TEMPERATURE,
                max_output_tokens: MAX_OUTPUT_TOKENS,
            },
        };

        debug!("Requesting advice from Gemini");

        let response = self
            .client
            .post(format!(
                "{}/models/{}:generateContent",
                self.base_url, self.model
            ))
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let body: GeminiResponse = serde_json::from_slice(&response.bytes().await?)?;
        let text: String = body
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect()
            })
            .unwrap_or_default();

        non_empty(&text)
    }

    fn name(&self) -> &str {
        "gemini"
    }
}
