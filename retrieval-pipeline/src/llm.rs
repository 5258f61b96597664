use std::sync::Arc;
use std::time::Duration;

use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestSystemMessage, ChatCompletionRequestUserMessage,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use serde::Deserialize;

use common::{
    error::AppError,
    utils::config::{AppConfig, LlmProvider},
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_OUTPUT_TOKENS: u32 = 500;
const TEMPERATURE: f32 = 0.1;

const DEFAULT_CLAUDE_MODEL: &str = "claude-3-haiku-20240307";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
const ANTHROPIC_MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";

/// System instruction for answer extraction. Part of the core contract,
/// identical across providers and not configurable through the public
/// interface.
pub const EXTRACTION_SYSTEM_PROMPT: &str = r#"You are an expert at extracting specific answers from text chunks.

Your task:
1. Read the text chunk carefully
2. Determine if it contains information that answers the user's query
3. If it does, extract the most precise answer
4. If it doesn't, indicate there's no relevant answer

Respond with a JSON object containing:
- "answer": The extracted answer (or empty string if no answer)
- "confidence": Float between 0.0-1.0 indicating your confidence
- "has_answer": Boolean indicating if chunk contains relevant answer
- "reasoning": Brief explanation of your decision

Guidelines:
- Be precise and concise in answers
- Only extract information actually present in the chunk
- Don't make assumptions or add external knowledge
- Confidence should reflect how directly the chunk answers the query"#;

pub fn extraction_user_message(query: &str, chunk: &str) -> String {
    format!("Query: {query}\n\nText Chunk:\n{chunk}\n\nExtract the answer from this chunk:")
}

/// Structured verdict for one `(query, chunk)` pair.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LlmResponse {
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub has_answer: bool,
    #[serde(default)]
    pub reasoning: String,
}

/// Parses the model's JSON payload. Parse failures degrade to a
/// no-answer verdict rather than an error; confidence is clamped to
/// [0, 1] either way.
pub fn parse_extraction_payload(content: &str) -> LlmResponse {
    match serde_json::from_str::<LlmResponse>(content) {
        Ok(mut response) => {
            response.confidence = response.confidence.clamp(0.0, 1.0);
            response
        }
        Err(err) => LlmResponse {
            answer: String::new(),
            confidence: 0.0,
            has_answer: false,
            reasoning: format!("Failed to parse LLM response: {err}"),
        },
    }
}

/// The one capability the answer extractor needs. Adding a provider means
/// adding an adaptor, not touching the extractor.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn extract_answer(&self, query: &str, chunk: &str) -> Result<LlmResponse, AppError>;
}

/// Builds the configured provider adaptor.
pub fn client_from_config(config: &AppConfig) -> Result<Arc<dyn LlmClient>, AppError> {
    match config.llm_provider {
        LlmProvider::Claude => {
            let api_key = config.anthropic_api_key.clone().ok_or_else(|| {
                AppError::InvalidInput("anthropic_api_key is required for the claude provider".into())
            })?;
            Ok(Arc::new(ClaudeClient::new(
                api_key,
                config.llm_model.clone(),
                config.anthropic_base_url.clone(),
            )))
        }
        LlmProvider::OpenAI => Ok(Arc::new(OpenAiClient::from_config(config))),
    }
}

/// Claude-style messages adaptor.
pub struct ClaudeClient {
    api_key: String,
    base_url: String,
    model: String,
    http: reqwest::Client,
}

impl ClaudeClient {
    pub fn new(api_key: String, model: Option<String>, base_url: Option<String>) -> Self {
        Self {
            api_key,
            base_url: base_url.unwrap_or_else(|| ANTHROPIC_MESSAGES_URL.to_string()),
            model: model.unwrap_or_else(|| DEFAULT_CLAUDE_MODEL.to_string()),
            http: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("reqwest client"),
        }
    }
}

#[async_trait]
impl LlmClient for ClaudeClient {
    async fn extract_answer(&self, query: &str, chunk: &str) -> Result<LlmResponse, AppError> {
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": MAX_OUTPUT_TOKENS,
            "temperature": TEMPERATURE,
            "system": EXTRACTION_SYSTEM_PROMPT,
            "messages": [
                { "role": "user", "content": extraction_user_message(query, chunk) }
            ],
        });

        let response = self
            .http
            .post(&self.base_url)
            .header("content-type", "application/json")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    AppError::Timeout(format!(
                        "extraction request exceeded {}s",
                        REQUEST_TIMEOUT.as_secs()
                    ))
                } else {
                    AppError::Llm(format!("Claude request failed: {err}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AppError::Llm(format!(
                "Claude API error (status {status}): {detail}"
            )));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|err| AppError::Llm(format!("unreadable Claude response: {err}")))?;

        let content = payload["content"][0]["text"]
            .as_str()
            .ok_or_else(|| AppError::Llm("no content returned from Claude".into()))?;

        Ok(parse_extraction_payload(content))
    }
}

/// OpenAI-style chat-completions adaptor.
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiClient {
    pub fn from_config(config: &AppConfig) -> Self {
        let client = Client::with_config(
            OpenAIConfig::new()
                .with_api_key(&config.openai_api_key)
                .with_api_base(&config.openai_base_url),
        );
        Self {
            client,
            model: config
                .llm_model
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn extract_answer(&self, query: &str, chunk: &str) -> Result<LlmResponse, AppError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .temperature(TEMPERATURE)
            .max_tokens(MAX_OUTPUT_TOKENS)
            .messages([
                ChatCompletionRequestSystemMessage::from(EXTRACTION_SYSTEM_PROMPT).into(),
                ChatCompletionRequestUserMessage::from(extraction_user_message(query, chunk))
                    .into(),
            ])
            .build()
            .map_err(|err| AppError::Llm(err.to_string()))?;

        let response = tokio::time::timeout(REQUEST_TIMEOUT, self.client.chat().create(request))
            .await
            .map_err(|_| {
                AppError::Timeout(format!(
                    "extraction request exceeded {}s",
                    REQUEST_TIMEOUT.as_secs()
                ))
            })?
            .map_err(|err| AppError::Llm(err.to_string()))?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.as_ref())
            .ok_or_else(|| AppError::Llm("no content in response".into()))?;

        Ok(parse_extraction_payload(content))
    }
}
