//! Chat-completion client used to score receipts.

use std::time::Duration;

use axum::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::LlmConfig;

/// Prompt sent for every receipt. `{receipt}` is replaced by the OCR text.
pub const SCORE_PROMPT: &str = r#"You are rating the carbon footprint of a shopping receipt.

Read the receipt text below, taking into account the store and every item bought. Compute a carbon footprint score from 0 to 100, where 0 is terrible and 100 is carbon neutral.

In the summary, estimate the kilograms of carbon emissions saved or wasted by this purchase and give a specific reason for the score (for example: too much red meat, not enough organic produce, with quantities).

In the recommendations, write two sentences on how the shopper could lower their footprint and raise their score. Be specific.

Receipt text:
{receipt}

Respond with ONLY a JSON object, no markdown and no commentary, in exactly this shape:
{"score": <number 0-100>, "scoreSummary": "<summary>", "recommendations": "<recommendations>"}"#;

pub fn build_prompt(receipt_text: &str) -> String {
    SCORE_PROMPT.replace("{receipt}", receipt_text.trim())
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Sends one prompt and returns the first choice's message content.
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
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
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

/// OpenAI-compatible `/chat/completions` client.
pub struct OpenAiClient {
    config: LlmConfig,
    client: Client,
}

impl OpenAiClient {
    pub fn new(config: LlmConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let resp = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Connection(e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimited);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let chat: ChatResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;
        debug!(choices = chat.choices.len(), model = %self.config.model, "completion received");

        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::Parse("response has no message content".into()))
    }
}

/// Errors that can occur while talking to the completion endpoint.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("rate limited")]
    RateLimited,
    #[error("API error: HTTP {status}: {body}")]
    Api { status: u16, body: String },
    #[error("parse error: {0}")]
    Parse(String),
}
