//! OpenAI-compatible chat completion client implementing both LLM
//! capabilities

use crate::config::LlmSettings;
use crate::prompt;
use crate::services::{
    MetadataExtractionService, RawScore, RelevanceScoringService, ScoringQuery, ServiceError,
};
use crate::{PipelineError, Result};
use async_trait::async_trait;
use enrich_core::{Chunk, MetadataFields};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    response_format: Value,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ScorePayload {
    relevance_score: f64,
    #[serde(default)]
    relevance_reason: Option<String>,
}

#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl OpenAiClient {
    pub fn new(settings: &LlmSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| PipelineError::Configuration(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: settings.api_key.clone(),
            base_url: settings.base_url.clone(),
            model: settings.model.clone(),
            timeout: settings.timeout,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(&LlmSettings::from_env()?)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// One chat completion in JSON mode, returning the parsed object
    async fn complete_json(
        &self,
        system: &str,
        user: &str,
    ) -> std::result::Result<Value, ServiceError> {
        let start = Instant::now();
        let request = ChatRequest {
            model: &self.model,
            temperature: 0.0,
            response_format: json!({ "type": "json_object" }),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, body));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::Schema(format!("unreadable completion: {e}")))?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ServiceError::Schema("completion has no content".into()))?;

        debug!(
            model = %self.model,
            duration_ms = start.elapsed().as_millis() as u64,
            "Chat completion"
        );

        let object = json_object(&content).ok_or_else(|| {
            ServiceError::Schema(format!("no JSON object in completion: {}", truncate(&content, 200)))
        })?;
        serde_json::from_str(object).map_err(|e| {
            ServiceError::Schema(format!("invalid JSON ({e}): {}", truncate(&content, 200)))
        })
    }

    fn transport_error(&self, e: reqwest::Error) -> ServiceError {
        if e.is_timeout() {
            ServiceError::Timeout(self.timeout)
        } else {
            ServiceError::Transient(e.to_string())
        }
    }
}

fn status_error(status: StatusCode, body: String) -> ServiceError {
    let detail = format!("HTTP {}: {}", status.as_u16(), truncate(&body, 300));
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ServiceError::Unauthorized(detail),
        StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT => ServiceError::Transient(detail),
        s if s.is_server_error() => ServiceError::Transient(detail),
        _ => ServiceError::Rejected(detail),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// The JSON object in a completion. JSON mode returns it bare, but some
/// compatible servers still wrap it in a code fence or a sentence.
fn json_object(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    (start < end).then(|| &content[start..=end])
}

#[async_trait]
impl MetadataExtractionService for OpenAiClient {
    #[instrument(skip_all, fields(chunk_id = %chunk.id))]
    async fn extract_metadata(
        &self,
        chunk: &Chunk,
    ) -> std::result::Result<MetadataFields, ServiceError> {
        let system = prompt::metadata_system_prompt();
        let user = prompt::metadata_user_prompt(chunk);
        let value = self.complete_json(&system, &user).await?;

        serde_json::from_value(value).map_err(|e| ServiceError::Schema(e.to_string()))
    }
}

#[async_trait]
impl RelevanceScoringService for OpenAiClient {
    #[instrument(skip_all, fields(chunk_id = %chunk.id, question_id = query.question_id))]
    async fn score(
        &self,
        chunk: &Chunk,
        query: &ScoringQuery,
    ) -> std::result::Result<RawScore, ServiceError> {
        let user = prompt::scoring_user_prompt(chunk, query);
        let value = self
            .complete_json(prompt::scoring_system_prompt(), &user)
            .await?;

        let payload: ScorePayload =
            serde_json::from_value(value).map_err(|e| ServiceError::Schema(e.to_string()))?;
        Ok(RawScore::new(
            payload.relevance_score,
            payload.relevance_reason.unwrap_or_default(),
        ))
    }
}
