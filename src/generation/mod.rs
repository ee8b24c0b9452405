//! Chat completions against a local Ollama runtime.
//!
//! This is the boundary to the text-generation collaborator: it sends messages and returns the
//! generated text. Prompt construction belongs to callers. Every call goes through the shared
//! [`RetryPolicy`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::OllamaConfig;
use crate::http::{build_client, format_endpoint, normalize_base_url};
use crate::retry::{RetryFailure, RetryPolicy, send_with_retry};

/// Errors surfaced while talking to the generation service.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Service unreachable or still failing after retries.
    #[error("Generation service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Service rejected the request (4xx).
    #[error("Generation request rejected ({status}): {body}")]
    Rejected {
        /// Status returned by Ollama.
        status: reqwest::StatusCode,
        /// Response body.
        body: String,
    },
    /// Response body could not be decoded.
    #[error("Malformed generation response: {0}")]
    InvalidResponse(String),
    /// Base URL or HTTP client could not be set up.
    #[error("Invalid generation configuration: {0}")]
    Configuration(String),
}

impl From<RetryFailure> for GenerationError {
    fn from(failure: RetryFailure) -> Self {
        match failure {
            RetryFailure::Status { status, body } if status.is_client_error() => {
                Self::Rejected { status, body }
            }
            other => Self::ServiceUnavailable(other.to_string()),
        }
    }
}

/// Speaker of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions framing the conversation.
    System,
    /// Caller input.
    User,
    /// Model output.
    Assistant,
}

/// One message of a chat exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who is speaking.
    pub role: Role,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// Build a message.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Per-call overrides; unset fields fall back to the configured defaults.
#[derive(Debug, Clone, Default)]
pub struct GenerationOptions {
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Maximum generated tokens (`num_predict`).
    pub max_tokens: Option<u32>,
    /// Stop sequences.
    pub stop: Vec<String>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    options: ChatOptions<'a>,
    stream: bool,
}

#[derive(Serialize)]
struct ChatOptions<'a> {
    temperature: f32,
    num_predict: u32,
    #[serde(skip_serializing_if = "no_stop_sequences")]
    stop: &'a [String],
}

fn no_stop_sequences(stop: &&[String]) -> bool {
    stop.is_empty()
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Deserialize)]
struct ModelTag {
    name: String,
}

/// Ollama `/api/chat` client.
#[derive(Debug, Clone)]
pub struct OllamaGenerationClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    retry: RetryPolicy,
}

impl OllamaGenerationClient {
    /// Build a client from the Ollama settings.
    pub fn from_config(config: &OllamaConfig) -> Result<Self, GenerationError> {
        let base_url =
            normalize_base_url(&config.base_url).map_err(GenerationError::Configuration)?;
        let http = build_client(Some(config.timeout))
            .map_err(|err| GenerationError::Configuration(err.to_string()))?;
        Ok(Self {
            http,
            base_url,
            model: config.generation_model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            retry: config.retry,
        })
    }

    /// Model used for completions.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send `messages` and return the assistant reply.
    pub async fn chat(
        &self,
        messages: &[ChatMessage],
        options: &GenerationOptions,
    ) -> Result<String, GenerationError> {
        let body = ChatRequest {
            model: &self.model,
            messages,
            options: ChatOptions {
                temperature: options.temperature.unwrap_or(self.temperature),
                num_predict: options.max_tokens.unwrap_or(self.max_tokens),
                stop: &options.stop,
            },
            stream: false,
        };
        let endpoint = format_endpoint(&self.base_url, "api/chat");

        let response = send_with_retry(&self.retry, "ollama.chat", || {
            self.http.post(&endpoint).json(&body)
        })
        .await?;

        let payload: ChatResponse = response
            .json()
            .await
            .map_err(|err| GenerationError::InvalidResponse(err.to_string()))?;
        tracing::debug!(
            model = %self.model,
            messages = messages.len(),
            chars = payload.message.content.chars().count(),
            "Chat completion received"
        );
        Ok(payload.message.content)
    }

    /// Single-turn completion with an optional system prompt.
    pub async fn generate(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        options: &GenerationOptions,
    ) -> Result<String, GenerationError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system_prompt {
            messages.push(ChatMessage::new(Role::System, system));
        }
        messages.push(ChatMessage::new(Role::User, prompt));
        self.chat(&messages, options).await
    }

    /// Names of the models installed in the runtime.
    pub async fn list_models(&self) -> Result<Vec<String>, GenerationError> {
        let endpoint = format_endpoint(&self.base_url, "api/tags");
        let response =
            send_with_retry(&self.retry, "ollama.tags", || self.http.get(&endpoint)).await?;
        let payload: TagsResponse = response
            .json()
            .await
            .map_err(|err| GenerationError::InvalidResponse(err.to_string()))?;
        Ok(payload.models.into_iter().map(|model| model.name).collect())
    }

    /// Whether the runtime answers the model listing endpoint.
    pub async fn check_health(&self) -> bool {
        match self.list_models().await {
            Ok(models) => {
                tracing::info!(models = models.len(), "Ollama service is healthy");
                true
            }
            Err(error) => {
                tracing::error!(error = %error, "Ollama service health check failed");
                false
            }
        }
    }
}
