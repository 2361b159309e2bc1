use crate::config::ConnectionConfig;
use crate::core::error::{AppError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingParams {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl SamplingParams {
    pub const fn new(temperature: f32, max_tokens: u32) -> Self {
        Self {
            temperature,
            max_tokens,
        }
    }
}

/// Anything that can answer a chat completion request.
///
/// One call, one round-trip. Implementations never retry.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn chat(&self, messages: &[ChatMessage], params: SamplingParams) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Client for an Azure OpenAI chat-completions deployment.
pub struct CompletionClient {
    client: Client,
    config: ConnectionConfig,
}

impl CompletionClient {
    /// Build a client. Fails with `NotConfigured` unless endpoint and key are both set.
    pub fn new(config: ConnectionConfig, timeout: Duration) -> Result<Self> {
        if !config.has_credentials() {
            return Err(AppError::NotConfigured(
                "endpoint and API key are required".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Request(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.config.endpoint.trim().trim_end_matches('/'),
            self.config.deployment.trim(),
            self.config.api_version.trim()
        )
    }
}

#[async_trait]
impl CompletionBackend for CompletionClient {
    async fn chat(&self, messages: &[ChatMessage], params: SamplingParams) -> Result<String> {
        if self.config.deployment.trim().is_empty() {
            return Err(AppError::NotConfigured("deployment name is not set".to_string()));
        }

        let request = ChatRequest {
            messages,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
        };

        tracing::debug!(
            "[CompletionClient] Sending {} messages to deployment '{}' (temperature {}, max_tokens {})",
            messages.len(),
            self.config.deployment,
            params.temperature,
            params.max_tokens
        );

        let response = self
            .client
            .post(self.completions_url())
            .header("api-key", &self.config.api_key)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!("[CompletionClient] HTTP request failed: {}", e);
                AppError::Request(format!("HTTP request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::warn!(
                "[CompletionClient] API returned error status {}: {}",
                status,
                error_text
            );
            return Err(AppError::Request(format!("API error {}: {}", status, error_text)));
        }

        let chat_response = response.json::<ChatResponse>().await.map_err(|e| {
            tracing::warn!("[CompletionClient] Failed to decode response body: {}", e);
            AppError::Request(format!("Response decode error: {}", e))
        })?;

        Ok(chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }
}
