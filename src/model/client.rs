use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use super::types::{CompletionRequest, CompletionResponse, Message};
use crate::config::{ModelConfig, RequestConfig};
use crate::error::{ModelError, ModelResult};

/// Black-box text completion service consumed by the workflow stages.
///
/// The pipeline only needs "messages in, text out"; putting that behind a
/// trait keeps the orchestrator testable without a live endpoint.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    /// Run one completion and return the raw generated text.
    async fn complete(&self, messages: Vec<Message>) -> ModelResult<String>;
}

/// Client for an OpenAI-compatible chat completion endpoint
#[derive(Clone)]
pub struct ModelClient {
    client: Client,
    base_url: String,
    api_key: String,
    model_name: String,
    temperature: f64,
    max_tokens: u32,
    timeout_ms: u64,
}

impl ModelClient {
    /// Create a new model client
    pub fn new(config: &ModelConfig, request_config: RequestConfig) -> ModelResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(request_config.timeout_ms))
            .build()
            .map_err(ModelError::Http)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model_name: config.model_name.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout_ms: request_config.timeout_ms,
        })
    }

    /// Get the base URL (for testing)
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn execute_request(&self, request: &CompletionRequest) -> ModelResult<String> {
        let url = format!("{}/chat/completions", self.base_url);

        debug!(
            model = %request.model,
            messages = request.messages.len(),
            "Calling completion endpoint"
        );

        let mut builder = self.client.post(&url).json(request);
        if !self.api_key.is_empty() {
            builder = builder.header("Authorization", format!("Bearer {}", self.api_key));
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ModelError::Timeout {
                    timeout_ms: self.timeout_ms,
                }
            } else {
                ModelError::Http(e)
            }
        })?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(ModelError::Api {
                status: status.as_u16(),
                message: error_body,
            });
        }

        let completion: CompletionResponse =
            response
                .json()
                .await
                .map_err(|e| ModelError::InvalidResponse {
                    message: format!("Failed to parse response: {}", e),
                })?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ModelError::InvalidResponse {
                message: "Response contained no choices".to_string(),
            })
    }
}

#[async_trait]
impl CompletionModel for ModelClient {
    // Deliberately no retry loop here: a transport failure aborts the
    // question's pipeline and is surfaced as a degraded output record.
    async fn complete(&self, messages: Vec<Message>) -> ModelResult<String> {
        let request = CompletionRequest::new(&self.model_name, messages)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);

        let start = Instant::now();
        match self.execute_request(&request).await {
            Ok(text) => {
                info!(
                    model = %self.model_name,
                    latency_ms = start.elapsed().as_millis() as u64,
                    completion_len = text.len(),
                    "Completion succeeded"
                );
                Ok(text)
            }
            Err(e) => {
                error!(
                    model = %self.model_name,
                    error = %e,
                    latency_ms = start.elapsed().as_millis() as u64,
                    "Completion failed"
                );
                Err(e)
            }
        }
    }
}
