//! Completion-service client with retry, backoff, and timeout policy
//!
//! Wraps the Anthropic SDK behind the [`CompletionService`] trait. Rate
//! limits and transient outages are retried with capped exponential
//! backoff; authentication and malformed-request rejections are returned
//! immediately.

use async_trait::async_trait;
use repoagent_core::config::LlmConfig;
use repoagent_core::error::{truncate_for_error, Error, Result};
use repoagent_core::services::{CompletionRequest, CompletionResponse, CompletionService};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub struct LlmClient {
    client: Arc<claudius::Anthropic>,
    model: claudius::Model,
    config: LlmConfig,
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClient")
            .field("client", &"<Anthropic>")
            .field("model", &self.config.model)
            .finish()
    }
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let api_key = config
            .resolve_api_key()
            .ok_or_else(|| Error::config("API key not configured (set ANTHROPIC_API_KEY)"))?;

        let client = claudius::Anthropic::new(Some(api_key))
            .map_err(|e| Error::config(format!("Failed to create model client: {e}")))?;

        let model = claudius::Model::Custom(config.model.clone());

        Ok(Self {
            client: Arc::new(client),
            model,
            config,
        })
    }

    async fn send_once(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        let mut params = claudius::MessageCreateParams::simple(
            claudius::MessageParam::user(request.user.clone()),
            self.model.clone(),
        );
        params.max_tokens = request.max_tokens as _;
        params.temperature = Some(request.temperature);
        let params = if request.system.is_empty() {
            params
        } else {
            params.with_system_blocks(vec![claudius::TextBlock::new(request.system.clone())])
        };

        let response = self
            .client
            .send(params)
            .await
            .map_err(|e| classify_send_error(&format!("{e}")))?;

        let text = response
            .content
            .iter()
            .filter_map(|block| match block {
                claudius::ContentBlock::Text(text_block) => Some(text_block.text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        if text.is_empty() {
            return Err(Error::ModelMalformedResponse(
                "model returned no text content".to_string(),
            ));
        }

        Ok(CompletionResponse {
            text,
            model: self.config.model.clone(),
            tokens_used: None,
        })
    }
}

#[async_trait]
impl CompletionService for LlmClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let timeout = Duration::from_secs(self.config.request_timeout_secs);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let outcome = match tokio::time::timeout(timeout, self.send_once(&request)).await {
                Ok(result) => result,
                Err(_) => Err(Error::ModelUnavailable(format!(
                    "request timed out after {timeout:?}"
                ))),
            };

            match outcome {
                Ok(response) => {
                    debug!(
                        "Completion succeeded on attempt {attempt} ({} chars)",
                        response.text.len()
                    );
                    return Ok(response);
                }
                Err(e) if e.is_retryable() && attempt <= self.config.max_retries => {
                    let backoff_secs = (self.config.initial_backoff_secs
                        * 2u64.pow(attempt as u32 - 1))
                    .min(self.config.max_backoff_secs);
                    warn!(
                        "Model call failed ({e}); retrying in {backoff_secs}s (attempt {attempt}/{})",
                        self.config.max_retries
                    );
                    tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Map an SDK error message to the error taxonomy. Rate limits and server
/// outages are retryable; authentication and request-shape rejections are
/// not.
fn classify_send_error(message: &str) -> Error {
    let lower = message.to_lowercase();
    let truncated = truncate_for_error(message);

    if lower.contains("429") || lower.contains("rate limit") || lower.contains("rate_limit") {
        Error::ModelRateLimited(truncated)
    } else if lower.contains("401")
        || lower.contains("403")
        || lower.contains("authentication")
        || lower.contains("permission")
        || lower.contains("invalid_request")
        || lower.contains("400")
    {
        Error::Config(format!("model request rejected: {truncated}"))
    } else {
        Error::ModelUnavailable(truncated)
    }
}
