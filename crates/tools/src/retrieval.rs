//! Retrieval-service clients
//!
//! The knowledge base itself is external; this module only speaks its wire
//! protocol. An empty passage list is a valid response everywhere.

use async_trait::async_trait;
use repoagent_core::config::RetrievalConfig;
use repoagent_core::error::{Error, Result};
use repoagent_core::facts::RetrievedPassage;
use repoagent_core::services::{RetrievalRequest, RetrievalResponse, RetrievalService};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    query: &'a str,
    top_k: usize,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    passages: Vec<WirePassage>,
}

#[derive(Debug, Deserialize)]
struct WirePassage {
    text: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    source: String,
}

/// JSON client for an external retrieval service
pub struct HttpRetrievalService {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpRetrievalService {
    pub fn new(config: &RetrievalConfig) -> Result<Self> {
        let endpoint = config
            .endpoint
            .clone()
            .ok_or_else(|| Error::config("retrieval.endpoint is not set"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| Error::retrieval(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl RetrievalService for HttpRetrievalService {
    async fn retrieve(&self, request: RetrievalRequest) -> Result<RetrievalResponse> {
        debug!(
            "Querying retrieval service for top {} passages",
            request.top_k
        );
        let response = self
            .client
            .post(&self.endpoint)
            .json(&WireRequest {
                query: &request.query,
                top_k: request.top_k,
            })
            .send()
            .await
            .map_err(|e| Error::retrieval(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::retrieval(format!(
                "retrieval service returned {status}"
            )));
        }

        let wire: WireResponse = response
            .json()
            .await
            .map_err(|e| Error::retrieval(format!("invalid response body: {e}")))?;

        let passages = wire
            .passages
            .into_iter()
            .take(request.top_k)
            .map(|p| RetrievedPassage {
                text: p.text,
                score: p.score,
                source: if p.source.is_empty() {
                    "knowledge_base".to_string()
                } else {
                    p.source
                },
            })
            .collect();

        Ok(RetrievalResponse { passages })
    }
}

/// Retrieval service used when no knowledge base is attached.
///
/// Always answers with an empty passage list, which downstream stages treat
/// as "nothing relevant found", not as an error.
pub struct NullRetrievalService;

#[async_trait]
impl RetrievalService for NullRetrievalService {
    async fn retrieve(&self, request: RetrievalRequest) -> Result<RetrievalResponse> {
        warn!(
            "No retrieval endpoint configured; returning empty result for '{}'",
            repoagent_core::error::truncate_for_error(&request.query)
        );
        Ok(RetrievalResponse { passages: vec![] })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_response_parses_with_defaults() {
        let json = r#"{"passages": [{"text": "Embeddings map text to vectors."}]}"#;
        let wire: WireResponse = serde_json::from_str(json).unwrap();
        assert_eq!(wire.passages.len(), 1);
        assert_eq!(wire.passages[0].score, 0.0);
        assert_eq!(wire.passages[0].source, "");
    }

    #[test]
    fn wire_response_parses_full_passages() {
        let json = r#"{
            "passages": [
                {"text": "chunk one", "score": 0.91, "source": "doc-17"},
                {"text": "chunk two", "score": 0.85, "source": "doc-3"}
            ]
        }"#;
        let wire: WireResponse = serde_json::from_str(json).unwrap();
        assert_eq!(wire.passages.len(), 2);
        assert!(wire.passages[0].score > wire.passages[1].score);
    }

    #[test]
    fn missing_endpoint_is_a_config_error() {
        let config = RetrievalConfig::default();
        assert!(HttpRetrievalService::new(&config).is_err());
    }

    #[tokio::test]
    async fn null_service_returns_empty_passages() {
        let response = NullRetrievalService
            .retrieve(RetrievalRequest {
                query: "what are embeddings?".into(),
                top_k: 3,
            })
            .await
            .unwrap();
        assert!(response.passages.is_empty());
    }
}
