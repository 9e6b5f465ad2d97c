//! Configuration for the repoagent system
//!
//! Configuration is loaded from an optional TOML file with every section
//! falling back to defaults, so a missing file is never an error.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Language-model client settings
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    pub max_retries: usize,
    /// First backoff delay; doubles per attempt up to `max_backoff_secs`
    pub initial_backoff_secs: u64,
    pub max_backoff_secs: u64,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "claude-sonnet-4-5".to_string(),
            temperature: 0.7,
            max_tokens: 2000,
            request_timeout_secs: 120,
            max_retries: 3,
            initial_backoff_secs: 2,
            max_backoff_secs: 60,
        }
    }
}

impl LlmConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
    }
}

/// Bounds applied when folding state into prompt context
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    pub max_source_files: usize,
    pub max_dependencies: usize,
    pub max_modules: usize,
    pub max_symbols: usize,
    pub max_passage_chars: usize,
    pub max_excerpt_chars: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_source_files: 3,
            max_dependencies: 20,
            max_modules: 12,
            max_symbols: 20,
            max_passage_chars: 1200,
            max_excerpt_chars: 800,
        }
    }
}

/// Retrieval service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Endpoint of the retrieval service; `None` means no knowledge base is
    /// attached and retrieval yields an empty result set
    pub endpoint: Option<String>,
    pub top_k: usize,
    pub request_timeout_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            top_k: 3,
            request_timeout_secs: 30,
        }
    }
}

/// Repository-analysis tool settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub max_source_files: usize,
    pub max_symbol_files: usize,
    pub max_scan_depth: usize,
    /// Timeout for each verification subprocess
    pub verification_timeout_secs: u64,
    /// Command used to collect tests, split on whitespace; empty disables
    /// verification commands
    pub test_collection_command: Vec<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_source_files: 20,
            max_symbol_files: 50,
            max_scan_depth: 3,
            verification_timeout_secs: 60,
            test_collection_command: vec![],
        }
    }
}

/// Analysis-cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Directory for on-disk snapshots; `None` keeps the cache in memory
    pub dir: Option<std::path::PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
        }
    }
}

/// Top-level configuration container
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub llm: LlmConfig,
    pub context: ContextConfig,
    pub retrieval: RetrievalConfig,
    pub analysis: AnalysisConfig,
    pub cache: CacheConfig,
}

impl AgentConfig {
    /// Load configuration from a TOML file; a missing path yields defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => {
                let raw = std::fs::read_to_string(p)?;
                toml::from_str(&raw)
                    .map_err(|e| Error::config(format!("failed to parse {}: {e}", p.display())))
            }
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.llm.temperature) {
            return Err(Error::config("llm.temperature must be between 0.0 and 1.0"));
        }
        if self.llm.max_tokens == 0 {
            return Err(Error::config("llm.max_tokens must be positive"));
        }
        if self.retrieval.top_k == 0 {
            return Err(Error::config("retrieval.top_k must be positive"));
        }
        Ok(())
    }
}
