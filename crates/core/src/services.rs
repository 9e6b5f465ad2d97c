//! Service trait definitions
//!
//! These traits define the seams between the orchestration engine and the
//! external services it consumes: the text-completion service, the
//! retrieval service, and the repository-introspection tools.
//! Implementations live in the `repoagent-tools` and `repoagent-agent`
//! crates; tests substitute mock implementations.

use crate::error::Result;
use crate::facts::{
    Dependency, DirectoryEntry, ModuleInfo, RetrievedPassage, SourceExcerpt, Symbol,
    VerificationOutputs,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Request to the text-completion service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Response from the text-completion service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub text: String,
    pub model: String,
    pub tokens_used: Option<u64>,
}

/// Trait for the language-model service.
///
/// Implementations own retry, backoff, and timeout policy; callers see a
/// single fallible request.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;
}

/// Request to the retrieval service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalRequest {
    pub query: String,
    pub top_k: usize,
}

/// Response from the retrieval service. An empty passage list is a valid
/// answer, not an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResponse {
    pub passages: Vec<RetrievedPassage>,
}

/// Trait for the knowledge-base retrieval service
#[async_trait]
pub trait RetrievalService: Send + Sync {
    async fn retrieve(&self, request: RetrievalRequest) -> Result<RetrievalResponse>;
}

/// Trait for the repository-introspection tools.
///
/// Each method is one black-box tool returning structured facts. The
/// analyzer invokes them in a fixed order; a failure of any one must not
/// block the others.
#[async_trait]
pub trait RepoInspector: Send + Sync {
    /// Path of the repository under inspection, used as the cache key
    fn repo_path(&self) -> &str;

    /// Content fingerprint of the repository (tracked file mtimes/sizes),
    /// used to invalidate cache entries when the repository changes
    async fn fingerprint(&self) -> Result<String>;

    async fn scan_structure(&self) -> Result<DirectoryEntry>;
    async fn read_sources(&self, max_files: usize) -> Result<Vec<SourceExcerpt>>;
    async fn extract_dependencies(&self) -> Result<Vec<Dependency>>;
    async fn map_modules(&self) -> Result<Vec<ModuleInfo>>;
    async fn extract_symbols(&self, max_files: usize) -> Result<Vec<Symbol>>;
    async fn run_verification(&self) -> Result<VerificationOutputs>;
}
