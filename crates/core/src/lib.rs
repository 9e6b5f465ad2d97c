//! Core types and traits for the repoagent orchestration engine
//!
//! This crate provides the foundational abstractions used throughout the
//! repoagent workspace:
//!
//! - **State**: the `RunState` record threaded through every stage of a run
//! - **Facts**: structural facts extracted from a repository by tools
//! - **Services**: traits for the completion, retrieval, and inspection
//!   services the engine consumes as black boxes
//! - **Evaluation**: the scored result produced at the end of a run
//! - **Configuration**: system configuration management
//! - **Error handling**: unified error types

pub mod config;
pub mod error;
pub mod evaluation;
pub mod facts;
pub mod services;
pub mod state;

// Re-export main types for convenience
pub use config::{AgentConfig, AnalysisConfig, CacheConfig, ContextConfig, LlmConfig, RetrievalConfig};
pub use error::{Error, Result};
pub use evaluation::{weights, EvaluationResult};
pub use facts::{
    Dependency, DirectoryEntry, ModuleInfo, RetrievedPassage, SourceExcerpt, StructuralFacts,
    Symbol, SymbolKind, ToolInvocation, VerificationOutputs,
};
pub use services::{
    CompletionRequest, CompletionResponse, CompletionService, RepoInspector, RetrievalRequest,
    RetrievalResponse, RetrievalService,
};
pub use state::{Assessment, NextAction, RunState, StateDelta, TaskKind};

/// Version of the core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
