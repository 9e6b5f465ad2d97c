//! Stage functions of the agent workflow
//!
//! Each stage consumes the shared run state plus the injected services and
//! returns a state delta. No stage mutates state directly, and none is
//! allowed to fail the run: model and tool errors degrade to best-effort
//! deltas inside the stage.

pub(crate) mod analyzer;
pub(crate) mod generator;
pub(crate) mod planner;
pub(crate) mod reasoner;
pub(crate) mod reflector;
pub(crate) mod retriever;

use crate::cache::AnalysisCache;
use repoagent_core::config::AgentConfig;
use repoagent_core::services::{CompletionService, RepoInspector, RetrievalService};
use std::sync::Arc;

/// Shared dependencies handed to every stage
pub(crate) struct StageContext {
    pub llm: Arc<dyn CompletionService>,
    pub retrieval: Arc<dyn RetrievalService>,
    pub inspector: Arc<dyn RepoInspector>,
    pub cache: Arc<AnalysisCache>,
    pub config: AgentConfig,
}
