//! Orchestration engine for the autonomous repository agent
//!
//! This crate drives a task through a directed-graph workflow:
//! plan -> {analyze | retrieve | nothing} -> reason -> reflect ->
//! (loop back | generate) -> evaluate. The engine owns the run state, the
//! routing table, the reflection/regeneration loop, and the iteration
//! bound; the language model, the retrieval service, and the repository
//! tools are consumed through the traits in `repoagent-core`.
//!
//! # Public API
//!
//! ## Main Entry Point
//! - [`Orchestrator`] - owns the state and drives the stage sequence
//!
//! ## Supporting types
//! - [`AnalysisCache`] - cross-run cache of structural facts
//! - [`LlmClient`] - completion-service client with retry/backoff
//! - [`RoutingTable`], [`StageId`] - the workflow graph as data
//!
//! All stage implementations, prompt templates, and response parsing are
//! private.

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

mod cache;
mod context;
mod llm;
mod orchestrator;
mod parse;
mod prompts;
mod router;
mod stages;

pub use cache::AnalysisCache;
pub use llm::LlmClient;
pub use orchestrator::Orchestrator;
pub use router::{RoutingTable, StageId};
