//! Evaluation engine for completed agent runs
//!
//! Scores a finished [`RunState`](repoagent_core::RunState) across five
//! evidence-based metrics and combines them with fixed weights. All scores
//! are computed from the run state alone - no model calls - so evaluation
//! is deterministic and auditable. Every sub-score comes with the literal
//! point allocations that produced it.

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

mod evaluator;
mod metrics;

pub use evaluator::Evaluator;
pub use metrics::MetricScore;
