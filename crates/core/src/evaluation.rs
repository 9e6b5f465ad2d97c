//! Evaluation result model
//!
//! The evaluator produces five sub-scores and a weighted overall score.
//! The weights are fixed; `explanations` records the literal point
//! allocations behind every sub-score so the scoring is auditable.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fixed metric weights for the overall score
pub mod weights {
    pub const TASK_COMPLETION: f64 = 0.35;
    pub const REASONING_QUALITY: f64 = 0.25;
    pub const TOOL_EFFECTIVENESS: f64 = 0.15;
    pub const REFLECTION_QUALITY: f64 = 0.10;
    pub const OUTPUT_QUALITY: f64 = 0.15;
}

/// Scored result of one run, all values in [0, 100]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub task_completion: f64,
    pub reasoning_quality: f64,
    pub tool_effectiveness: f64,
    pub reflection_quality: f64,
    pub output_quality: f64,
    pub overall: f64,
    /// Per-metric point-allocation lines that produced each sub-score
    pub explanations: BTreeMap<String, Vec<String>>,
}

impl EvaluationResult {
    /// Recompute the weighted overall from the sub-scores, clamped to
    /// [0, 100]. Changing any sub-score moves the overall monotonically in
    /// the same direction.
    pub fn weighted_overall(&self) -> f64 {
        let sum = self.task_completion * weights::TASK_COMPLETION
            + self.reasoning_quality * weights::REASONING_QUALITY
            + self.tool_effectiveness * weights::TOOL_EFFECTIVENESS
            + self.reflection_quality * weights::REFLECTION_QUALITY
            + self.output_quality * weights::OUTPUT_QUALITY;
        sum.clamp(0.0, 100.0)
    }
}
