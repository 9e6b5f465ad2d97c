//! Run evaluator combining the five metrics

use crate::metrics;
use repoagent_core::evaluation::{weights, EvaluationResult};
use repoagent_core::RunState;
use std::collections::BTreeMap;
use tracing::debug;

/// Scores a completed run. Stateless; one instance can evaluate any number
/// of runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct Evaluator;

impl Evaluator {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate a finished run. Infallible: every metric is a pure function
    /// of the run state.
    pub fn evaluate(&self, state: &RunState) -> EvaluationResult {
        let task_completion = metrics::task_completion(state);
        let reasoning_quality = metrics::reasoning_quality(state);
        let tool_effectiveness = metrics::tool_effectiveness(state);
        let reflection_quality = metrics::reflection_quality(state);
        let output_quality = metrics::output_quality(state);

        let mut explanations = BTreeMap::new();
        explanations.insert("task_completion".to_string(), task_completion.notes);
        explanations.insert("reasoning_quality".to_string(), reasoning_quality.notes);
        explanations.insert("tool_effectiveness".to_string(), tool_effectiveness.notes);
        explanations.insert("reflection_quality".to_string(), reflection_quality.notes);
        explanations.insert("output_quality".to_string(), output_quality.notes);
        explanations.insert(
            "overall".to_string(),
            vec![
                format!(
                    "task_completion {:.1} x {}",
                    task_completion.score,
                    weights::TASK_COMPLETION
                ),
                format!(
                    "reasoning_quality {:.1} x {}",
                    reasoning_quality.score,
                    weights::REASONING_QUALITY
                ),
                format!(
                    "tool_effectiveness {:.1} x {}",
                    tool_effectiveness.score,
                    weights::TOOL_EFFECTIVENESS
                ),
                format!(
                    "reflection_quality {:.1} x {}",
                    reflection_quality.score,
                    weights::REFLECTION_QUALITY
                ),
                format!(
                    "output_quality {:.1} x {}",
                    output_quality.score,
                    weights::OUTPUT_QUALITY
                ),
            ],
        );

        let mut result = EvaluationResult {
            task_completion: task_completion.score,
            reasoning_quality: reasoning_quality.score,
            tool_effectiveness: tool_effectiveness.score,
            reflection_quality: reflection_quality.score,
            output_quality: output_quality.score,
            overall: 0.0,
            explanations,
        };
        result.overall = result.weighted_overall();

        debug!(
            "Evaluated run: overall {:.1} (completion {:.1}, reasoning {:.1}, tools {:.1}, reflection {:.1}, output {:.1})",
            result.overall,
            result.task_completion,
            result.reasoning_quality,
            result.tool_effectiveness,
            result.reflection_quality,
            result.output_quality,
        );
        result
    }
}
