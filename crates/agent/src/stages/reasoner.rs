//! Reasoner stage: chain-of-thought over the gathered context
//!
//! Trivial tasks bypass the model entirely with a single synthetic step -
//! the primary token optimization. Otherwise the model is asked for 3-5
//! ordered steps; a malformed response degrades to a single generic step
//! and a model failure to a fixed fallback pair. The stage never fails the
//! run.

use super::StageContext;
use crate::context::build_context;
use crate::parse::{parse_reasoning_steps, ParsedSteps};
use crate::prompts;
use repoagent_core::error::truncate_for_error;
use repoagent_core::services::CompletionRequest;
use repoagent_core::{NextAction, RunState, StateDelta};
use tracing::{debug, warn};

const MAX_STEPS: usize = 5;
const REASONING_MAX_TOKENS: u32 = 500;

pub(crate) async fn reason(ctx: &StageContext, state: &RunState) -> StateDelta {
    if state.skip_reasoning {
        debug!("Reasoning bypassed for trivial task");
        return StateDelta {
            reasoning_steps: vec![
                "Reasoning: bypassed for efficiency (trivial task)".to_string()
            ],
            next_action: Some(NextAction::Reflect),
            ..Default::default()
        };
    }

    let context = build_context(state, &ctx.config.context, false);
    let request = CompletionRequest {
        system: prompts::REASONER_SYSTEM.to_string(),
        user: prompts::format_prompt(prompts::REASONER_USER, &[("context", &context)]),
        temperature: ctx.config.llm.temperature,
        max_tokens: REASONING_MAX_TOKENS,
    };

    let steps = match ctx.llm.complete(request).await {
        Ok(response) => match parse_reasoning_steps(&response.text) {
            ParsedSteps::Parsed(steps) => {
                debug!("Model produced {} reasoning steps", steps.len());
                steps
                    .into_iter()
                    .take(MAX_STEPS)
                    .map(|s| format!("Reasoning: {s}"))
                    .collect()
            }
            ParsedSteps::Unparsed(raw) => {
                warn!("Unparseable reasoning response; degrading to one step");
                vec![format!("Reasoning: {}", truncate_for_error(&raw))]
            }
        },
        Err(e) => {
            warn!("Model reasoning failed ({e}); using fallback steps");
            vec![
                "Reasoning: analyzing available information".to_string(),
                "Reasoning: formulating response".to_string(),
            ]
        }
    };

    StateDelta {
        reasoning_steps: steps,
        next_action: Some(NextAction::Reflect),
        ..Default::default()
    }
}
