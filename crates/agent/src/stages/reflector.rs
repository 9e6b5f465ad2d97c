//! Reflector stage: self-critique state machine
//!
//! Assessments are transient per iteration: `Good` proceeds to generation,
//! `NeedsImprovement` and `NeedsMoreData` loop back to the planner while
//! the iteration budget allows, else they are forced forward so the run
//! terminates. A model failure during critique fails open as `Good` - the
//! run is never blocked on reflection.

use super::StageContext;
use crate::context::build_context;
use crate::parse::{parse_critique, ParsedVerdict};
use crate::prompts;
use repoagent_core::error::truncate_for_error;
use repoagent_core::services::CompletionRequest;
use repoagent_core::{Assessment, NextAction, RunState, StateDelta, TaskKind};
use tracing::{debug, info, warn};

const REFLECTION_MAX_TOKENS: u32 = 400;
const REFLECTION_TEMPERATURE: f32 = 0.3;

/// Evidence criteria the critique judges against, per task kind
fn criteria_for(kind: TaskKind) -> &'static str {
    match kind {
        TaskKind::AnalyzeRepo => {
            "- Concrete file paths and symbol names must back every claim.\n\
             - Tests must be cited by identifier and dependencies with versions.\n\
             - Vague hedging language (likely, probably, appears to) is a defect.\n\
             - Flag missing evidence as needs_more_data."
        }
        TaskKind::GenerateContent => {
            "- Claims about the project must match the gathered facts.\n\
             - The structure must fit a short social-style post.\n\
             - Invented numbers or features are defects."
        }
        _ => {
            "- The reasoning must actually address the task.\n\
             - Relevant gathered context must be used, not ignored.\n\
             - Unsupported claims are defects."
        }
    }
}

pub(crate) async fn reflect(ctx: &StageContext, state: &RunState) -> StateDelta {
    if state.skip_reflection {
        debug!("Reflection skipped for simple query");
        return StateDelta {
            reflection_notes: vec![
                "Reflection: skipped for simple query type".to_string()
            ],
            last_assessment: Some(Assessment::Good),
            next_action: Some(NextAction::Generate),
            ..Default::default()
        };
    }

    let context = build_context(state, &ctx.config.context, true);
    let request = CompletionRequest {
        system: prompts::format_prompt(
            prompts::REFLECTOR_SYSTEM,
            &[("criteria", criteria_for(state.task_kind))],
        ),
        user: prompts::format_prompt(prompts::REFLECTOR_USER, &[("context", &context)]),
        temperature: REFLECTION_TEMPERATURE,
        max_tokens: REFLECTION_MAX_TOKENS,
    };

    let (assessment, critique) = match ctx.llm.complete(request).await {
        Ok(response) => match parse_critique(&response.text) {
            ParsedVerdict::Parsed(verdict) => (verdict.assessment, verdict.critique),
            ParsedVerdict::Unparsed(raw) => {
                warn!("Unparseable critique; accepting current state");
                (Assessment::Good, truncate_for_error(&raw))
            }
        },
        Err(e) => {
            // Fail open: reflection must never block the run
            warn!("Model critique failed ({e}); accepting current state");
            (
                Assessment::Good,
                "accepted without critique (model unavailable)".to_string(),
            )
        }
    };

    let next_action = match assessment {
        Assessment::Good => NextAction::Generate,
        Assessment::NeedsImprovement | Assessment::NeedsMoreData => {
            if state.iteration < state.max_iterations {
                info!(
                    "Critique requested another pass ({:?}) at iteration {}/{}",
                    assessment, state.iteration, state.max_iterations
                );
                NextAction::Retry
            } else {
                info!("Iteration budget spent; forcing generation despite {assessment:?}");
                NextAction::Generate
            }
        }
    };

    StateDelta {
        reflection_notes: vec![format!(
            "Reflection (iteration {}): {} - {}",
            state.iteration,
            match assessment {
                Assessment::Good => "good",
                Assessment::NeedsImprovement => "needs_improvement",
                Assessment::NeedsMoreData => "needs_more_data",
            },
            critique
        )],
        last_assessment: Some(assessment),
        next_action: Some(next_action),
        ..Default::default()
    }
}
