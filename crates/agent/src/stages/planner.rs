//! Planner stage: task classification and first-branch routing
//!
//! Pure function of the run state; never calls a service and never fails.
//! The skip flags and the iteration budget are decided on the first visit
//! only and left untouched on retry passes.

use repoagent_core::{NextAction, RunState, StateDelta, TaskKind};
use tracing::debug;

/// Iteration budget per task kind. Only repository analysis benefits from
/// the expensive reflect-regenerate loop; everything else gets one pass.
const MAX_ITERATIONS_ANALYZE: u32 = 3;
const MAX_ITERATIONS_DEFAULT: u32 = 1;

/// Keywords marking a code-specific question
const CODE_KEYWORDS: &[&str] = &[
    "where",
    "which file",
    "which class",
    "which function",
    "how is",
    "show me",
    "find",
    "locate",
    "used in",
    "in which",
    "implemented",
    "code",
    "function",
    "class",
    "import",
];

const GREETINGS: &[&str] = &[
    "hi",
    "hello",
    "hey",
    "thanks",
    "thank you",
    "good morning",
    "good evening",
];

fn is_code_question(task_lower: &str) -> bool {
    CODE_KEYWORDS.iter().any(|kw| task_lower.contains(kw))
}

/// Whether the knowledge base rather than the repository should answer the
/// question
fn references_knowledge_base(task_lower: &str) -> bool {
    !is_code_question(task_lower)
}

fn is_arithmetic(task: &str) -> bool {
    let trimmed = task.trim();
    !trimmed.is_empty()
        && trimmed.chars().any(|c| c.is_ascii_digit())
        && trimmed
            .chars()
            .all(|c| c.is_ascii_digit() || " +-*/().=?".contains(c))
}

fn is_greeting(task_lower: &str) -> bool {
    let trimmed = task_lower.trim().trim_end_matches(['!', '.', '?']);
    GREETINGS.contains(&trimmed)
}

/// Trivial tasks skip both reasoning and reflection: short arithmetic,
/// greetings, and very short factual questions.
fn is_trivial(task: &str, task_lower: &str) -> bool {
    if is_arithmetic(task) || is_greeting(task_lower) {
        return true;
    }
    let word_count = task.split_whitespace().count();
    task.trim_end().ends_with('?') && word_count <= 6 && !is_code_question(task_lower)
}

/// Classify the task and decide the first branch
pub(crate) fn plan(state: &RunState) -> StateDelta {
    let task_lower = state.task.to_lowercase();
    let code_specific = is_code_question(&task_lower);
    let first_visit = state.iteration == 0;

    let (next_action, plan_note) = match state.task_kind {
        TaskKind::AnalyzeRepo => (NextAction::Analyze, "repository analysis requested"),
        TaskKind::AnswerQuestion => {
            if references_knowledge_base(&task_lower) {
                (NextAction::Retrieve, "knowledge-base retrieval required")
            } else if state.has_facts() {
                (NextAction::Reason, "code question with facts on hand")
            } else {
                (NextAction::Analyze, "code question without repository facts")
            }
        }
        TaskKind::GenerateContent => {
            if state.has_facts() {
                (NextAction::Reason, "content generation from cached facts")
            } else {
                (NextAction::Analyze, "content generation needs repository facts")
            }
        }
        TaskKind::General => {
            if code_specific && !state.has_facts() {
                (NextAction::Analyze, "code-specific question detected")
            } else {
                (NextAction::Reason, "direct reasoning")
            }
        }
    };

    let mut delta = StateDelta {
        increment_iteration: true,
        next_action: Some(next_action),
        reasoning_steps: vec![format!(
            "Planning: {plan_note} -> next action: {next_action:?}"
        )],
        ..Default::default()
    };

    // Skip flags and the iteration budget are set once per run
    if first_visit {
        let (skip_reasoning, skip_reflection) = match state.task_kind {
            TaskKind::AnalyzeRepo => (false, false),
            _ if is_trivial(&state.task, &task_lower) => (true, true),
            TaskKind::AnswerQuestion => (false, true),
            _ if code_specific => (false, true),
            _ => (false, false),
        };
        delta.skip_reasoning = Some(skip_reasoning);
        delta.skip_reflection = Some(skip_reflection);
        delta.max_iterations = Some(if state.task_kind == TaskKind::AnalyzeRepo {
            MAX_ITERATIONS_ANALYZE
        } else {
            MAX_ITERATIONS_DEFAULT
        });
        debug!(
            "Planned task kind {:?}: next {next_action:?}, skip_reasoning={skip_reasoning}, skip_reflection={skip_reflection}",
            state.task_kind
        );
    }

    delta
}
