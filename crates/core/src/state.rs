//! Run state threaded through the agent workflow
//!
//! A single [`RunState`] record flows through every stage of a run. Stages
//! never mutate it directly; they return a [`StateDelta`] that the
//! orchestrator applies. List fields are append-only: the evaluator depends
//! on the full history, so nothing is ever truncated within a run.

use crate::evaluation::EvaluationResult;
use crate::facts::{RetrievedPassage, StructuralFacts, ToolInvocation};
use serde::{Deserialize, Serialize};

/// Kind of task the agent was asked to perform, fixed at run creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    AnalyzeRepo,
    AnswerQuestion,
    GenerateContent,
    General,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AnalyzeRepo => "analyze_repo",
            Self::AnswerQuestion => "answer_question",
            Self::GenerateContent => "generate_content",
            Self::General => "general",
        }
    }
}

/// Routing decision written by the most recently executed stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextAction {
    Analyze,
    Retrieve,
    Reason,
    Reflect,
    Generate,
    Retry,
    Continue,
    Evaluate,
    End,
}

/// Transient per-iteration verdict from the reflector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Assessment {
    Good,
    NeedsImprovement,
    NeedsMoreData,
}

/// The single mutable record threaded through a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    pub task: String,
    pub task_kind: TaskKind,

    /// Incremented once per planner visit; never exceeds `max_iterations`
    pub iteration: u32,
    pub max_iterations: u32,

    /// Set once by the planner, never re-evaluated within a run
    pub skip_reasoning: bool,
    pub skip_reflection: bool,

    pub next_action: NextAction,

    pub structural_facts: Option<StructuralFacts>,
    pub retrieved_passages: Vec<RetrievedPassage>,

    pub reasoning_steps: Vec<String>,
    pub reflection_notes: Vec<String>,
    pub last_assessment: Option<Assessment>,

    /// Written only when the prior assessment requested regeneration
    pub draft_before_reflection: Option<String>,
    pub final_output: Option<String>,

    /// Append-only audit trail consumed by the evaluator
    pub tool_invocations: Vec<ToolInvocation>,

    pub is_complete: bool,
    pub scores: Option<EvaluationResult>,
}

impl RunState {
    /// Create the initial state for a task. All optional fields start empty
    /// and the planner runs first.
    pub fn new(task: impl Into<String>, task_kind: TaskKind, max_iterations: u32) -> Self {
        Self {
            task: task.into(),
            task_kind,
            iteration: 0,
            max_iterations,
            skip_reasoning: false,
            skip_reflection: false,
            next_action: NextAction::Reason,
            structural_facts: None,
            retrieved_passages: Vec::new(),
            reasoning_steps: Vec::new(),
            reflection_notes: Vec::new(),
            last_assessment: None,
            draft_before_reflection: None,
            final_output: None,
            tool_invocations: Vec::new(),
            is_complete: false,
            scores: None,
        }
    }

    /// Apply a stage delta. List fields append; scalar fields replace only
    /// when the delta carries a value.
    pub fn apply(&mut self, delta: StateDelta) {
        if delta.increment_iteration {
            self.iteration += 1;
        }
        if let Some(action) = delta.next_action {
            self.next_action = action;
        }
        if let Some(skip) = delta.skip_reasoning {
            self.skip_reasoning = skip;
        }
        if let Some(skip) = delta.skip_reflection {
            self.skip_reflection = skip;
        }
        if let Some(max) = delta.max_iterations {
            self.max_iterations = max;
        }
        if let Some(facts) = delta.structural_facts {
            self.structural_facts = Some(facts);
        }
        if let Some(passages) = delta.retrieved_passages {
            self.retrieved_passages = passages;
        }
        self.reasoning_steps.extend(delta.reasoning_steps);
        self.reflection_notes.extend(delta.reflection_notes);
        self.tool_invocations.extend(delta.tool_invocations);
        if let Some(assessment) = delta.last_assessment {
            self.last_assessment = Some(assessment);
        }
        if let Some(draft) = delta.draft_before_reflection {
            self.draft_before_reflection = Some(draft);
        }
        if let Some(output) = delta.final_output {
            self.final_output = Some(output);
        }
        if let Some(complete) = delta.is_complete {
            self.is_complete = complete;
        }
        if let Some(scores) = delta.scores {
            self.scores = Some(scores);
        }
    }

    /// Whether structural facts are already available (from a tool run or
    /// the analysis cache)
    pub fn has_facts(&self) -> bool {
        self.structural_facts
            .as_ref()
            .map(|f| !f.is_empty())
            .unwrap_or(false)
    }
}

/// Delta returned by a stage function, applied by the orchestrator
#[derive(Debug, Clone, Default)]
pub struct StateDelta {
    pub increment_iteration: bool,
    pub next_action: Option<NextAction>,
    pub skip_reasoning: Option<bool>,
    pub skip_reflection: Option<bool>,
    pub max_iterations: Option<u32>,
    pub structural_facts: Option<StructuralFacts>,
    pub retrieved_passages: Option<Vec<RetrievedPassage>>,
    pub reasoning_steps: Vec<String>,
    pub reflection_notes: Vec<String>,
    pub tool_invocations: Vec<ToolInvocation>,
    pub last_assessment: Option<Assessment>,
    pub draft_before_reflection: Option<String>,
    pub final_output: Option<String>,
    pub is_complete: Option<bool>,
    pub scores: Option<EvaluationResult>,
}

impl StateDelta {
    /// Delta that only routes to the next stage
    pub fn route(action: NextAction) -> Self {
        Self {
            next_action: Some(action),
            ..Default::default()
        }
    }
}
