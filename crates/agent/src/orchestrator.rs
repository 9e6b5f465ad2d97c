//! Run orchestrator
//!
//! Owns the run state, the routing table, and the iteration loop. Stage
//! functions are invoked in graph order; their deltas are applied to the
//! state and the routing table picks the next stage. Termination is
//! guaranteed: the iteration bound forces progress to the generator, a
//! failing stage is replaced by a minimal synthetic delta, and
//! cancellation unwinds through the deterministic fallback so the caller
//! always receives `final_output` and `scores`.

use crate::cache::AnalysisCache;
use crate::router::{RoutingTable, StageId};
use crate::stages::{self, StageContext};
use repoagent_core::config::AgentConfig;
use repoagent_core::error::{Error, Result};
use repoagent_core::services::{CompletionService, RepoInspector, RetrievalService};
use repoagent_core::{Assessment, NextAction, RunState, StateDelta, TaskKind};
use repoagent_evaluation::Evaluator;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Default iteration ceiling before the planner applies its per-kind budget
const DEFAULT_MAX_ITERATIONS: u32 = 10;

pub struct Orchestrator {
    ctx: StageContext,
    router: RoutingTable,
    evaluator: Evaluator,
}

impl Orchestrator {
    pub fn new(
        llm: Arc<dyn CompletionService>,
        retrieval: Arc<dyn RetrievalService>,
        inspector: Arc<dyn RepoInspector>,
        cache: Arc<AnalysisCache>,
        config: AgentConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            ctx: StageContext {
                llm,
                retrieval,
                inspector,
                cache,
                config,
            },
            router: RoutingTable::standard(),
            evaluator: Evaluator::new(),
        })
    }

    /// Run a task to completion. The planner replaces the default
    /// iteration ceiling with its per-kind budget on the first visit.
    pub async fn run(&self, task: impl Into<String>, task_kind: TaskKind) -> RunState {
        self.run_with_budget(task, task_kind, DEFAULT_MAX_ITERATIONS)
            .await
    }

    /// Run with an explicit iteration ceiling (still subject to the
    /// planner's per-kind budget on the first visit)
    pub async fn run_with_budget(
        &self,
        task: impl Into<String>,
        task_kind: TaskKind,
        max_iterations: u32,
    ) -> RunState {
        let state = RunState::new(task, task_kind, max_iterations);
        self.drive(state, None).await
    }

    /// Run with an external cancellation signal. Setting the watched value
    /// to `true` aborts the current suspended call; the run unwinds
    /// through the generator fallback and still returns output and scores.
    pub async fn run_cancellable(
        &self,
        task: impl Into<String>,
        task_kind: TaskKind,
        cancel: watch::Receiver<bool>,
    ) -> RunState {
        let state = RunState::new(task, task_kind, DEFAULT_MAX_ITERATIONS);
        self.drive(state, Some(cancel)).await
    }

    async fn drive(&self, mut state: RunState, cancel: Option<watch::Receiver<bool>>) -> RunState {
        let mut stage = StageId::Planner;
        info!(
            "Starting run: kind={:?} task={:?}",
            state.task_kind, state.task
        );

        loop {
            debug!("Executing stage {stage:?} (iteration {})", state.iteration);
            let delta = match self.execute(stage, &state, cancel.clone()).await {
                Ok(delta) => delta,
                Err(Error::Cancelled) => {
                    warn!("Run cancelled at stage {stage:?}; unwinding to fallback output");
                    return self.unwind_cancelled(state);
                }
                Err(e) => {
                    warn!("Stage {stage:?} failed ({e}); substituting synthetic delta");
                    self.synthetic_delta(stage, &state, &e)
                }
            };
            state.apply(delta);

            if stage == StageId::Evaluator {
                break;
            }
            stage = self.router.next(
                stage,
                state.next_action,
                state.iteration,
                state.max_iterations,
            );
            if stage == StageId::End {
                break;
            }
        }

        info!(
            "Run complete: iterations={} overall={:?}",
            state.iteration,
            state.scores.as_ref().map(|s| s.overall)
        );
        state
    }

    async fn execute(
        &self,
        stage: StageId,
        state: &RunState,
        cancel: Option<watch::Receiver<bool>>,
    ) -> Result<StateDelta> {
        match cancel {
            Some(mut rx) => {
                if *rx.borrow() {
                    return Err(Error::Cancelled);
                }
                tokio::select! {
                    delta = self.execute_stage(stage, state) => Ok(delta),
                    _ = cancelled(&mut rx) => Err(Error::Cancelled),
                }
            }
            None => Ok(self.execute_stage(stage, state).await),
        }
    }

    /// Dispatch one stage. Stages absorb their own service failures; the
    /// only error that escapes this level is cancellation.
    async fn execute_stage(&self, stage: StageId, state: &RunState) -> StateDelta {
        match stage {
            StageId::Planner => stages::planner::plan(state),
            StageId::Analyzer => stages::analyzer::analyze(&self.ctx, state).await,
            StageId::Retriever => stages::retriever::retrieve(&self.ctx, state).await,
            StageId::Reasoner => stages::reasoner::reason(&self.ctx, state).await,
            StageId::Reflector => stages::reflector::reflect(&self.ctx, state).await,
            StageId::Generator => stages::generator::generate(&self.ctx, state).await,
            StageId::Evaluator => StateDelta {
                scores: Some(self.evaluator.evaluate(state)),
                next_action: Some(NextAction::End),
                ..Default::default()
            },
            StageId::End => StateDelta::default(),
        }
    }

    /// Minimal forward-routing delta substituted when a stage fails
    /// unrecoverably: the run continues toward the generator instead of
    /// aborting.
    fn synthetic_delta(&self, stage: StageId, state: &RunState, error: &Error) -> StateDelta {
        match stage {
            StageId::Planner => StateDelta {
                increment_iteration: true,
                next_action: Some(NextAction::Reason),
                reasoning_steps: vec![format!("Planning: failed ({error}); reasoning directly")],
                ..Default::default()
            },
            StageId::Analyzer | StageId::Retriever => StateDelta {
                next_action: Some(NextAction::Reason),
                reasoning_steps: vec![format!(
                    "Context gathering failed ({error}); continuing without it"
                )],
                ..Default::default()
            },
            StageId::Reasoner => StateDelta {
                next_action: Some(NextAction::Reflect),
                reasoning_steps: vec!["Reasoning: unavailable, proceeding directly".to_string()],
                ..Default::default()
            },
            StageId::Reflector => StateDelta {
                next_action: Some(NextAction::Generate),
                last_assessment: Some(Assessment::Good),
                reflection_notes: vec![format!("Reflection: accepted (stage failed: {error})")],
                ..Default::default()
            },
            StageId::Generator => StateDelta {
                final_output: Some(stages::generator::fallback_output(
                    state,
                    &self.ctx.config.context,
                    true,
                )),
                is_complete: Some(true),
                next_action: Some(NextAction::Evaluate),
                ..Default::default()
            },
            StageId::Evaluator | StageId::End => StateDelta {
                next_action: Some(NextAction::End),
                ..Default::default()
            },
        }
    }

    /// Best-effort completion after cancellation: deterministic fallback
    /// output plus scores, never an empty-handed return.
    fn unwind_cancelled(&self, mut state: RunState) -> RunState {
        if state.final_output.is_none() {
            let output =
                stages::generator::fallback_output(&state, &self.ctx.config.context, true);
            state.apply(StateDelta {
                final_output: Some(output),
                is_complete: Some(true),
                next_action: Some(NextAction::Evaluate),
                ..Default::default()
            });
        }
        let scores = self.evaluator.evaluate(&state);
        state.apply(StateDelta {
            scores: Some(scores),
            next_action: Some(NextAction::End),
            ..Default::default()
        });
        state
    }
}

/// Resolves only once the watch channel reads `true`; never resolves if
/// the sender goes away without cancelling.
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
