//! Workflow graph as data
//!
//! The routing policy is a static table from `(stage, next_action)` to the
//! next stage, kept separate from stage execution so it can be tested in
//! isolation. The router also enforces the iteration bound: once the
//! budget is spent, any route back to the planner is overridden to the
//! generator so a run always produces output.

use repoagent_core::NextAction;
use std::collections::HashMap;
use tracing::warn;

/// One node of the workflow graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageId {
    Planner,
    Analyzer,
    Retriever,
    Reasoner,
    Reflector,
    Generator,
    Evaluator,
    End,
}

/// Static routing table for the agent workflow
pub struct RoutingTable {
    edges: HashMap<(StageId, NextAction), StageId>,
}

impl Default for RoutingTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl RoutingTable {
    /// The standard agent graph:
    /// planner -> {analyzer | retriever | reasoner} -> reasoner ->
    /// reflector -> {planner | generator} -> evaluator -> end
    pub fn standard() -> Self {
        let mut edges = HashMap::new();
        edges.insert((StageId::Planner, NextAction::Analyze), StageId::Analyzer);
        edges.insert((StageId::Planner, NextAction::Retrieve), StageId::Retriever);
        edges.insert((StageId::Planner, NextAction::Reason), StageId::Reasoner);
        edges.insert((StageId::Analyzer, NextAction::Reason), StageId::Reasoner);
        edges.insert((StageId::Retriever, NextAction::Reason), StageId::Reasoner);
        edges.insert((StageId::Reasoner, NextAction::Reflect), StageId::Reflector);
        edges.insert((StageId::Reflector, NextAction::Generate), StageId::Generator);
        edges.insert((StageId::Reflector, NextAction::Retry), StageId::Planner);
        edges.insert((StageId::Reflector, NextAction::Continue), StageId::Planner);
        edges.insert((StageId::Generator, NextAction::Evaluate), StageId::Evaluator);
        edges.insert((StageId::Evaluator, NextAction::End), StageId::End);
        Self { edges }
    }

    /// Raw table lookup, no overrides applied
    pub fn lookup(&self, stage: StageId, action: NextAction) -> Option<StageId> {
        self.edges.get(&(stage, action)).copied()
    }

    /// Resolve the next stage, enforcing termination:
    /// - `End` always ends the run
    /// - an unknown (stage, action) pair forces progress to the generator
    ///   so the run still produces output
    /// - once `iteration >= max_iterations`, a route back to the planner is
    ///   overridden to the generator
    pub fn next(
        &self,
        stage: StageId,
        action: NextAction,
        iteration: u32,
        max_iterations: u32,
    ) -> StageId {
        if action == NextAction::End {
            return StageId::End;
        }

        let target = match self.lookup(stage, action) {
            Some(target) => target,
            None => {
                warn!("No route for ({stage:?}, {action:?}); forcing progress to generator");
                StageId::Generator
            }
        };

        if target == StageId::Planner && iteration >= max_iterations {
            warn!("Iteration budget spent ({iteration}/{max_iterations}); forcing generator");
            return StageId::Generator;
        }

        target
    }
}
