//! Retriever stage: top-k passages from the knowledge base
//!
//! An empty result set is a valid outcome (the knowledge base may simply
//! have nothing relevant) and is propagated as such. A service failure
//! degrades to the same empty set so the run continues.

use super::StageContext;
use repoagent_core::facts::ToolInvocation;
use repoagent_core::services::RetrievalRequest;
use repoagent_core::{NextAction, RunState, StateDelta};
use tracing::{info, warn};

pub(crate) async fn retrieve(ctx: &StageContext, state: &RunState) -> StateDelta {
    let top_k = ctx.config.retrieval.top_k;
    info!("Retrieving top {top_k} passages from the knowledge base");

    let request = RetrievalRequest {
        query: state.task.clone(),
        top_k,
    };

    match ctx.retrieval.retrieve(request).await {
        Ok(response) => {
            let count = response.passages.len();
            let step = if count == 0 {
                "Retrieval: no relevant passages found in knowledge base".to_string()
            } else {
                format!("Retrieval: found {count} relevant passages")
            };
            StateDelta {
                tool_invocations: vec![ToolInvocation::new(
                    "knowledge_retrieval",
                    format!("top_k={top_k}"),
                    format!("{count} passages"),
                )],
                reasoning_steps: vec![step],
                retrieved_passages: Some(response.passages),
                next_action: Some(NextAction::Reason),
                ..Default::default()
            }
        }
        Err(e) => {
            warn!("Retrieval failed: {e}");
            StateDelta {
                tool_invocations: vec![ToolInvocation::new(
                    "knowledge_retrieval",
                    format!("top_k={top_k}"),
                    format!("error: {e}"),
                )],
                reasoning_steps: vec![format!("Retrieval: failed to reach knowledge base ({e})")],
                retrieved_passages: Some(vec![]),
                next_action: Some(NextAction::Reason),
                ..Default::default()
            }
        }
    }
}
