//! Repoagent CLI - autonomous repository agent
//!
//! This binary provides the interactive command-line surface. Session
//! commands (`exit`, `quit`, `history`, `stats`, `clear`) are handled here
//! and never reach the orchestrator.

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

mod detect;
mod session;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use repoagent_agent::{AnalysisCache, LlmClient, Orchestrator};
use repoagent_core::config::AgentConfig;
use repoagent_core::services::RetrievalService;
use repoagent_core::TaskKind;
use repoagent_tools::{FsRepoInspector, HttpRetrievalService, NullRetrievalService};
use session::Session;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "repoagent")]
#[command(about = "Autonomous repository agent with self-reflection")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Repository to analyze (defaults to the current directory)
    #[arg(short, long, value_name = "DIR", global = true)]
    repo: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single task and print the result
    Ask {
        /// The task text
        task: String,
        /// Task kind: analyze_repo, answer_question, generate_content, general
        #[arg(long)]
        kind: Option<String>,
    },
    /// Start the interactive session (default)
    Interactive,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose)?;

    let config = AgentConfig::load(cli.config.as_deref())?;
    config.validate()?;

    let repo_root = match cli.repo.clone() {
        Some(path) => path,
        None => env::current_dir().context("Failed to get current directory")?,
    };
    info!("Using repository at {}", repo_root.display());

    let orchestrator = Arc::new(build_orchestrator(&config, repo_root)?);

    match cli.command {
        Some(Commands::Ask { task, kind }) => {
            let task_kind = kind
                .as_deref()
                .map(parse_task_kind)
                .transpose()?
                .unwrap_or_else(|| detect::detect_task_kind(&task));
            let state = orchestrator.run(task, task_kind).await;
            session::print_result(&state);
            Ok(())
        }
        Some(Commands::Interactive) | None => {
            let mut session = Session::new(orchestrator);
            session.run().await
        }
    }
}

fn build_orchestrator(config: &AgentConfig, repo_root: PathBuf) -> Result<Orchestrator> {
    let llm = Arc::new(LlmClient::new(config.llm.clone())?);
    let retrieval: Arc<dyn RetrievalService> = if config.retrieval.endpoint.is_some() {
        Arc::new(HttpRetrievalService::new(&config.retrieval)?)
    } else {
        Arc::new(NullRetrievalService)
    };
    let inspector = Arc::new(FsRepoInspector::new(repo_root, config.analysis.clone()));
    let cache = Arc::new(AnalysisCache::new(&config.cache));

    Ok(Orchestrator::new(
        llm,
        retrieval,
        inspector,
        cache,
        config.clone(),
    )?)
}

fn parse_task_kind(raw: &str) -> Result<TaskKind> {
    match raw {
        "analyze_repo" => Ok(TaskKind::AnalyzeRepo),
        "answer_question" => Ok(TaskKind::AnswerQuestion),
        "generate_content" => Ok(TaskKind::GenerateContent),
        "general" => Ok(TaskKind::General),
        other => anyhow::bail!(
            "Unknown task kind '{other}' (expected analyze_repo, answer_question, generate_content, or general)"
        ),
    }
}

/// Initialize logging system
fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(format!("repoagent={level}"))
        .init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_kind_parsing() {
        assert!(matches!(
            parse_task_kind("analyze_repo"),
            Ok(TaskKind::AnalyzeRepo)
        ));
        assert!(matches!(parse_task_kind("general"), Ok(TaskKind::General)));
        assert!(parse_task_kind("bogus").is_err());
    }
}
