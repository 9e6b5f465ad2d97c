//! Analyzer stage: repository structural facts via tools or cache
//!
//! Checks the analysis cache first; repeated follow-up questions about the
//! same repository must not re-run the expensive tools. On a miss the six
//! tools run in a fixed order, each invocation is recorded in the audit
//! trail whether it succeeds or not, and a single tool failure only leaves
//! that one fact empty.

use super::StageContext;
use repoagent_core::facts::{StructuralFacts, ToolInvocation};
use repoagent_core::{NextAction, RunState, StateDelta};
use tracing::{info, warn};

pub(crate) async fn analyze(ctx: &StageContext, _state: &RunState) -> StateDelta {
    let repo_path = ctx.inspector.repo_path().to_string();

    let fingerprint = match ctx.inspector.fingerprint().await {
        Ok(fp) => Some(fp),
        Err(e) => {
            warn!("Repository fingerprint failed, bypassing cache: {e}");
            None
        }
    };

    if ctx.config.cache.enabled {
        if let Some(fp) = &fingerprint {
            if let Some(facts) = ctx.cache.get(&repo_path, fp) {
                info!("Using cached repository analysis for {repo_path}");
                return StateDelta {
                    tool_invocations: vec![ToolInvocation::new(
                        "analysis_cache",
                        format!("repo={repo_path}"),
                        format!("cache hit: {}", facts.summary()),
                    )],
                    reasoning_steps: vec![
                        "Analysis: reused cached structural facts".to_string()
                    ],
                    structural_facts: Some(facts),
                    next_action: Some(NextAction::Reason),
                    ..Default::default()
                };
            }
        }
    }

    info!("Analyzing repository at {repo_path}");
    let mut facts = StructuralFacts::default();
    let mut invocations = Vec::with_capacity(6);
    let analysis = &ctx.config.analysis;

    match ctx.inspector.scan_structure().await {
        Ok(tree) => {
            invocations.push(ToolInvocation::new(
                "structure_scan",
                format!("depth={}", analysis.max_scan_depth),
                format!("{} top-level items", tree.children.len()),
            ));
            facts.structure = Some(tree);
        }
        Err(e) => {
            warn!("structure_scan failed: {e}");
            invocations.push(ToolInvocation::new(
                "structure_scan",
                format!("depth={}", analysis.max_scan_depth),
                format!("error: {e}"),
            ));
        }
    }

    match ctx.inspector.read_sources(analysis.max_source_files).await {
        Ok(files) => {
            invocations.push(ToolInvocation::new(
                "source_read",
                format!("max_files={}", analysis.max_source_files),
                format!("{} files read", files.len()),
            ));
            facts.source_files = files;
        }
        Err(e) => {
            warn!("source_read failed: {e}");
            invocations.push(ToolInvocation::new(
                "source_read",
                format!("max_files={}", analysis.max_source_files),
                format!("error: {e}"),
            ));
        }
    }

    match ctx.inspector.extract_dependencies().await {
        Ok(deps) => {
            invocations.push(ToolInvocation::new(
                "dependency_extract",
                String::new(),
                format!("{} dependencies", deps.len()),
            ));
            facts.dependencies = deps;
        }
        Err(e) => {
            warn!("dependency_extract failed: {e}");
            invocations.push(ToolInvocation::new(
                "dependency_extract",
                String::new(),
                format!("error: {e}"),
            ));
        }
    }

    match ctx.inspector.map_modules().await {
        Ok(modules) => {
            invocations.push(ToolInvocation::new(
                "module_map",
                String::new(),
                format!("{} modules", modules.len()),
            ));
            facts.modules = modules;
        }
        Err(e) => {
            warn!("module_map failed: {e}");
            invocations.push(ToolInvocation::new(
                "module_map",
                String::new(),
                format!("error: {e}"),
            ));
        }
    }

    match ctx.inspector.extract_symbols(analysis.max_symbol_files).await {
        Ok(symbols) => {
            invocations.push(ToolInvocation::new(
                "symbol_extract",
                format!("max_files={}", analysis.max_symbol_files),
                format!("{} symbols", symbols.len()),
            ));
            facts.symbols = symbols;
        }
        Err(e) => {
            warn!("symbol_extract failed: {e}");
            invocations.push(ToolInvocation::new(
                "symbol_extract",
                format!("max_files={}", analysis.max_symbol_files),
                format!("error: {e}"),
            ));
        }
    }

    match ctx.inspector.run_verification().await {
        Ok(outputs) => {
            let summary = match outputs.collected_tests {
                Some(count) => format!("{count} tests collected"),
                None => format!(
                    "{} test files found",
                    outputs.test_file_count.unwrap_or(0)
                ),
            };
            invocations.push(ToolInvocation::new("verification", String::new(), summary));
            facts.verification = Some(outputs);
        }
        Err(e) => {
            warn!("verification failed: {e}");
            invocations.push(ToolInvocation::new(
                "verification",
                String::new(),
                format!("error: {e}"),
            ));
        }
    }

    if ctx.config.cache.enabled {
        if let Some(fp) = &fingerprint {
            ctx.cache.put(&repo_path, fp, facts.clone());
        }
    }

    StateDelta {
        reasoning_steps: vec![format!("Analysis: {}", facts.summary())],
        structural_facts: Some(facts),
        tool_invocations: invocations,
        next_action: Some(NextAction::Reason),
        ..Default::default()
    }
}
