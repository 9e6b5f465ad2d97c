//! Bounded context building shared by the reasoning, reflection, and
//! generation stages
//!
//! Folds the run state into a prompt-sized summary. Every list is
//! truncated by the configured bounds so accumulated state never blows the
//! context window.

use repoagent_core::config::ContextConfig;
use repoagent_core::RunState;
use std::fmt::Write;

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{cut}...")
    }
}

/// Build the prompt context for a stage. Reflection notes are included
/// only when requested; the generator's BEFORE output is produced by
/// leaving them out.
pub(crate) fn build_context(
    state: &RunState,
    config: &ContextConfig,
    include_reflection: bool,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Task: {}", state.task);
    let _ = writeln!(out, "Task kind: {}", state.task_kind.as_str());

    if let Some(facts) = &state.structural_facts {
        let _ = writeln!(out, "\nRepository facts: {}", facts.summary());

        if let Some(structure) = &facts.structure {
            let names: Vec<&str> = structure
                .children
                .iter()
                .map(|c| c.name.as_str())
                .collect();
            let _ = writeln!(out, "Top-level entries: {}", names.join(", "));
        }

        if !facts.dependencies.is_empty() {
            let _ = writeln!(out, "\nDependencies:");
            for dep in facts.dependencies.iter().take(config.max_dependencies) {
                match &dep.version {
                    Some(version) => {
                        let _ = writeln!(out, "- {}=={} ({})", dep.name, version, dep.manifest);
                    }
                    None => {
                        let _ = writeln!(out, "- {} ({})", dep.name, dep.manifest);
                    }
                }
            }
        }

        if !facts.modules.is_empty() {
            let _ = writeln!(out, "\nModules:");
            for module in facts.modules.iter().take(config.max_modules) {
                let _ = writeln!(out, "- {} ({} files)", module.name, module.file_count);
            }
        }

        if !facts.symbols.is_empty() {
            let _ = writeln!(out, "\nSymbols:");
            for symbol in facts.symbols.iter().take(config.max_symbols) {
                let _ = writeln!(
                    out,
                    "- {:?} {} at {}",
                    symbol.kind,
                    symbol.name,
                    symbol.citation()
                );
            }
        }

        if !facts.source_files.is_empty() {
            let _ = writeln!(out, "\nSource excerpts:");
            for file in facts.source_files.iter().take(config.max_source_files) {
                let _ = writeln!(
                    out,
                    "--- {} ({} lines) ---\n{}",
                    file.path,
                    file.line_count,
                    truncate_chars(&file.excerpt, config.max_excerpt_chars)
                );
            }
        }

        if let Some(verification) = &facts.verification {
            let _ = writeln!(out, "\nVerification:");
            if let Some(count) = verification.collected_tests {
                let _ = writeln!(out, "- {count} tests collected");
            }
            if let Some(coverage) = verification.coverage_percent {
                let _ = writeln!(out, "- coverage {coverage:.0}%");
            }
            if let Some(files) = verification.test_file_count {
                let _ = writeln!(out, "- {files} test files");
            }
        }
    }

    if !state.retrieved_passages.is_empty() {
        let _ = writeln!(out, "\nRetrieved passages:");
        for passage in &state.retrieved_passages {
            let _ = writeln!(
                out,
                "[{} score={:.2}] {}",
                passage.source,
                passage.score,
                truncate_chars(&passage.text, config.max_passage_chars)
            );
        }
    }

    if !state.reasoning_steps.is_empty() {
        let _ = writeln!(out, "\nReasoning so far:");
        for step in &state.reasoning_steps {
            let _ = writeln!(out, "- {step}");
        }
    }

    if include_reflection && !state.reflection_notes.is_empty() {
        let _ = writeln!(out, "\nCritique to address:");
        for note in &state.reflection_notes {
            let _ = writeln!(out, "- {note}");
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use repoagent_core::facts::{Dependency, RetrievedPassage, StructuralFacts};
    use repoagent_core::TaskKind;

    fn state_with_facts() -> RunState {
        let mut state = RunState::new("Analyze this repository", TaskKind::AnalyzeRepo, 3);
        state.structural_facts = Some(StructuralFacts {
            dependencies: (0..30)
                .map(|i| Dependency {
                    name: format!("dep-{i}"),
                    version: Some("1.0".into()),
                    manifest: "Cargo.toml".into(),
                })
                .collect(),
            ..Default::default()
        });
        state.reflection_notes = vec!["Reflection: needs file citations".into()];
        state
    }

    #[test]
    fn dependencies_are_bounded() {
        let context = build_context(&state_with_facts(), &ContextConfig::default(), false);
        assert!(context.contains("dep-0==1.0"));
        assert!(context.contains("dep-19"));
        assert!(!context.contains("dep-20"));
    }

    #[test]
    fn reflection_notes_only_when_requested() {
        let state = state_with_facts();
        let config = ContextConfig::default();
        let without = build_context(&state, &config, false);
        let with = build_context(&state, &config, true);
        assert!(!without.contains("needs file citations"));
        assert!(with.contains("needs file citations"));
        assert!(with.contains("Critique to address"));
    }

    #[test]
    fn passages_are_truncated() {
        let mut state = RunState::new("what are embeddings?", TaskKind::AnswerQuestion, 1);
        state.retrieved_passages = vec![RetrievedPassage {
            text: "x".repeat(5000),
            score: 0.9,
            source: "doc-1".into(),
        }];
        let config = ContextConfig::default();
        let context = build_context(&state, &config, false);
        assert!(context.len() < 3000);
        assert!(context.contains("doc-1"));
    }
}
