//! Task-kind detection for free-text input
//!
//! The interactive surface has no explicit task-kind flag per turn, so the
//! kind is inferred from keywords before the task enters the orchestrator.

use repoagent_core::TaskKind;

const ANALYZE_KEYWORDS: &[&str] = &[
    "analyze",
    "analyse",
    "analysis",
    "repository",
    "repo",
    "codebase",
    "architecture",
];

const CONTENT_KEYWORDS: &[&str] = &["post", "social media", "announcement", "write a", "draft a"];

const QUESTION_KEYWORDS: &[&str] = &["what", "why", "how", "explain", "tell me", "describe"];

pub fn detect_task_kind(task: &str) -> TaskKind {
    let lower = task.to_lowercase();

    if CONTENT_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        return TaskKind::GenerateContent;
    }
    if ANALYZE_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        return TaskKind::AnalyzeRepo;
    }
    if QUESTION_KEYWORDS.iter().any(|kw| lower.contains(kw)) || lower.trim_end().ends_with('?') {
        return TaskKind::AnswerQuestion;
    }
    TaskKind::General
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn analysis_requests_detected() {
        assert_eq!(
            detect_task_kind("Analyze this repository"),
            TaskKind::AnalyzeRepo
        );
        assert_eq!(
            detect_task_kind("Give me an analysis of the codebase"),
            TaskKind::AnalyzeRepo
        );
    }

    #[test]
    fn content_requests_win_over_analysis() {
        assert_eq!(
            detect_task_kind("Write a post about this repository"),
            TaskKind::GenerateContent
        );
    }

    #[test]
    fn questions_detected() {
        assert_eq!(
            detect_task_kind("What are embeddings?"),
            TaskKind::AnswerQuestion
        );
        assert_eq!(
            detect_task_kind("is retrieval configured?"),
            TaskKind::AnswerQuestion
        );
    }

    #[test]
    fn everything_else_is_general() {
        assert_eq!(detect_task_kind("2+2"), TaskKind::General);
        assert_eq!(detect_task_kind("hello"), TaskKind::General);
    }
}
