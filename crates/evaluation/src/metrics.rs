//! Individual metric calculations
//!
//! Each metric returns its score together with the point-allocation lines
//! that produced it. The allocations are part of the contract: tests assert
//! on them, not just on the numbers.

use regex::Regex;
use repoagent_core::{RunState, TaskKind};
use std::collections::HashSet;

/// One metric's score with its point-allocation ledger
#[derive(Debug, Clone)]
pub struct MetricScore {
    pub score: f64,
    pub notes: Vec<String>,
}

impl MetricScore {
    fn new() -> Self {
        Self {
            score: 0.0,
            notes: Vec::new(),
        }
    }

    fn add(&mut self, points: f64, note: impl Into<String>) {
        self.score += points;
        self.notes.push(note.into());
    }

    fn clamp(mut self) -> Self {
        self.score = self.score.clamp(0.0, 100.0);
        self
    }
}

/// Hedging terms penalized in repository-analysis output
const HEDGING_TERMS: &[&str] = &[
    "likely",
    "suggests",
    "appears to",
    "may",
    "probably",
    "seems to",
    "possibly",
];

/// Markers that the critique was folded into the final output
const INCORPORATION_MARKERS: &[&str] = &[
    "addressing",
    "improved",
    "enhanced",
    "self-reflection",
    "added",
    "included",
];

/// Required sections of a repository-analysis report
const ANALYSIS_SECTIONS: &[&str] = &[
    "summary",
    "structure",
    "key modules",
    "tests",
    "dependencies",
    "capabilities",
    "gaps",
];

/// Task completion: output present (50) + completion flag (30) + staying
/// within the iteration budget (20, partial credit at the limit)
pub fn task_completion(state: &RunState) -> MetricScore {
    let mut metric = MetricScore::new();

    if state
        .final_output
        .as_ref()
        .is_some_and(|output| !output.is_empty())
    {
        metric.add(50.0, "final output present (50/50 pts)");
    } else {
        metric.add(0.0, "no final output (0/50 pts)");
    }

    if state.is_complete {
        metric.add(30.0, "task marked complete (30/30 pts)");
    } else {
        metric.add(0.0, "task not marked complete (0/30 pts)");
    }

    if state.iteration < state.max_iterations {
        metric.add(
            20.0,
            format!(
                "completed within budget ({}/{} iterations, 20/20 pts)",
                state.iteration, state.max_iterations
            ),
        );
    } else if state.iteration == state.max_iterations {
        metric.add(
            10.0,
            format!(
                "used the full budget ({}/{} iterations, 10/20 pts)",
                state.iteration, state.max_iterations
            ),
        );
    } else {
        metric.add(0.0, "exceeded iteration budget (0/20 pts)");
    }

    metric.clamp()
}

/// Reasoning quality: any steps (40) + step-count band (up to 40) +
/// reflection present (20)
pub fn reasoning_quality(state: &RunState) -> MetricScore {
    let mut metric = MetricScore::new();
    let steps = state.reasoning_steps.len();

    if steps > 0 {
        metric.add(40.0, format!("{steps} reasoning steps (40/40 pts)"));
        match steps {
            5.. => metric.add(40.0, "comprehensive depth, 5+ steps (40/40 pts)"),
            3..=4 => metric.add(30.0, "adequate depth, 3-4 steps (30/40 pts)"),
            _ => metric.add(20.0, "minimal depth, 1-2 steps (20/40 pts)"),
        }
    } else {
        metric.add(0.0, "no reasoning steps (0/40 pts)");
        metric.add(0.0, "no depth to assess (0/40 pts)");
    }

    if state.reflection_notes.is_empty() {
        metric.add(0.0, "no self-reflection (0/20 pts)");
    } else {
        metric.add(
            20.0,
            format!(
                "self-reflection recorded ({} notes, 20/20 pts)",
                state.reflection_notes.len()
            ),
        );
    }

    metric.clamp()
}

/// Tool effectiveness: any invocation (50) + distinct-tool band (up to 30)
/// + at least one non-empty result (20).
///
/// A cache hit is a single `analysis_cache` invocation, so cached runs land
/// in the lowest distinct-tool band. That lower score relative to a fresh
/// multi-tool analysis is intentional and preserved as-is.
pub fn tool_effectiveness(state: &RunState) -> MetricScore {
    let mut metric = MetricScore::new();
    let invocations = &state.tool_invocations;

    if invocations.is_empty() {
        metric.add(0.0, "no tool invocations (0/50 pts)");
        metric.add(0.0, "no tool diversity (0/30 pts)");
        metric.add(0.0, "no tool results (0/20 pts)");
        return metric.clamp();
    }

    metric.add(
        50.0,
        format!("{} tool invocations (50/50 pts)", invocations.len()),
    );

    let distinct: HashSet<&str> = invocations.iter().map(|t| t.tool_name.as_str()).collect();
    match distinct.len() {
        3.. => metric.add(
            30.0,
            format!("{} distinct tools (30/30 pts)", distinct.len()),
        ),
        2 => metric.add(20.0, "2 distinct tools (20/30 pts)"),
        _ => metric.add(10.0, "1 distinct tool (10/30 pts)"),
    }

    let has_result = invocations.iter().any(|t| {
        !t.result_summary.is_empty() && !t.result_summary.to_lowercase().starts_with("error")
    });
    if has_result {
        metric.add(20.0, "tool calls produced results (20/20 pts)");
    } else {
        metric.add(0.0, "no non-empty tool results (0/20 pts)");
    }

    metric.clamp()
}

/// Reflection quality: notes present (30) + critique depth band (up to 40)
/// + evidence the critique reached the final output (40, partial credit
/// without a draft to compare)
pub fn reflection_quality(state: &RunState) -> MetricScore {
    let mut metric = MetricScore::new();
    let notes = state.reflection_notes.len();

    if notes > 0 {
        metric.add(30.0, format!("{notes} reflection notes (30/30 pts)"));
        match notes {
            3.. => metric.add(40.0, "deep critique, 3+ notes (40/40 pts)"),
            2 => metric.add(25.0, "moderate critique, 2 notes (25/40 pts)"),
            _ => metric.add(15.0, "shallow critique, 1 note (15/40 pts)"),
        }
    } else {
        metric.add(0.0, "no reflection notes (0/30 pts)");
        metric.add(0.0, "no critique depth (0/40 pts)");
    }

    let draft_differs = match (&state.draft_before_reflection, &state.final_output) {
        (Some(draft), Some(output)) => draft != output,
        _ => false,
    };
    if draft_differs {
        metric.add(
            40.0,
            "critique incorporated: final output differs from pre-reflection draft (40/40 pts)",
        );
    } else if notes > 0 {
        let output = state
            .final_output
            .as_deref()
            .unwrap_or_default()
            .to_lowercase();
        if INCORPORATION_MARKERS.iter().any(|m| output.contains(m)) {
            metric.add(
                20.0,
                "critique implicitly addressed in output (20/40 pts)",
            );
        } else {
            metric.add(0.0, "no evidence critique reached the output (0/40 pts)");
        }
    } else {
        metric.add(0.0, "no critique to incorporate (0/40 pts)");
    }

    metric.clamp()
}

/// Output quality: task-kind-specific rubric
pub fn output_quality(state: &RunState) -> MetricScore {
    let Some(output) = state.final_output.as_deref().filter(|o| !o.is_empty()) else {
        let mut metric = MetricScore::new();
        metric.add(0.0, "no output to assess (0/100 pts)");
        return metric;
    };

    match state.task_kind {
        TaskKind::AnalyzeRepo => analysis_output_quality(output),
        TaskKind::GenerateContent => content_output_quality(output),
        _ => general_output_quality(output),
    }
}

fn analysis_output_quality(output: &str) -> MetricScore {
    let mut metric = MetricScore::new();
    let lower = output.to_lowercase();

    // Evidence tags are mandatory for analysis reports
    let evidence_count = Regex::new(r"\[evidence:\s*[^\]]+\]")
        .map(|re| re.find_iter(output).count())
        .unwrap_or(0);
    match evidence_count {
        15.. => metric.add(30.0, format!("{evidence_count} evidence tags (30/30 pts)")),
        10..=14 => metric.add(25.0, format!("{evidence_count} evidence tags (25/30 pts)")),
        5..=9 => metric.add(15.0, format!("{evidence_count} evidence tags (15/30 pts)")),
        1..=4 => metric.add(5.0, format!("{evidence_count} evidence tags (5/30 pts)")),
        0 => metric.add(-20.0, "no evidence tags (-20 pts penalty)"),
    }

    let sections_found = ANALYSIS_SECTIONS
        .iter()
        .filter(|s| lower.contains(**s))
        .count();
    metric.add(
        (sections_found * 4) as f64,
        format!(
            "{sections_found}/{} required sections ({}/28 pts)",
            ANALYSIS_SECTIONS.len(),
            sections_found * 4
        ),
    );

    let has_line_refs = Regex::new(r":\d+")
        .map(|re| re.is_match(output))
        .unwrap_or(false);
    if has_line_refs {
        metric.add(10.0, "file:line citations present (10/10 pts)");
    } else {
        metric.add(0.0, "no file:line citations (0/10 pts)");
    }

    if output.contains("::") && lower.contains("test") {
        metric.add(10.0, "test citations present (10/10 pts)");
    } else if lower.contains("test_") || lower.contains("tests/") {
        metric.add(4.0, "test files mentioned without citations (4/10 pts)");
    } else {
        metric.add(0.0, "no test citations (0/10 pts)");
    }

    let has_versions = output.contains("==")
        || output.contains("~=")
        || Regex::new(r"\b\d+\.\d+(\.\d+)?\b")
            .map(|re| re.is_match(output))
            .unwrap_or(false);
    if has_versions {
        metric.add(5.0, "dependency versions cited (5/5 pts)");
    } else {
        metric.add(0.0, "no dependency versions (0/5 pts)");
    }

    let mentions_verification = ["tests collected", "coverage", "test count"]
        .iter()
        .any(|kw| lower.contains(kw));
    if mentions_verification {
        metric.add(5.0, "verification outputs cited (5/5 pts)");
    } else {
        metric.add(0.0, "no verification outputs cited (0/5 pts)");
    }

    let hedging = HEDGING_TERMS
        .iter()
        .filter(|term| lower.contains(**term))
        .count();
    match hedging {
        5.. => metric.add(-15.0, format!("{hedging} hedging terms (-15 pts penalty)")),
        3..=4 => metric.add(-10.0, format!("{hedging} hedging terms (-10 pts penalty)")),
        1..=2 => metric.add(-5.0, format!("{hedging} hedging terms (-5 pts penalty)")),
        0 => metric.add(0.0, "no hedging language (no penalty)"),
    }

    if output.contains('#') {
        metric.add(7.0, "markdown headers (7/7 pts)");
    }
    if output.contains("- ") || output.contains("* ") || output.matches('\n').count() >= 10 {
        metric.add(8.0, "structured lists (8/8 pts)");
    }

    metric.clamp()
}

fn content_output_quality(output: &str) -> MetricScore {
    let mut metric = MetricScore::new();
    let lower = output.to_lowercase();
    let head: String = lower.chars().take(200).collect();
    let tail: String = {
        let chars: Vec<char> = lower.chars().collect();
        chars[chars.len().saturating_sub(200)..].iter().collect()
    };

    if ["excited", "thrilled", "introducing", "proud", "announcing"]
        .iter()
        .any(|w| head.contains(w))
    {
        metric.add(10.0, "engaging opening (10/10 pts)");
    } else {
        metric.add(0.0, "no engaging opening (0/10 pts)");
    }

    if ["features", "stack", "technical", "capabilities"]
        .iter()
        .any(|w| lower.contains(w))
    {
        metric.add(10.0, "technical section present (10/10 pts)");
    } else {
        metric.add(0.0, "no technical section (0/10 pts)");
    }

    if ["thank", "check out", "available", "repo"]
        .iter()
        .any(|w| tail.contains(w))
    {
        metric.add(10.0, "closing call-to-action (10/10 pts)");
    } else {
        metric.add(0.0, "no closing call-to-action (0/10 pts)");
    }

    let hashtags = output.matches('#').count();
    match hashtags {
        5.. => metric.add(10.0, format!("{hashtags} hashtags (10/10 pts)")),
        3..=4 => metric.add(7.0, format!("{hashtags} hashtags (7/10 pts)")),
        1..=2 => metric.add(4.0, format!("{hashtags} hashtags (4/10 pts)")),
        0 => metric.add(0.0, "no hashtags (0/10 pts)"),
    }

    if output.chars().any(|c| c.is_ascii_digit()) {
        metric.add(15.0, "concrete numbers included (15/15 pts)");
    } else {
        metric.add(0.0, "no concrete numbers (0/15 pts)");
    }

    let tech_terms = [
        "agent",
        "retrieval",
        "orchestration",
        "pipeline",
        "evaluation",
        "reflection",
        "llm",
    ];
    let tech_count = tech_terms.iter().filter(|t| lower.contains(**t)).count();
    match tech_count {
        4.. => metric.add(20.0, format!("{tech_count} technical specifics (20/20 pts)")),
        2..=3 => metric.add(15.0, format!("{tech_count} technical specifics (15/20 pts)")),
        1 => metric.add(10.0, "1 technical specific (10/20 pts)"),
        0 => metric.add(0.0, "no technical specifics (0/20 pts)"),
    }

    if lower.contains("p.s.") || lower.contains("self-reflection") {
        metric.add(15.0, "self-reflection demonstrated (15/15 pts)");
    } else {
        metric.add(0.0, "no self-reflection note (0/15 pts)");
    }

    metric.clamp()
}

fn general_output_quality(output: &str) -> MetricScore {
    let mut metric = MetricScore::new();
    metric.add(40.0, "non-empty answer (40/40 pts)");

    let length = output.len();
    if (100..=2000).contains(&length) {
        metric.add(30.0, format!("appropriate length, {length} chars (30/30 pts)"));
    } else if length >= 50 {
        metric.add(20.0, format!("acceptable length, {length} chars (20/30 pts)"));
    } else {
        metric.add(0.0, format!("very short answer, {length} chars (0/30 pts)"));
    }

    if output.matches('\n').count() >= 2 || output.contains('.') {
        metric.add(20.0, "clear structure (20/20 pts)");
    } else {
        metric.add(0.0, "no discernible structure (0/20 pts)");
    }

    if output.to_lowercase().contains("self-reflection") {
        metric.add(10.0, "self-reflection referenced (10/10 pts)");
    }

    metric.clamp()
}
