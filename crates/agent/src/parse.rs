//! Tolerant parsing of model responses
//!
//! Reasoning steps and critique verdicts arrive as semi-structured text.
//! Both parsers return a tagged result so every caller handles the
//! unparsed case explicitly instead of assuming success.

use repoagent_core::state::Assessment;

/// Strip markdown code fences from an LLM response.
fn strip_markdown_fences(response: &str) -> &str {
    let trimmed = response.trim();

    if trimmed.starts_with("```") {
        // Find the end of the opening fence (```json or ```)
        let after_fence = if let Some(newline_pos) = trimmed.find('\n') {
            &trimmed[newline_pos + 1..]
        } else {
            trimmed
                .strip_prefix("```json")
                .or_else(|| trimmed.strip_prefix("```"))
                .unwrap_or(trimmed)
        };

        // Find closing fence
        if let Some(close_pos) = after_fence.rfind("```") {
            after_fence[..close_pos].trim()
        } else {
            after_fence.trim()
        }
    } else {
        trimmed
    }
}

/// Extract a balanced JSON structure starting at a given byte position.
fn extract_balanced_at(content: &str, start_pos: usize) -> Option<&str> {
    let start_char = content[start_pos..].chars().next()?;
    let end_char = match start_char {
        '{' => '}',
        '[' => ']',
        _ => return None,
    };

    let json_content = &content[start_pos..];
    let mut depth = 0;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in json_content.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            _ if in_string => {}
            c if c == start_char => depth += 1,
            c if c == end_char => {
                depth -= 1;
                if depth == 0 {
                    return Some(&json_content[..=i]);
                }
            }
            _ => {}
        }
    }

    None
}

fn is_valid_json(s: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(s).is_ok()
}

/// Extract JSON from an LLM response, stripping markdown fences and
/// extraneous prose. Candidates are tried in positional order so the
/// outermost balanced structure wins; each is validated with serde before
/// being accepted.
pub(crate) fn extract_json(response: &str) -> Option<&str> {
    let content = strip_markdown_fences(response);

    let mut candidates: Vec<usize> = content.match_indices(['{', '[']).map(|(i, _)| i).collect();
    candidates.sort_unstable();

    for pos in candidates {
        if let Some(json) = extract_balanced_at(content, pos) {
            if is_valid_json(json) {
                return Some(json);
            }
        }
    }

    None
}

/// Result of parsing a reasoning-steps response
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ParsedSteps {
    Parsed(Vec<String>),
    Unparsed(String),
}

/// Parse an ordered list of reasoning steps. Accepts either
/// `{"reasoning_steps": [...]}` or a bare JSON array of strings.
pub(crate) fn parse_reasoning_steps(raw: &str) -> ParsedSteps {
    let Some(json) = extract_json(raw) else {
        return ParsedSteps::Unparsed(raw.to_string());
    };
    let Ok(value) = serde_json::from_str::<serde_json::Value>(json) else {
        return ParsedSteps::Unparsed(raw.to_string());
    };

    let array = match &value {
        serde_json::Value::Array(items) => Some(items),
        serde_json::Value::Object(map) => map.get("reasoning_steps").and_then(|v| v.as_array()),
        _ => None,
    };

    let steps: Vec<String> = array
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();

    if steps.is_empty() {
        ParsedSteps::Unparsed(raw.to_string())
    } else {
        ParsedSteps::Parsed(steps)
    }
}

/// A parsed critique verdict
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CritiqueVerdict {
    pub assessment: Assessment,
    pub critique: String,
}

/// Result of parsing a critique response
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ParsedVerdict {
    Parsed(CritiqueVerdict),
    Unparsed(String),
}

fn assessment_from_str(raw: &str) -> Option<Assessment> {
    let normalized = raw.trim().to_lowercase().replace([' ', '-'], "_");
    match normalized.as_str() {
        "good" => Some(Assessment::Good),
        "needs_improvement" => Some(Assessment::NeedsImprovement),
        "needs_more_data" => Some(Assessment::NeedsMoreData),
        _ => None,
    }
}

/// Parse a critique verdict. Expects `{"assessment": ..., "critique": ...}`
/// but tolerates missing fields; anything unrecognizable is returned
/// unparsed for the caller to fail open on.
pub(crate) fn parse_critique(raw: &str) -> ParsedVerdict {
    let Some(json) = extract_json(raw) else {
        return ParsedVerdict::Unparsed(raw.to_string());
    };
    let Ok(value) = serde_json::from_str::<serde_json::Value>(json) else {
        return ParsedVerdict::Unparsed(raw.to_string());
    };

    let Some(assessment) = value
        .get("assessment")
        .and_then(|v| v.as_str())
        .and_then(assessment_from_str)
    else {
        return ParsedVerdict::Unparsed(raw.to_string());
    };

    let critique = value
        .get("critique")
        .and_then(|v| v.as_str())
        .unwrap_or("no critique provided")
        .to_string();

    ParsedVerdict::Parsed(CritiqueVerdict {
        assessment,
        critique,
    })
}
