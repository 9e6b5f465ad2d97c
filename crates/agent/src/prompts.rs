//! Prompt templates for the agent stages
//!
//! PRIVATE MODULE - Not exported from crate
//!
//! Templates live as asset files; dynamic values are substituted with
//! `format_prompt`.

pub const REASONER_SYSTEM: &str = include_str!("../assets/prompts/reasoner_system.txt");
pub const REASONER_USER: &str = include_str!("../assets/prompts/reasoner_user.txt");

pub const REFLECTOR_SYSTEM: &str = include_str!("../assets/prompts/reflector_system.txt");
pub const REFLECTOR_USER: &str = include_str!("../assets/prompts/reflector_user.txt");

pub const GENERATOR_ANALYSIS_SYSTEM: &str =
    include_str!("../assets/prompts/generator_analysis_system.txt");
pub const GENERATOR_CONTENT_SYSTEM: &str =
    include_str!("../assets/prompts/generator_content_system.txt");
pub const GENERATOR_GENERAL_SYSTEM: &str =
    include_str!("../assets/prompts/generator_general_system.txt");
pub const GENERATOR_USER: &str = include_str!("../assets/prompts/generator_user.txt");

pub fn format_prompt(template: &str, vars: &[(&str, &str)]) -> String {
    let mut result = template.to_string();
    for (key, value) in vars {
        result = result.replace(&format!("{{{key}}}"), value);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_prompt() {
        let template = "Task: {task} ({kind})";
        let result = format_prompt(template, &[("task", "analyze"), ("kind", "analyze_repo")]);
        assert_eq!(result, "Task: analyze (analyze_repo)");
    }

    #[test]
    #[allow(clippy::len_zero)]
    fn test_prompts_load() {
        assert!(REASONER_SYSTEM.len() > 0);
        assert!(REASONER_USER.contains("{context}"));
        assert!(REFLECTOR_SYSTEM.contains("{criteria}"));
        assert!(REFLECTOR_USER.contains("{context}"));
        assert!(GENERATOR_ANALYSIS_SYSTEM.contains("evidence"));
        assert!(GENERATOR_CONTENT_SYSTEM.len() > 0);
        assert!(GENERATOR_GENERAL_SYSTEM.len() > 0);
        assert!(GENERATOR_USER.contains("{context}"));
    }
}
