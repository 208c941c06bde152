//! Prompt Templates
//!
//! Every prompt the tutor sends to the completion service is a template with
//! `{placeholder}` slots. Built-in defaults cover all of them; a host may
//! override any template by key (typically one Markdown file per key).

use std::collections::HashMap;
use tracing::warn;

pub const CLASSIFY_INTENT: &str = "classify_intent";
pub const GRADE_SYSTEM: &str = "grade_system";
pub const GRADE_ANSWER: &str = "grade_answer";
pub const SOCRATIC_QUESTION: &str = "socratic_question";
pub const EXPLAIN_CONCEPT: &str = "explain_concept";
pub const EXTRACT_SYSTEM: &str = "extract_system";
pub const EXTRACT_CONCEPTS: &str = "extract_concepts";

const DEFAULT_CLASSIFY_INTENT: &str = "User: '{utterance}'\nConcepts: {concepts}\n\
Identify the concept name. Output ONLY the name, or NONE if no concept matches.";

const DEFAULT_GRADE_SYSTEM: &str = "You are a strict examiner.";

const DEFAULT_GRADE_ANSWER: &str =
    "Does the answer '{answer}' show mastery of '{prerequisite}'? Output ONLY 'YES' or 'NO'.";

const DEFAULT_SOCRATIC_QUESTION: &str = "You are a Socratic Tutor.
The student wants to learn '{target}', but they must first understand '{prerequisite}'.

Definition of {prerequisite}: \"{definition}\"

TASK: Ask a simple, foundational question to check if they understand {prerequisite}.
Ask about the definition of {prerequisite}, not about '{target}'.";

const DEFAULT_EXPLAIN_CONCEPT: &str = "Explain {target} using: {definition}";

const DEFAULT_EXTRACT_SYSTEM: &str = "You are a Knowledge Graph extraction engine.";

const DEFAULT_EXTRACT_CONCEPTS: &str = r#"Analyze the educational text below and extract a list of concepts.
For each concept, identify:
1. "concept": The name of the concept.
2. "definition": A short summary.
3. "prerequisite": The name of a concept that is REQUIRED to understand this one (if mentioned).

TEXT: {text}

OUTPUT FORMAT:
Provide ONLY a valid JSON list of objects. Do not add markdown blocks or conversational text.
Example:
[
  {"concept": "A", "definition": "Def A", "prerequisite": "B"},
  {"concept": "B", "definition": "Def B", "prerequisite": null}
]"#;

/// The full set of templates used by the classifier, grader, tutor and
/// extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSet {
    pub classify_intent: String,
    pub grade_system: String,
    pub grade_answer: String,
    pub socratic_question: String,
    pub explain_concept: String,
    pub extract_system: String,
    pub extract_concepts: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            classify_intent: DEFAULT_CLASSIFY_INTENT.to_string(),
            grade_system: DEFAULT_GRADE_SYSTEM.to_string(),
            grade_answer: DEFAULT_GRADE_ANSWER.to_string(),
            socratic_question: DEFAULT_SOCRATIC_QUESTION.to_string(),
            explain_concept: DEFAULT_EXPLAIN_CONCEPT.to_string(),
            extract_system: DEFAULT_EXTRACT_SYSTEM.to_string(),
            extract_concepts: DEFAULT_EXTRACT_CONCEPTS.to_string(),
        }
    }
}

impl PromptSet {
    /// Replaces the built-in templates with any found in `overrides`.
    ///
    /// Keys are the template names (`classify_intent`, `grade_answer`, ...).
    /// Unknown keys are ignored with a warning.
    pub fn with_overrides(mut self, overrides: HashMap<String, String>) -> Self {
        for (key, template) in overrides {
            let slot = match key.as_str() {
                CLASSIFY_INTENT => &mut self.classify_intent,
                GRADE_SYSTEM => &mut self.grade_system,
                GRADE_ANSWER => &mut self.grade_answer,
                SOCRATIC_QUESTION => &mut self.socratic_question,
                EXPLAIN_CONCEPT => &mut self.explain_concept,
                EXTRACT_SYSTEM => &mut self.extract_system,
                EXTRACT_CONCEPTS => &mut self.extract_concepts,
                _ => {
                    warn!(prompt = %key, "Ignoring unknown prompt template");
                    continue;
                }
            };
            *slot = template.trim().to_string();
        }
        self
    }
}

/// Fills `{name}` placeholders in `template` with the given values.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    vars.iter().fold(template.to_string(), |acc, (name, value)| {
        acc.replace(&format!("{{{name}}}"), value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_fills_every_occurrence() {
        let out = render(
            "Teach {target} after {prerequisite}; {prerequisite} first.",
            &[("target", "Glucose"), ("prerequisite", "Photosynthesis")],
        );
        assert_eq!(out, "Teach Glucose after Photosynthesis; Photosynthesis first.");
    }

    #[test]
    fn test_render_leaves_unknown_placeholders() {
        assert_eq!(render("{a} {b}", &[("a", "x")]), "x {b}");
    }

    #[test]
    fn test_overrides_replace_known_keys_only() {
        let mut overrides = HashMap::new();
        overrides.insert(GRADE_SYSTEM.to_string(), "You are a lenient examiner.\n".to_string());
        overrides.insert("not_a_prompt".to_string(), "ignored".to_string());

        let prompts = PromptSet::default().with_overrides(overrides);
        assert_eq!(prompts.grade_system, "You are a lenient examiner.");
        assert_eq!(prompts.explain_concept, DEFAULT_EXPLAIN_CONCEPT);
    }
}
