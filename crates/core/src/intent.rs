//! Intent Classifier
//!
//! Maps a free-text student utterance onto one of the known concept names.
//! The answer is best-effort and unvalidated: callers must cope with a name
//! the concept store has never heard of.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::llm_client::{CompletionRequest, CompletionService, DETERMINISTIC, clean_output};
use crate::prompts::{PromptSet, render};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    /// Returns the concept the utterance is about, or `None`.
    async fn classify(&self, utterance: &str, known_concepts: &[String]) -> Result<Option<String>>;
}

/// An `IntentClassifier` that asks the completion service at temperature 0.
pub struct LlmIntentClassifier {
    llm: Arc<dyn CompletionService>,
    prompts: Arc<PromptSet>,
}

impl LlmIntentClassifier {
    pub fn new(llm: Arc<dyn CompletionService>, prompts: Arc<PromptSet>) -> Self {
        Self { llm, prompts }
    }
}

#[async_trait]
impl IntentClassifier for LlmIntentClassifier {
    async fn classify(&self, utterance: &str, known_concepts: &[String]) -> Result<Option<String>> {
        let concepts = serde_json::to_string(known_concepts)?;
        let prompt = render(
            &self.prompts.classify_intent,
            &[("utterance", utterance), ("concepts", concepts.as_str())],
        );

        let raw = self
            .llm
            .complete(CompletionRequest::new(None, prompt, DETERMINISTIC))
            .await?;
        let topic = normalize_topic(&raw);
        debug!(%utterance, ?topic, "Intent classified");
        Ok(topic)
    }
}

/// Cleans a classifier answer down to a bare concept name.
pub fn normalize_topic(raw: &str) -> Option<String> {
    let cleaned = clean_output(raw);
    let name = cleaned
        .trim()
        .trim_start_matches(is_quote)
        .trim_end_matches(|c| is_quote(c) || matches!(c, '.' | ',' | ';' | ':' | '!' | '?'))
        .trim();

    if name.is_empty() || name.eq_ignore_ascii_case("none") {
        None
    } else {
        Some(name.to_string())
    }
}

fn is_quote(c: char) -> bool {
    matches!(c, '"' | '\'' | '`')
}
