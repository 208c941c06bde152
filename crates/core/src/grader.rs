//! Answer Grader
//!
//! Decides whether a student's answer demonstrates mastery of a prerequisite.
//! Grading fails closed: anything other than an explicit YES is a fail.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::llm_client::{CompletionRequest, CompletionService, DETERMINISTIC, clean_output};
use crate::prompts::{PromptSet, render};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AnswerGrader: Send + Sync {
    async fn grade(&self, prerequisite: &str, answer: &str) -> Result<bool>;
}

/// An `AnswerGrader` that puts the completion service in a strict examiner role.
pub struct LlmAnswerGrader {
    llm: Arc<dyn CompletionService>,
    prompts: Arc<PromptSet>,
}

impl LlmAnswerGrader {
    pub fn new(llm: Arc<dyn CompletionService>, prompts: Arc<PromptSet>) -> Self {
        Self { llm, prompts }
    }
}

#[async_trait]
impl AnswerGrader for LlmAnswerGrader {
    async fn grade(&self, prerequisite: &str, answer: &str) -> Result<bool> {
        let prompt = render(
            &self.prompts.grade_answer,
            &[("prerequisite", prerequisite), ("answer", answer)],
        );
        let raw = self
            .llm
            .complete(CompletionRequest::new(
                Some(&self.prompts.grade_system),
                prompt,
                DETERMINISTIC,
            ))
            .await?;

        let passed = verdict_from_response(&raw);
        debug!(%prerequisite, passed, "Answer graded");
        Ok(passed)
    }
}

/// Pass iff the cleaned response contains the word `YES` in any case.
pub fn verdict_from_response(raw: &str) -> bool {
    clean_output(raw)
        .to_uppercase()
        .split(|c: char| !c.is_alphanumeric())
        .any(|token| token == "YES")
}
