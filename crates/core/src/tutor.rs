//! Tutoring Session
//!
//! The per-turn state machine. Before a concept is taught, each of its direct
//! prerequisites must be in the mastery ledger; the first one that is not
//! becomes the subject of an examination. While examining, the student can
//! answer (graded), ask for help (hint), or switch to another topic (the
//! examination is dropped).
//!
//! A turn either fully succeeds or leaves the session as it found it: the next
//! state is committed only after every external call of the turn returned.

use fuzzy_matcher::{FuzzyMatcher, skim::SkimMatcherV2};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::concept::{ConceptContext, same_concept};
use crate::error::{Result, TutorError};
use crate::grader::AnswerGrader;
use crate::intent::IntentClassifier;
use crate::ledger::MasteryLedger;
use crate::llm_client::{CompletionRequest, CompletionService, clean_output};
use crate::prompts::{PromptSet, render};
use crate::store::ConceptStore;

/// Where the session is in the teach/examine cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    /// No examination in progress.
    #[default]
    Teaching,
    /// The student is being tested on `prerequisite` before the original topic.
    Examining { prerequisite: String },
}

impl SessionState {
    /// The prerequisite under examination, if any.
    pub fn testing_prerequisite(&self) -> Option<&str> {
        match self {
            Self::Teaching => None,
            Self::Examining { prerequisite } => Some(prerequisite),
        }
    }

    pub fn is_examining(&self) -> bool {
        matches!(self, Self::Examining { .. })
    }
}

#[derive(Debug, Clone)]
pub struct TutorConfig {
    /// Temperature for explanations and Socratic questions.
    pub teaching_temperature: f32,
    /// Lower-case phrases that turn an examination answer into a request for a hint.
    pub help_phrases: Vec<String>,
    /// How many known topics the "not found" guidance suggests.
    pub example_topics: usize,
}

impl Default for TutorConfig {
    fn default() -> Self {
        Self {
            teaching_temperature: 0.3,
            help_phrases: ["what is", "don't know", "help", "tell me"]
                .into_iter()
                .map(String::from)
                .collect(),
            example_topics: 3,
        }
    }
}

/// The collaborators a session talks to.
#[derive(Clone)]
pub struct TutorServices {
    pub store: Arc<dyn ConceptStore>,
    pub classifier: Arc<dyn IntentClassifier>,
    pub grader: Arc<dyn AnswerGrader>,
    pub llm: Arc<dyn CompletionService>,
    pub prompts: Arc<PromptSet>,
}

/// One student's tutoring conversation.
pub struct TutorSession {
    services: TutorServices,
    ledger: Box<dyn MasteryLedger>,
    config: TutorConfig,
    state: SessionState,
}

impl TutorSession {
    pub fn new(services: TutorServices, ledger: Box<dyn MasteryLedger>, config: TutorConfig) -> Self {
        Self {
            services,
            ledger,
            config,
            state: SessionState::Teaching,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn ledger(&self) -> &dyn MasteryLedger {
        self.ledger.as_ref()
    }

    /// Processes one student utterance and returns the tutor's reply.
    #[instrument(name = "turn", skip_all, fields(state = ?self.state))]
    pub async fn respond(&mut self, utterance: &str) -> Result<String> {
        let known = self
            .services
            .store
            .list_all_concept_names()
            .await
            .map_err(TutorError::external("listing concepts"))?;
        let detected = self
            .services
            .classifier
            .classify(utterance, &known)
            .await
            .map_err(TutorError::external("classifying intent"))?;
        info!(?detected, "Topic detected");

        if let SessionState::Examining { prerequisite } = &self.state {
            match detected.as_deref() {
                Some(topic) if !same_concept(topic, prerequisite) => {
                    info!(from = %prerequisite, to = %topic, "Switching topics, examination abandoned");
                }
                _ => {
                    let prerequisite = prerequisite.clone();
                    return self.continue_examination(&prerequisite, utterance).await;
                }
            }
        }

        let (reply, next) = self.teach(detected.as_deref(), utterance, &known).await?;
        if next != self.state {
            info!(from = ?self.state, to = ?next, "Session state changed");
        }
        self.state = next;
        Ok(reply)
    }

    /// Closes the store connection. The ledger has no pending writes.
    pub async fn shutdown(self) {
        self.services.store.close().await;
        info!(mastered = ?self.ledger.mastered(), "Tutoring session closed");
    }

    async fn continue_examination(&mut self, prerequisite: &str, utterance: &str) -> Result<String> {
        if self.asks_for_help(utterance) {
            let definition = self.definition_of(prerequisite).await?;
            return Ok(help_hint(prerequisite, &definition));
        }

        let passed = self
            .services
            .grader
            .grade(prerequisite, utterance)
            .await
            .map_err(TutorError::external("grading an answer"))?;

        if !passed {
            let definition = self.definition_of(prerequisite).await?;
            return Ok(corrective_hint(prerequisite, &definition));
        }

        self.ledger
            .mark_mastered(prerequisite)
            .map_err(|source| TutorError::Persistence {
                concept: prerequisite.to_string(),
                source,
            })?;
        info!(concept = %prerequisite, "Prerequisite mastered");
        self.state = SessionState::Teaching;
        Ok(format!(
            "Excellent! You've mastered {prerequisite}. What would you like to know about the main topic?"
        ))
    }

    /// A teaching pass: examine the first unmastered prerequisite of `target`,
    /// or explain `target` itself when there is none.
    async fn teach(
        &self,
        target: Option<&str>,
        utterance: &str,
        known: &[String],
    ) -> Result<(String, SessionState)> {
        let context = match target {
            Some(target) => self.context_of(target).await?,
            None => None,
        };
        let Some(context) = context else {
            warn!(requested = ?target, "Requested concept is not in the graph");
            return Ok((self.guidance(utterance, known), SessionState::Teaching));
        };

        let unmastered: Vec<&String> = context
            .prerequisites
            .iter()
            .filter(|p| !self.ledger.is_mastered(p.as_str()))
            .collect();
        info!(
            concept = %context.name,
            mastered = ?self.ledger.mastered(),
            ?unmastered,
            "Targeting concept"
        );

        match unmastered.first() {
            Some(prerequisite) => {
                let definition = self.definition_of(prerequisite.as_str()).await?;
                let system = render(
                    &self.services.prompts.socratic_question,
                    &[
                        ("target", context.name.as_str()),
                        ("prerequisite", prerequisite.as_str()),
                        ("definition", definition.as_str()),
                    ],
                );
                let question = self.generate(&system, utterance).await?;
                Ok((
                    question,
                    SessionState::Examining {
                        prerequisite: prerequisite.to_string(),
                    },
                ))
            }
            None => {
                let system = render(
                    &self.services.prompts.explain_concept,
                    &[
                        ("target", context.name.as_str()),
                        ("definition", context.definition.as_str()),
                    ],
                );
                let explanation = self.generate(&system, utterance).await?;
                Ok((explanation, SessionState::Teaching))
            }
        }
    }

    async fn context_of(&self, name: &str) -> Result<Option<ConceptContext>> {
        self.services
            .store
            .get_context(name)
            .await
            .map_err(TutorError::external("looking up a concept"))
    }

    async fn definition_of(&self, name: &str) -> Result<String> {
        Ok(self
            .context_of(name)
            .await?
            .map(|ctx| ctx.definition)
            .unwrap_or_default())
    }

    async fn generate(&self, system: &str, utterance: &str) -> Result<String> {
        let raw = self
            .services
            .llm
            .complete(CompletionRequest::new(
                Some(system),
                utterance,
                self.config.teaching_temperature,
            ))
            .await
            .map_err(TutorError::external("generating a reply"))?;
        Ok(clean_output(&raw))
    }

    fn asks_for_help(&self, utterance: &str) -> bool {
        let lowered = utterance.to_lowercase();
        self.config
            .help_phrases
            .iter()
            .any(|phrase| lowered.contains(phrase.as_str()))
    }

    fn guidance(&self, utterance: &str, known: &[String]) -> String {
        if known.is_empty() {
            return "I don't have any concepts in my graph yet. Ingest some study material first."
                .to_string();
        }
        let examples = suggest_topics(utterance, known, self.config.example_topics);
        format!("I don't have that in my graph. Try {}.", quoted_list(&examples))
    }
}

fn help_hint(prerequisite: &str, definition: &str) -> String {
    let definition = definition.trim().trim_end_matches('.');
    if definition.is_empty() {
        format!("That's okay! Try describing {prerequisite} in your own words, even partially.")
    } else {
        format!(
            "That's okay! {definition}. Now, how does {prerequisite} connect to what you asked about?"
        )
    }
}

fn corrective_hint(prerequisite: &str, definition: &str) -> String {
    let first_sentence = first_sentence(definition);
    if first_sentence.is_empty() {
        format!("Not quite. Focus on {prerequisite}. Try again?")
    } else {
        format!("Not quite. Focus on {prerequisite}. (Hint: {first_sentence}.) Try again?")
    }
}

/// Text up to the first `.`, `!` or `?` that is followed by whitespace or ends
/// the text. Decimal points like `2.5` do not end a sentence.
fn first_sentence(text: &str) -> &str {
    let text = text.trim();
    let end = text
        .char_indices()
        .find(|&(i, c)| {
            matches!(c, '.' | '!' | '?') && text[i + 1..].starts_with(char::is_whitespace)
        })
        .map_or(text.len(), |(i, _)| i);
    text[..end].trim_end_matches(['.', '!', '?']).trim()
}

/// Picks up to `limit` known names, closest to the words of `utterance` first.
fn suggest_topics(utterance: &str, known: &[String], limit: usize) -> Vec<String> {
    let matcher = SkimMatcherV2::default().ignore_case();
    let words: Vec<&str> = utterance
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() >= 3)
        .collect();

    let mut scored: Vec<(i64, &String)> = known
        .iter()
        .map(|name| {
            let score = words
                .iter()
                .filter_map(|word| matcher.fuzzy_match(name, word))
                .max()
                .unwrap_or(0);
            (score, name)
        })
        .collect();
    // Stable: equal scores keep store order.
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored
        .into_iter()
        .take(limit)
        .map(|(_, name)| name.clone())
        .collect()
}

fn quoted_list(names: &[String]) -> String {
    let quoted: Vec<String> = names.iter().map(|n| format!("'{n}'")).collect();
    match quoted.as_slice() {
        [] => String::new(),
        [only] => only.clone(),
        [init @ .., last] => {
            let separator = if init.len() > 1 { ", or " } else { " or " };
            format!("{}{separator}{last}", init.join(", "))
        }
    }
}
