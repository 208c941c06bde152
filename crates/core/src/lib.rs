//! Prerequisite-aware tutoring over a concept graph.
//!
//! A student's request is mapped to a concept; before the concept is taught,
//! each unmastered direct prerequisite is examined in turn, and passing an
//! examination is recorded durably in the mastery ledger.

pub mod concept;
pub mod error;
pub mod grader;
pub mod ingest;
pub mod intent;
pub mod ledger;
pub mod llm_client;
pub mod prompts;
pub mod store;
pub mod tutor;

pub use error::{Result, TutorError};
pub use tutor::{SessionState, TutorConfig, TutorServices, TutorSession};
