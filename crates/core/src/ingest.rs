//! Batch Ingestion
//!
//! Populates the concept graph from prose: a language model extracts
//! `{concept, definition, prerequisite}` records, which are then merged into
//! the store. Edges that would make a concept (transitively) require itself
//! are rejected here, so the tutor never sees a prerequisite cycle.

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, LazyLock};
use tracing::{info, warn};

use crate::concept::same_concept;
use crate::error::{Result, TutorError};
use crate::llm_client::{CompletionRequest, CompletionService, DETERMINISTIC, strip_thinking};
use crate::prompts::{PromptSet, render};
use crate::store::ConceptStore;

static JSON_LIST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\[.*\]").expect("valid JSON list pattern"));
static JSON_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("valid JSON object pattern"));

/// One record produced by the extraction model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedConcept {
    pub concept: String,
    pub definition: String,
    pub prerequisite: Option<String>,
}

#[derive(Deserialize)]
struct RawRecord {
    concept: String,
    #[serde(default)]
    definition: Option<String>,
    #[serde(default)]
    prerequisite: Option<String>,
}

impl From<RawRecord> for ExtractedConcept {
    fn from(raw: RawRecord) -> Self {
        let prerequisite = raw
            .prerequisite
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty() && !p.eq_ignore_ascii_case("none"));
        Self {
            concept: raw.concept.trim().to_string(),
            definition: raw.definition.unwrap_or_default().trim().to_string(),
            prerequisite,
        }
    }
}

/// Counts of what an ingestion pass wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub concepts: usize,
    pub edges: usize,
    pub rejected_edges: usize,
}

/// Turns prose into concept records.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConceptExtractor: Send + Sync {
    async fn extract(&self, text: &str) -> Result<Vec<ExtractedConcept>>;
}

/// A `ConceptExtractor` that prompts the completion service for a JSON list.
pub struct LlmConceptExtractor {
    llm: Arc<dyn CompletionService>,
    prompts: Arc<PromptSet>,
}

impl LlmConceptExtractor {
    pub fn new(llm: Arc<dyn CompletionService>, prompts: Arc<PromptSet>) -> Self {
        Self { llm, prompts }
    }
}

#[async_trait]
impl ConceptExtractor for LlmConceptExtractor {
    async fn extract(&self, text: &str) -> Result<Vec<ExtractedConcept>> {
        let prompt = render(&self.prompts.extract_concepts, &[("text", text)]);
        info!("Asking the model to extract concepts");
        let raw = self
            .llm
            .complete(CompletionRequest::new(
                Some(&self.prompts.extract_system),
                prompt,
                DETERMINISTIC,
            ))
            .await
            .map_err(TutorError::external("extracting concepts"))?;
        parse_extraction(&raw)
    }
}

/// Pulls concept records out of free-form model output.
///
/// The outermost JSON list wins; a lone JSON object is accepted as a list of
/// one. Elements that do not look like a record are dropped individually.
pub fn parse_extraction(raw: &str) -> Result<Vec<ExtractedConcept>> {
    let cleaned = strip_thinking(raw);
    let values: Vec<serde_json::Value> = if let Some(list) = JSON_LIST.find(&cleaned) {
        serde_json::from_str(list.as_str())
            .map_err(|e| TutorError::MalformedExtraction(format!("{e}; raw output: {cleaned}")))?
    } else if let Some(object) = JSON_OBJECT.find(&cleaned) {
        let value = serde_json::from_str(object.as_str())
            .map_err(|e| TutorError::MalformedExtraction(format!("{e}; raw output: {cleaned}")))?;
        vec![value]
    } else {
        return Err(TutorError::MalformedExtraction(format!(
            "no JSON found; raw output: {cleaned}"
        )));
    };

    let records = values
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<RawRecord>(value.clone()) {
            Ok(raw) => Some(ExtractedConcept::from(raw)),
            Err(e) => {
                warn!(error = %e, record = %value, "Dropping malformed extraction record");
                None
            }
        })
        .filter(|record| !record.concept.is_empty())
        .collect();
    Ok(records)
}

/// Writes extracted records into the store.
pub async fn ingest_records(
    store: &dyn ConceptStore,
    records: &[ExtractedConcept],
) -> anyhow::Result<IngestReport> {
    let mut report = IngestReport::default();

    for record in records {
        info!(concept = %record.concept, "Processing concept");
        store
            .upsert_concept(&record.concept, &record.definition)
            .await?;
        report.concepts += 1;

        let Some(prerequisite) = &record.prerequisite else {
            continue;
        };
        if same_concept(&record.concept, prerequisite)
            || reaches(store, prerequisite, &record.concept).await?
        {
            warn!(
                concept = %record.concept,
                %prerequisite,
                "Rejecting requires edge that would create a cycle"
            );
            report.rejected_edges += 1;
            continue;
        }

        store.upsert_requires(&record.concept, prerequisite).await?;
        info!(concept = %record.concept, %prerequisite, "Linked concept -> REQUIRES -> prerequisite");
        report.edges += 1;
    }

    Ok(report)
}

/// Extracts records from `text` and ingests them.
///
/// Unusable model output is logged and ingests nothing.
pub async fn ingest_text(
    extractor: &dyn ConceptExtractor,
    store: &dyn ConceptStore,
    text: &str,
) -> Result<IngestReport> {
    let records = match extractor.extract(text).await {
        Ok(records) => records,
        Err(TutorError::MalformedExtraction(reason)) => {
            warn!(%reason, "Extraction produced no usable records");
            return Ok(IngestReport::default());
        }
        Err(e) => return Err(e),
    };
    info!(count = records.len(), "Extracted concepts");

    let report = ingest_records(store, &records)
        .await
        .map_err(TutorError::external("writing the concept graph"))?;
    info!(?report, "Graph ingestion complete");
    Ok(report)
}

/// Whether `goal` is reachable from `start` by following requires edges.
async fn reaches(store: &dyn ConceptStore, start: &str, goal: &str) -> anyhow::Result<bool> {
    let mut visited: HashSet<String> = HashSet::new();
    let mut queue = VecDeque::from([start.to_string()]);

    while let Some(current) = queue.pop_front() {
        if same_concept(&current, goal) {
            return Ok(true);
        }
        if !visited.insert(current.to_lowercase()) {
            continue;
        }
        if let Some(ctx) = store.get_context(&current).await? {
            queue.extend(ctx.prerequisites);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::MockCompletionService;
    use crate::store::SqliteConceptStore;

    fn record(concept: &str, definition: &str, prerequisite: Option<&str>) -> ExtractedConcept {
        ExtractedConcept {
            concept: concept.to_string(),
            definition: definition.to_string(),
            prerequisite: prerequisite.map(String::from),
        }
    }

    #[test]
    fn test_parse_list_surrounded_by_prose() {
        let raw = r#"<think>Let me see.</think>Here you go:
        [
          {"concept": "Glucose", "definition": "A sugar.", "prerequisite": "Photosynthesis"},
          {"concept": "Energy", "definition": "The capacity to do work.", "prerequisite": null},
          {"concept": "Light Energy", "definition": "Energy from the sun.", "prerequisite": "None"}
        ]
        Hope that helps!"#;

        let records = parse_extraction(raw).unwrap();
        assert_eq!(
            records,
            vec![
                record("Glucose", "A sugar.", Some("Photosynthesis")),
                record("Energy", "The capacity to do work.", None),
                record("Light Energy", "Energy from the sun.", None),
            ]
        );
    }

    #[test]
    fn test_parse_single_object() {
        let raw = r#"{"concept": "Photosynthesis", "definition": "Plants make glucose.", "prerequisite": "Light Energy"}"#;
        let records = parse_extraction(raw).unwrap();
        assert_eq!(
            records,
            vec![record("Photosynthesis", "Plants make glucose.", Some("Light Energy"))]
        );
    }

    #[test]
    fn test_parse_drops_bad_elements_only() {
        let raw = r#"[{"concept": "Glucose"}, {"name": "Oops"}, 42, {"concept": "  "}]"#;
        let records = parse_extraction(raw).unwrap();
        assert_eq!(records, vec![record("Glucose", "", None)]);
    }

    #[test]
    fn test_parse_without_json_is_malformed() {
        let err = parse_extraction("I could not find any concepts.").unwrap_err();
        assert!(matches!(err, TutorError::MalformedExtraction(_)));

        let err = parse_extraction("[{\"concept\": \"Glucose\",]").unwrap_err();
        assert!(matches!(err, TutorError::MalformedExtraction(_)));
    }

    #[tokio::test]
    async fn test_ingest_records_builds_chain() {
        let store = SqliteConceptStore::connect("sqlite::memory:").await.unwrap();
        let records = vec![
            record("Cellular Respiration", "Cells generate power.", Some("Glucose")),
            record("Glucose", "A sugar.", Some("Photosynthesis")),
            record("Photosynthesis", "Plants make glucose.", Some("Light Energy")),
            record("Light Energy", "Energy from the sun.", Some("Energy")),
            record("Energy", "The capacity to do work.", None),
        ];

        let report = ingest_records(&store, &records).await.unwrap();
        assert_eq!(
            report,
            IngestReport {
                concepts: 5,
                edges: 4,
                rejected_edges: 0
            }
        );

        let glucose = store.get_context("glucose").await.unwrap().unwrap();
        assert_eq!(glucose.definition, "A sugar.");
        assert_eq!(glucose.prerequisites, vec!["Photosynthesis"]);
        assert_eq!(store.list_all_concept_names().await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_ingest_rejects_cycles_and_self_edges() {
        let store = SqliteConceptStore::connect("sqlite::memory:").await.unwrap();
        let records = vec![
            record("A", "first", Some("B")),
            record("B", "second", Some("C")),
            record("C", "third", Some("a")),
            record("D", "fourth", Some("d")),
        ];

        let report = ingest_records(&store, &records).await.unwrap();
        assert_eq!(report.edges, 2);
        assert_eq!(report.rejected_edges, 2);

        let c = store.get_context("C").await.unwrap().unwrap();
        assert!(c.prerequisites.is_empty());
    }

    #[tokio::test]
    async fn test_ingest_text_end_to_end() {
        let mut llm = MockCompletionService::new();
        llm.expect_complete()
            .withf(|req| {
                req.temperature == DETERMINISTIC
                    && req.system_prompt() == Some("You are a Knowledge Graph extraction engine.")
                    && req
                        .last_user_prompt()
                        .is_some_and(|p| p.contains("TEXT: Glucose comes from photosynthesis."))
            })
            .returning(|_| {
                Ok(r#"[{"concept": "Glucose", "definition": "A sugar.", "prerequisite": "Photosynthesis"}]"#
                    .to_string())
            });
        let extractor = LlmConceptExtractor::new(Arc::new(llm), Arc::new(PromptSet::default()));
        let store = SqliteConceptStore::connect("sqlite::memory:").await.unwrap();

        let report = ingest_text(&extractor, &store, "Glucose comes from photosynthesis.")
            .await
            .unwrap();
        assert_eq!(report.concepts, 1);
        assert_eq!(report.edges, 1);
        assert!(store.get_context("Photosynthesis").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_ingest_text_tolerates_malformed_output() {
        let mut extractor = MockConceptExtractor::new();
        extractor
            .expect_extract()
            .returning(|_| Err(TutorError::MalformedExtraction("no JSON found".to_string())));
        let store = SqliteConceptStore::connect("sqlite::memory:").await.unwrap();

        let report = ingest_text(&extractor, &store, "anything").await.unwrap();
        assert_eq!(report, IngestReport::default());
        assert!(store.list_all_concept_names().await.unwrap().is_empty());
    }
}
