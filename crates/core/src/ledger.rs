//! Mastery Ledger
//!
//! The durable set of concepts the student has mastered. The set only grows;
//! every addition is written through to storage before the call returns.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::concept::same_concept;

pub trait MasteryLedger: Send {
    /// Case-insensitive membership test.
    fn is_mastered(&self, name: &str) -> bool;

    /// Records `name` as mastered and persists the whole set.
    ///
    /// Returns `Ok(false)` when the concept was already mastered. On error the
    /// ledger is left exactly as it was before the call.
    fn mark_mastered(&mut self, name: &str) -> Result<bool>;

    /// Mastered names in the order they were acquired.
    fn mastered(&self) -> Vec<String>;
}

/// A `MasteryLedger` stored as a JSON array of names in one local file.
#[derive(Debug)]
pub struct JsonFileLedger {
    path: PathBuf,
    names: Vec<String>,
}

impl JsonFileLedger {
    /// Reads the ledger at `path`. A missing file is an empty ledger.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let names = if path.exists() {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read progress file {}", path.display()))?;
            let stored: Vec<String> = serde_json::from_str(&raw)
                .with_context(|| format!("Progress file {} is not a JSON list", path.display()))?;
            dedup_case_insensitive(stored)
        } else {
            Vec::new()
        };

        info!(path = %path.display(), mastered = ?names, "Progress loaded");
        Ok(Self { path, names })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<()> {
        let json = serde_json::to_string(&self.names)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, json)
            .with_context(|| format!("Failed to write progress file {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace progress file {}", self.path.display()))?;
        Ok(())
    }
}

impl MasteryLedger for JsonFileLedger {
    fn is_mastered(&self, name: &str) -> bool {
        self.names.iter().any(|m| same_concept(m, name))
    }

    fn mark_mastered(&mut self, name: &str) -> Result<bool> {
        if self.is_mastered(name) {
            return Ok(false);
        }

        self.names.push(name.trim().to_string());
        if let Err(e) = self.persist() {
            self.names.pop();
            return Err(e);
        }

        info!(concept = %name, "Progress saved");
        Ok(true)
    }

    fn mastered(&self) -> Vec<String> {
        self.names.clone()
    }
}

fn dedup_case_insensitive(names: Vec<String>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        if !unique.iter().any(|u| same_concept(u, &name)) {
            unique.push(name);
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_empty_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = JsonFileLedger::load(dir.path().join("progress.json")).unwrap();
        assert!(ledger.mastered().is_empty());
        assert!(!ledger.is_mastered("Glucose"));
    }

    #[test]
    fn test_mark_mastered_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.json");

        let mut ledger = JsonFileLedger::load(&path).unwrap();
        assert_eq!(ledger.path(), path.as_path());
        assert!(ledger.mark_mastered("Glucose").unwrap());
        assert!(ledger.mark_mastered("Light Energy").unwrap());
        assert!(!ledger.mark_mastered("glucose").unwrap());

        let on_disk: Vec<String> =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk, vec!["Glucose", "Light Energy"]);

        let reloaded = JsonFileLedger::load(&path).unwrap();
        assert!(reloaded.is_mastered("GLUCOSE"));
        assert!(reloaded.is_mastered("light energy"));
        assert_eq!(reloaded.mastered(), ledger.mastered());
    }

    #[test]
    fn test_load_collapses_case_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.json");
        fs::write(&path, r#"["Energy", "energy", "Glucose"]"#).unwrap();

        let ledger = JsonFileLedger::load(&path).unwrap();
        assert_eq!(ledger.mastered(), vec!["Energy", "Glucose"]);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.json");
        fs::write(&path, "{not json").unwrap();

        assert!(JsonFileLedger::load(&path).is_err());
    }

    #[test]
    fn test_failed_persist_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("progress.json");

        let mut ledger = JsonFileLedger::load(&path).unwrap();
        assert!(ledger.mark_mastered("Glucose").is_err());
        assert!(!ledger.is_mastered("Glucose"));
        assert!(ledger.mastered().is_empty());
    }
}
