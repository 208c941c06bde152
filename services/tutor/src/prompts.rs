//! Loads prompt template overrides from a directory of Markdown files.

use anyhow::{Context, Result};
use edugraph_core::prompts::PromptSet;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::info;

/// Builds the prompt set: built-in defaults, overridden by `<key>.md` files
/// found in `prompts_path`. A missing directory means defaults only.
pub fn load_prompts(prompts_path: &Path) -> Result<PromptSet> {
    if !prompts_path.is_dir() {
        info!(path = %prompts_path.display(), "No prompts directory, using built-in prompts");
        return Ok(PromptSet::default());
    }

    let mut overrides = HashMap::new();
    for entry in fs::read_dir(prompts_path)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("md") {
            let prompt_key = path
                .file_stem()
                .and_then(|s| s.to_str())
                .context("Could not get file stem")?
                .to_string();
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read prompt {}", path.display()))?;
            overrides.insert(prompt_key, content);
        }
    }

    info!(path = %prompts_path.display(), count = overrides.len(), "Prompt overrides loaded");
    Ok(PromptSet::default().with_overrides(overrides))
}
