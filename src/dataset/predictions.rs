//! Predictions JSONL file handling

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use super::types::Prediction;

/// Append one prediction to a JSONL file, creating it if needed
pub fn append_prediction(path: &Path, prediction: &Prediction) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create '{}'", parent.display()))?;
    }

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open '{}'", path.display()))?;

    let line = serde_json::to_string(prediction)?;
    writeln!(file, "{}", line)?;
    Ok(())
}

/// Load all predictions from a JSONL file, skipping malformed lines
pub fn load_predictions(path: &Path) -> Result<Vec<Prediction>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read '{}'", path.display()))?;

    let mut predictions = Vec::new();
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<Prediction>(trimmed) {
            Ok(pred) => predictions.push(pred),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping malformed line");
            }
        }
    }

    Ok(predictions)
}
