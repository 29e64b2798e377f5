//! The batch audit manifest (`manifest.json`).

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::models::ConversionOutcome;

/// Fixed manifest file name, written at the output root.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Audit record of one batch run. `total == ok + failed == results.len()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub generated_at: DateTime<Utc>,
    pub input_dir: String,
    pub output_dir: String,
    pub total: usize,
    pub ok: usize,
    pub failed: usize,
    pub results: Vec<ConversionOutcome>,
}

impl Manifest {
    pub fn new(input_dir: &Path, output_dir: &Path, results: Vec<ConversionOutcome>) -> Self {
        let ok = results.iter().filter(|r| r.ok).count();
        Self {
            generated_at: Utc::now(),
            input_dir: input_dir.display().to_string(),
            output_dir: output_dir.display().to_string(),
            total: results.len(),
            ok,
            failed: results.len() - ok,
            results,
        }
    }

    /// Write the manifest to `output_dir/manifest.json`, replacing any previous one.
    pub fn write(&self, output_dir: &Path) -> Result<PathBuf> {
        let path = output_dir.join(MANIFEST_FILE);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write manifest: {}", path.display()))?;
        Ok(path)
    }

    pub fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
        Ok(serde_json::from_str(&content)?)
    }
}
