use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::models::ResultRecord;

/// Writes the result collection as one pretty-printed JSON array
#[derive(Debug, Clone)]
pub struct CorpusWriter {
    path: PathBuf,
    checkpoint: bool,
}

impl CorpusWriter {
    pub fn new(path: impl Into<PathBuf>, checkpoint: bool) -> Self {
        Self {
            path: path.into(),
            checkpoint,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist the records completed so far, when checkpointing is enabled
    pub fn checkpoint(&self, records: &[ResultRecord]) -> Result<()> {
        if !self.checkpoint {
            return Ok(());
        }
        tracing::debug!("Checkpointing {} record(s)", records.len());
        self.write(records)
    }

    /// Persist the complete collection
    pub fn finish(&self, records: &[ResultRecord]) -> Result<()> {
        self.write(records)?;
        tracing::info!(
            "Wrote {} record(s) to {}",
            records.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Replace the output file atomically so readers never see a half-written array
    fn write(&self, records: &[ResultRecord]) -> Result<()> {
        let content = format_as_json(records)?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs_err::create_dir_all(&dir)?;

        let mut file = tempfile::NamedTempFile::new_in(&dir)
            .context("Failed to create temporary output file")?;
        file.write_all(content.as_bytes())
            .context("Failed to write output")?;
        file.as_file().sync_all()?;
        file.persist(&self.path)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;

        Ok(())
    }
}

/// Render records as UTF-8 JSON with two-space indentation
pub fn format_as_json(records: &[ResultRecord]) -> Result<String> {
    serde_json::to_string_pretty(records).context("Failed to serialize records")
}

/// Read a corpus file back
pub fn load_records(path: &Path) -> Result<Vec<ResultRecord>> {
    let content = fs_err::read_to_string(path)?;
    serde_json::from_str(&content).context("Failed to parse corpus file")
}
