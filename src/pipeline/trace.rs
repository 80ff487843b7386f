// Render cycle tracing
// Append-only JSONL trace file recording each stage transition of a render

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::render::NUM_COLUMNS;

/// Errors that can occur during trace operations
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Stages of a render cycle, in the order they are reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderStage {
    Idle,
    SilenceGenerated,
    /// Number of columns rendered so far (1..=8)
    ColumnsRendered(u8),
    Joined,
    Written,
    Amplified,
    Failed,
}

impl RenderStage {
    /// Fraction of the cycle completed on reaching this stage.
    /// `Failed` reports no progress.
    pub fn progress(&self) -> f32 {
        match self {
            RenderStage::Idle | RenderStage::Failed => 0.0,
            RenderStage::SilenceGenerated => 0.05,
            RenderStage::ColumnsRendered(k) => {
                let k = (*k as usize).min(NUM_COLUMNS) as f32;
                0.05 + 0.075 * k
            }
            RenderStage::Joined => 0.7,
            RenderStage::Written => 0.85,
            RenderStage::Amplified => 1.0,
        }
    }
}

/// A single line of the render trace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    /// RFC 3339 timestamp of when this entry was created
    pub timestamp: String,

    pub stage: RenderStage,

    /// Progress in [0.0, 1.0]
    pub progress: f32,

    pub message: String,

    /// Optional structured data (sample counts, paths, hashes)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl TraceEntry {
    /// Create a new trace entry with current timestamp
    pub fn new(stage: RenderStage, message: String) -> Self {
        TraceEntry {
            timestamp: Utc::now().to_rfc3339(),
            stage,
            progress: stage.progress().clamp(0.0, 1.0),
            message,
            data: None,
        }
    }

    pub fn with_data(stage: RenderStage, message: String, data: serde_json::Value) -> Self {
        TraceEntry {
            data: Some(data),
            ..Self::new(stage, message)
        }
    }

    /// Serialize to JSON line (with newline)
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(format!("{}\n", json))
    }
}

/// Append-only writer for `trace.jsonl`
#[derive(Debug, Clone)]
pub struct TraceWriter {
    file_path: PathBuf,
}

impl TraceWriter {
    pub fn new(file_path: PathBuf) -> Self {
        TraceWriter { file_path }
    }

    /// Append a trace entry to the file
    /// Creates file if it doesn't exist
    pub fn write(&self, entry: &TraceEntry) -> Result<(), TraceError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)?;

        let json_line = entry.to_json_line()?;
        file.write_all(json_line.as_bytes())?;
        file.flush()?;

        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }
}

/// Helper builder for creating trace entries
pub struct TraceBuilder {
    stage: RenderStage,
}

impl TraceBuilder {
    pub fn stage(stage: RenderStage) -> Self {
        TraceBuilder { stage }
    }

    pub fn entry(self, message: impl Into<String>) -> TraceEntry {
        TraceEntry::new(self.stage, message.into())
    }

    pub fn with_data(self, message: impl Into<String>, data: serde_json::Value) -> TraceEntry {
        TraceEntry::with_data(self.stage, message.into(), data)
    }
}

/// Read trace entries from a JSONL file
pub fn read_trace_file(path: &Path) -> Result<Vec<TraceEntry>, TraceError> {
    let contents = std::fs::read_to_string(path)?;
    let mut entries = Vec::new();

    for line in contents.lines() {
        if line.trim().is_empty() {
            continue;
        }

        let entry: TraceEntry = serde_json::from_str(line)?;
        entries.push(entry);
    }

    Ok(entries)
}
