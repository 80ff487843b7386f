// Workspace file layout and artifact hashing
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::render::CompositionGrid;

const SILENCE_FILE: &str = "none.wav";
const OUTPUT_FILE: &str = "output.wav";
const AMPLIFIED_FILE: &str = "output_amplified.wav";
const GRID_FILE: &str = "grid.json";
const TRACE_FILE: &str = "trace.jsonl";
const CONFIG_FILE: &str = "gridbeat.json";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Grid file error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to get app data directory")]
    NoAppDataDir,
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Directory holding slot recordings, the silence filler, and rendered output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `<data dir>/gridbeat`, used when no workspace is given
    pub fn default_root() -> StorageResult<PathBuf> {
        let data_dir = dirs::data_dir().ok_or(StorageError::NoAppDataDir)?;
        Ok(data_dir.join("gridbeat"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the workspace directory if needed
    pub fn ensure(&self) -> StorageResult<()> {
        fs::create_dir_all(&self.root)?;
        Ok(())
    }

    /// Recording for a sound slot: `{slot}.wav`
    pub fn slot_path(&self, slot: usize) -> PathBuf {
        self.root.join(format!("{}.wav", slot))
    }

    pub fn silence_path(&self) -> PathBuf {
        self.root.join(SILENCE_FILE)
    }

    pub fn output_path(&self) -> PathBuf {
        self.root.join(OUTPUT_FILE)
    }

    pub fn amplified_path(&self) -> PathBuf {
        self.root.join(AMPLIFIED_FILE)
    }

    pub fn grid_path(&self) -> PathBuf {
        self.root.join(GRID_FILE)
    }

    pub fn trace_path(&self) -> PathBuf {
        self.root.join(TRACE_FILE)
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    /// Load the saved grid; an absent file is an empty grid
    pub fn load_grid(&self) -> StorageResult<CompositionGrid> {
        let path = self.grid_path();
        if !path.exists() {
            return Ok(CompositionGrid::default());
        }
        let data = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn save_grid(&self, grid: &CompositionGrid) -> StorageResult<()> {
        self.ensure()?;
        let json = serde_json::to_string_pretty(grid)?;
        fs::write(self.grid_path(), json)?;
        Ok(())
    }
}

/// Calculate SHA256 hash of data
pub fn calculate_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// SHA256 of a file on disk
pub fn hash_file(path: &Path) -> StorageResult<String> {
    let data = fs::read(path)?;
    Ok(calculate_sha256(&data))
}
