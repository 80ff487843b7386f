// Sequencer configuration
// JSON settings for capture length, transfer sizing, and post-processing

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::audio::{COMPOSITION_SAMPLE_RATE, MAX_SAMPLES};
use crate::render::{AmplifyMode, NUM_COLUMNS};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Settings shared by recording and rendering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencerConfig {
    /// Sample rate of recorded slots, silence filler, and output
    pub sample_rate: u32,

    /// Length of every slot recording (one grid column) in seconds
    pub record_duration_secs: f64,

    /// Words per hardware transfer (both channels)
    pub transfer_len: usize,

    /// Transfers captured on top of the minimum needed to fill a clip
    pub extra_transfer_runs: usize,

    /// Value written to the gain register before capture
    pub capture_gain: u32,

    /// Integer gain applied to the rendered composition
    pub amplify_factor: i32,

    /// Overflow behaviour of the gain stage
    pub amplify_mode: AmplifyMode,

    /// Write render-cycle progress to trace.jsonl
    pub trace_enabled: bool,

    /// Log filter for the binary (error, warn, info, debug, trace)
    pub log_level: String,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            sample_rate: COMPOSITION_SAMPLE_RATE,
            record_duration_secs: 0.5,
            transfer_len: 256,
            extra_transfer_runs: 50,
            capture_gain: 1,
            amplify_factor: 16,
            amplify_mode: AmplifyMode::Wrapping,
            trace_enabled: true,
            log_level: "info".to_string(),
        }
    }
}

impl SequencerConfig {
    /// Load from a JSON file; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: SequencerConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(ConfigError::Invalid("sample_rate must be positive".to_string()));
        }
        if !(self.record_duration_secs > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "record_duration_secs must be positive, got {}",
                self.record_duration_secs
            )));
        }
        let composition = self.samples_per_clip().saturating_mul(NUM_COLUMNS);
        if composition > MAX_SAMPLES {
            return Err(ConfigError::Invalid(format!(
                "record_duration_secs {} renders {} samples, above the {} sample limit",
                self.record_duration_secs, composition, MAX_SAMPLES
            )));
        }
        if self.transfer_len < 2 {
            return Err(ConfigError::Invalid(format!(
                "transfer_len must hold both channels, got {}",
                self.transfer_len
            )));
        }
        self.log_filter()?;
        Ok(())
    }

    /// Samples in one slot recording
    pub fn samples_per_clip(&self) -> usize {
        (self.sample_rate as f64 * self.record_duration_secs).floor() as usize
    }

    /// Hardware transfers per recording: enough live-channel words to fill
    /// a clip, plus the configured slack
    pub fn transfer_runs(&self) -> usize {
        let live_per_transfer = (self.transfer_len / 2).max(1);
        self.samples_per_clip() / live_per_transfer + self.extra_transfer_runs
    }

    pub fn log_filter(&self) -> Result<log::LevelFilter, ConfigError> {
        self.log_level
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("unknown log level {:?}", self.log_level)))
    }
}
