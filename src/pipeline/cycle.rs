// Render cycle
// Silence -> columns -> join -> output.wav -> output_amplified.wav, on disk

use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::trace::{RenderStage, TraceBuilder, TraceEntry, TraceWriter};
use crate::audio::{make_silence, ClipError, PcmClip};
use crate::config::SequencerConfig;
use crate::render::{
    amplify, join_columns, render_column, AmplifyMode, CompositionGrid, RenderError, SlotBank,
    NUM_COLUMNS,
};
use crate::state::{hash_file, StorageError, Workspace};

#[derive(Debug, Error)]
pub enum CycleError {
    #[error("Clip error: {0}")]
    Clip(#[from] ClipError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Outcome of a completed render
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderReport {
    pub columns: usize,
    pub samples: usize,
    pub duration_secs: f64,
    pub output_path: PathBuf,
    pub output_sha256: String,
    pub amplified_path: PathBuf,
    pub amplified_sha256: String,
}

/// Render the grid from the recordings in `workspace`.
///
/// Writes `none.wav`, `output.wav` and `output_amplified.wav`. Files written
/// before a failing stage are left as they are.
pub fn run_render_cycle(
    workspace: &Workspace,
    grid: &CompositionGrid,
    config: &SequencerConfig,
    trace: Option<&TraceWriter>,
) -> Result<RenderReport, CycleError> {
    emit(trace, TraceBuilder::stage(RenderStage::Idle).entry("Render requested"));

    let result = render_stages(workspace, grid, config, trace);

    match &result {
        Ok(report) => {
            log::info!(
                "Rendered {} samples to {}",
                report.samples,
                report.amplified_path.display()
            );
            emit(trace, TraceBuilder::stage(RenderStage::Idle).entry("Render finished"));
        }
        Err(e) => {
            log::error!("Render cycle failed: {}", e);
            emit(trace, TraceBuilder::stage(RenderStage::Failed).entry(e.to_string()));
        }
    }

    result
}

fn render_stages(
    workspace: &Workspace,
    grid: &CompositionGrid,
    config: &SequencerConfig,
    trace: Option<&TraceWriter>,
) -> Result<RenderReport, CycleError> {
    workspace.ensure()?;

    let silence_path = workspace.silence_path();
    make_silence(config.record_duration_secs, config.sample_rate)?.save(&silence_path)?;
    emit(
        trace,
        TraceBuilder::stage(RenderStage::SilenceGenerated).entry(format!(
            "Wrote {}",
            silence_path.display()
        )),
    );

    let bank = load_bank(workspace, grid)?;

    let mut columns = Vec::with_capacity(NUM_COLUMNS);
    for column in 0..NUM_COLUMNS {
        columns.push(render_column(grid, column, &bank)?);
        emit(
            trace,
            TraceBuilder::stage(RenderStage::ColumnsRendered(column as u8 + 1))
                .entry(format!("Rendered column {}", column)),
        );
    }

    let composition = join_columns(&columns)?;
    emit(
        trace,
        TraceBuilder::stage(RenderStage::Joined).with_data(
            "Joined columns",
            serde_json::json!({ "samples": composition.len() }),
        ),
    );

    let output_path = workspace.output_path();
    composition.save(&output_path)?;
    let output_sha256 = hash_file(&output_path)?;
    log::info!("Wrote {}", output_path.display());
    emit(
        trace,
        TraceBuilder::stage(RenderStage::Written).with_data(
            format!("Wrote {}", output_path.display()),
            serde_json::json!({ "sha256": output_sha256 }),
        ),
    );

    let amplified_path = workspace.amplified_path();
    amplify_file(
        &output_path,
        &amplified_path,
        config.amplify_factor,
        config.amplify_mode,
    )?;
    let amplified_sha256 = hash_file(&amplified_path)?;
    emit(
        trace,
        TraceBuilder::stage(RenderStage::Amplified).with_data(
            format!("Wrote {}", amplified_path.display()),
            serde_json::json!({
                "factor": config.amplify_factor,
                "sha256": amplified_sha256,
            }),
        ),
    );

    Ok(RenderReport {
        columns: columns.len(),
        samples: composition.len(),
        duration_secs: composition.duration_secs(),
        output_path,
        output_sha256,
        amplified_path,
        amplified_sha256,
    })
}

/// Load the silence filler and every slot the grid uses.
/// Slots with no active cell are never read.
fn load_bank(workspace: &Workspace, grid: &CompositionGrid) -> Result<SlotBank, CycleError> {
    let mut bank = SlotBank::new(PcmClip::load(workspace.silence_path())?);
    for slot in grid.active_slots() {
        let path = workspace.slot_path(slot);
        let clip = PcmClip::load(&path).map_err(|e| {
            log::warn!("Slot {} could not be loaded from {}: {}", slot, path.display(), e);
            e
        })?;
        log::debug!("Loaded slot {} ({} samples)", slot, clip.len());
        bank.set_slot(slot, clip)?;
    }
    Ok(bank)
}

/// Reload `input`, multiply every sample by `factor`, and save to `output`
pub fn amplify_file(
    input: &Path,
    output: &Path,
    factor: i32,
    mode: AmplifyMode,
) -> Result<PcmClip, ClipError> {
    let clip = PcmClip::load(input)?;
    let amplified = amplify(&clip, factor, mode)?;
    amplified.save(output)?;
    log::info!(
        "Amplified {} x{} into {}",
        input.display(),
        factor,
        output.display()
    );
    Ok(amplified)
}

// Trace failures never abort a render
fn emit(trace: Option<&TraceWriter>, entry: TraceEntry) {
    if let Some(writer) = trace {
        if let Err(e) = writer.write(&entry) {
            log::warn!("Failed to write trace to {}: {}", writer.path().display(), e);
        }
    }
}
