// Grid composition
// Turns the 4x8 slot/step grid plus recorded clips into one rendered track

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::mixer::{append, overlap};
use crate::audio::clip::{ClipError, PcmClip};

/// Recordable sound slots (grid rows)
pub const NUM_SLOTS: usize = 4;

/// Time steps (grid columns)
pub const NUM_COLUMNS: usize = 8;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Column {0} is outside the grid")]
    ColumnOutOfRange(usize),

    #[error("Slot {0} is outside the grid")]
    SlotOutOfRange(usize),

    #[error("Slot {0} is active but has no recording")]
    MissingSlot(usize),

    #[error("Nothing to join")]
    NoColumns,

    #[error(transparent)]
    Clip(#[from] ClipError),
}

/// Which slot sounds in which step. Rows are slots, columns are steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompositionGrid {
    cells: [[bool; NUM_COLUMNS]; NUM_SLOTS],
}

impl CompositionGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_cells(cells: [[bool; NUM_COLUMNS]; NUM_SLOTS]) -> Self {
        Self { cells }
    }

    /// Out-of-range cells read as inactive
    pub fn is_active(&self, slot: usize, column: usize) -> bool {
        self.cells
            .get(slot)
            .and_then(|row| row.get(column))
            .copied()
            .unwrap_or(false)
    }

    pub fn set(&mut self, slot: usize, column: usize, active: bool) -> Result<(), RenderError> {
        *self.cell_mut(slot, column)? = active;
        Ok(())
    }

    /// Flip one cell and return its new state
    pub fn toggle(&mut self, slot: usize, column: usize) -> Result<bool, RenderError> {
        let cell = self.cell_mut(slot, column)?;
        *cell = !*cell;
        Ok(*cell)
    }

    fn cell_mut(&mut self, slot: usize, column: usize) -> Result<&mut bool, RenderError> {
        if column >= NUM_COLUMNS {
            return Err(RenderError::ColumnOutOfRange(column));
        }
        self.cells
            .get_mut(slot)
            .map(|row| &mut row[column])
            .ok_or(RenderError::SlotOutOfRange(slot))
    }

    pub fn row(&self, slot: usize) -> Option<&[bool; NUM_COLUMNS]> {
        self.cells.get(slot)
    }

    /// Slots active in at least one column, ascending
    pub fn active_slots(&self) -> Vec<usize> {
        (0..NUM_SLOTS)
            .filter(|&slot| self.cells[slot].iter().any(|&on| on))
            .collect()
    }

    pub fn clear(&mut self) {
        self.cells = Default::default();
    }
}

/// The clips a render draws from: one optional recording per slot plus the
/// silence filler that stands in for inactive cells
#[derive(Debug, Clone)]
pub struct SlotBank {
    slots: [Option<PcmClip>; NUM_SLOTS],
    silence: PcmClip,
}

impl SlotBank {
    pub fn new(silence: PcmClip) -> Self {
        Self {
            slots: Default::default(),
            silence,
        }
    }

    pub fn set_slot(&mut self, slot: usize, clip: PcmClip) -> Result<(), RenderError> {
        let entry = self
            .slots
            .get_mut(slot)
            .ok_or(RenderError::SlotOutOfRange(slot))?;
        *entry = Some(clip);
        Ok(())
    }

    pub fn slot(&self, slot: usize) -> Option<&PcmClip> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    pub fn silence(&self) -> &PcmClip {
        &self.silence
    }

    /// Length of a recorded slot when it differs from the silence filler,
    /// e.g. a recording made under another duration setting
    pub fn length_mismatch(&self, slot: usize) -> Option<usize> {
        self.slot(slot)
            .map(PcmClip::len)
            .filter(|&len| len != self.silence.len())
    }
}

/// Mix one step: each slot contributes its recording when active and the
/// silence filler otherwise, folded left to right with `overlap`.
///
/// Using silence for inactive slots keeps every column the same length, which
/// `join_columns` relies on.
pub fn render_column(
    grid: &CompositionGrid,
    column: usize,
    bank: &SlotBank,
) -> Result<PcmClip, RenderError> {
    if column >= NUM_COLUMNS {
        return Err(RenderError::ColumnOutOfRange(column));
    }

    let pick = |slot: usize| -> Result<&PcmClip, RenderError> {
        if grid.is_active(slot, column) {
            let clip = bank.slot(slot).ok_or(RenderError::MissingSlot(slot))?;
            if let Some(len) = bank.length_mismatch(slot) {
                log::warn!(
                    "Slot {} has {} samples but steps are {} long; column {} will be shortened",
                    slot,
                    len,
                    bank.silence().len(),
                    column
                );
            }
            Ok(clip)
        } else {
            Ok(bank.silence())
        }
    };

    let mut mixed = overlap(pick(0)?, pick(1)?)?;
    for slot in 2..NUM_SLOTS {
        mixed = overlap(&mixed, pick(slot)?)?;
    }
    Ok(mixed)
}

/// Join rendered columns end to end, pairing neighbours level by level
/// (0+1, 2+3, ... then pairs of pairs) until one clip remains
pub fn join_columns(columns: &[PcmClip]) -> Result<PcmClip, RenderError> {
    let mut level: Vec<PcmClip> = match columns {
        [] => return Err(RenderError::NoColumns),
        [single] => return Ok(single.clone()),
        [..] => columns
            .chunks(2)
            .map(join_pair)
            .collect::<Result<_, _>>()?,
    };

    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(join_pair)
            .collect::<Result<_, _>>()?;
    }

    level.pop().ok_or(RenderError::NoColumns)
}

fn join_pair(pair: &[PcmClip]) -> Result<PcmClip, RenderError> {
    match pair {
        [a, b] => Ok(append(a, b)?),
        [a] => Ok(a.clone()),
        _ => Err(RenderError::NoColumns),
    }
}

/// Render every column and join them into the full composition
pub fn render_composition(grid: &CompositionGrid, bank: &SlotBank) -> Result<PcmClip, RenderError> {
    let columns = (0..NUM_COLUMNS)
        .map(|column| render_column(grid, column, bank))
        .collect::<Result<Vec<_>, _>>()?;
    join_columns(&columns)
}
