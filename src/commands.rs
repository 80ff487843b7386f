// Controller commands
// Button messages in, LED row messages out; dispatches record and render
use serde::Serialize;

use crate::audio::{CaptureDriver, CaptureSession};
use crate::config::SequencerConfig;
use crate::pipeline::{run_render_cycle, RenderReport, TraceWriter};
use crate::render::{CompositionGrid, NUM_COLUMNS, NUM_SLOTS};
use crate::state::Workspace;

#[derive(Debug, Serialize)]
pub struct CommandError {
    message: String,
}

impl<E: std::fmt::Display> From<E> for CommandError {
    fn from(error: E) -> Self {
        CommandError {
            message: error.to_string(),
        }
    }
}

impl CommandError {
    pub fn message(&self) -> &str {
        &self.message
    }
}

pub type CommandResult<T> = Result<T, CommandError>;

/// One press on the button controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    /// Make a slot the target of toggles and recordings
    SelectRow(usize),
    Render,
    Record,
    /// Flip a step of the selected row
    ToggleStep(usize),
}

const RENDER_BUTTON: usize = 4;
const RECORD_BUTTON: usize = 5;
const FIRST_STEP_BUTTON: usize = 6;

/// Parse a button message of the form `[n]`.
///
/// `0..=3` select a row, `4` renders, `5` records and `6..=13` toggle steps
/// 0..=7. Trailing whitespace is ignored; anything else is `None`.
pub fn parse_message(message: &str) -> Option<ControlCommand> {
    let digits = message
        .trim_end()
        .strip_prefix('[')?
        .strip_suffix(']')?;

    let well_formed = matches!(digits.len(), 1 | 2)
        && digits.bytes().all(|b| b.is_ascii_digit())
        && !(digits.len() == 2 && digits.starts_with('0'));
    if !well_formed {
        return None;
    }

    match digits.parse::<usize>().ok()? {
        n if n < NUM_SLOTS => Some(ControlCommand::SelectRow(n)),
        RENDER_BUTTON => Some(ControlCommand::Render),
        RECORD_BUTTON => Some(ControlCommand::Record),
        n if (FIRST_STEP_BUTTON..FIRST_STEP_BUTTON + NUM_COLUMNS).contains(&n) => {
            Some(ControlCommand::ToggleStep(n - FIRST_STEP_BUTTON))
        }
        _ => None,
    }
}

/// LED state of one row: `(b0b1...b7)` plus newline, `1` for active steps
pub fn led_message(grid: &CompositionGrid, row: usize) -> String {
    let bits: String = (0..NUM_COLUMNS)
        .map(|column| if grid.is_active(row, column) { '1' } else { '0' })
        .collect();
    format!("({})\n", bits)
}

/// Grid state plus everything needed to act on button presses
pub struct Controller<D: CaptureDriver> {
    grid: CompositionGrid,
    row: usize,
    workspace: Workspace,
    config: SequencerConfig,
    driver: D,
    trace: Option<TraceWriter>,
}

impl<D: CaptureDriver> Controller<D> {
    pub fn new(workspace: Workspace, config: SequencerConfig, driver: D) -> Self {
        let trace = config
            .trace_enabled
            .then(|| TraceWriter::new(workspace.trace_path()));
        Controller {
            grid: CompositionGrid::default(),
            row: 0,
            workspace,
            config,
            driver,
            trace,
        }
    }

    pub fn with_grid(mut self, grid: CompositionGrid) -> Self {
        self.grid = grid;
        self
    }

    pub fn grid(&self) -> &CompositionGrid {
        &self.grid
    }

    pub fn selected_row(&self) -> usize {
        self.row
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// LED message for the selected row
    pub fn led_message(&self) -> String {
        led_message(&self.grid, self.row)
    }

    /// Parse and handle a raw button message. Unknown messages are ignored.
    pub fn handle_message(&mut self, message: &str) -> CommandResult<Option<String>> {
        match parse_message(message) {
            Some(command) => self.handle(command),
            None => {
                log::warn!("Ignoring unknown controller message {:?}", message.trim_end());
                Ok(None)
            }
        }
    }

    /// Apply one command. Returns the LED message to send back when the
    /// selected row or the grid changed.
    pub fn handle(&mut self, command: ControlCommand) -> CommandResult<Option<String>> {
        log::debug!("Handling {:?} (row {})", command, self.row);
        match command {
            ControlCommand::SelectRow(row) => {
                if row >= NUM_SLOTS {
                    return Err(CommandError {
                        message: format!("Row {} is outside the grid", row),
                    });
                }
                self.row = row;
                Ok(Some(self.led_message()))
            }
            ControlCommand::ToggleStep(column) => {
                let active = self.grid.toggle(self.row, column)?;
                log::info!(
                    "Slot {} step {} {}",
                    self.row,
                    column,
                    if active { "on" } else { "off" }
                );
                Ok(Some(self.led_message()))
            }
            ControlCommand::Record => {
                self.record_slot(self.row)?;
                Ok(None)
            }
            ControlCommand::Render => {
                self.render()?;
                Ok(None)
            }
        }
    }

    /// Capture one clip from the driver and store it as `{slot}.wav`
    pub fn record_slot(&mut self, slot: usize) -> CommandResult<()> {
        if slot >= NUM_SLOTS {
            return Err(CommandError {
                message: format!("Slot {} is outside the grid", slot),
            });
        }

        let session = CaptureSession::from_config(&self.config);
        log::info!(
            "Recording slot {}: {} samples over {} transfers",
            slot,
            session.capacity(),
            session.transfer_runs()
        );
        let clip = session.record(&mut self.driver)?;

        self.workspace.ensure()?;
        let path = self.workspace.slot_path(slot);
        clip.save(&path)?;
        log::info!("Saved slot {} to {}", slot, path.display());
        Ok(())
    }

    /// Run a full render of the current grid
    pub fn render(&mut self) -> CommandResult<RenderReport> {
        let report = run_render_cycle(
            &self.workspace,
            &self.grid,
            &self.config,
            self.trace.as_ref(),
        )?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{CaptureError, PcmClip, RawFrame, Register};
    use tempfile::TempDir;

    /// Emits the same one-sample transfer forever
    struct ConstantDriver {
        word: u32,
        released: usize,
    }

    impl CaptureDriver for ConstantDriver {
        fn receive_frame(&mut self) -> Result<RawFrame, CaptureError> {
            Ok(RawFrame::new(vec![self.word, 0]))
        }

        fn read_register(&mut self, _register: Register) -> Result<u32, CaptureError> {
            Ok(0)
        }

        fn write_register(&mut self, _register: Register, _value: u32) -> Result<(), CaptureError> {
            Ok(())
        }

        fn release(&mut self) {
            self.released += 1;
        }
    }

    fn controller(dir: &TempDir, sample: i32) -> Controller<ConstantDriver> {
        let config = SequencerConfig {
            record_duration_secs: 0.001,
            trace_enabled: false,
            ..SequencerConfig::default()
        };
        let driver = ConstantDriver {
            word: (sample as u32).reverse_bits(),
            released: 0,
        };
        Controller::new(Workspace::new(dir.path()), config, driver)
    }

    #[test]
    fn test_parse_message_table() {
        assert_eq!(parse_message("[0]"), Some(ControlCommand::SelectRow(0)));
        assert_eq!(parse_message("[3]"), Some(ControlCommand::SelectRow(3)));
        assert_eq!(parse_message("[4]"), Some(ControlCommand::Render));
        assert_eq!(parse_message("[5]"), Some(ControlCommand::Record));
        assert_eq!(parse_message("[6]"), Some(ControlCommand::ToggleStep(0)));
        assert_eq!(parse_message("[9]"), Some(ControlCommand::ToggleStep(3)));
        assert_eq!(parse_message("[10]"), Some(ControlCommand::ToggleStep(4)));
        assert_eq!(parse_message("[13]\n"), Some(ControlCommand::ToggleStep(7)));
    }

    #[test]
    fn test_parse_message_rejects_garbage() {
        for message in ["", "[]", "[14]", "[07]", "[-1]", "[123]", "4", "[4", " [4]", "[a]"] {
            assert_eq!(parse_message(message), None, "{:?}", message);
        }
    }

    #[test]
    fn test_led_message() {
        let mut grid = CompositionGrid::new();
        grid.set(1, 0, true).unwrap();
        grid.set(1, 7, true).unwrap();
        assert_eq!(led_message(&grid, 1), "(10000001)\n");
        assert_eq!(led_message(&grid, 0), "(00000000)\n");
    }

    #[test]
    fn test_select_and_toggle_update_leds() {
        let dir = TempDir::new().unwrap();
        let mut controller = controller(&dir, 1);

        assert_eq!(
            controller.handle_message("[2]").unwrap(),
            Some("(00000000)\n".to_string())
        );
        assert_eq!(controller.selected_row(), 2);

        assert_eq!(
            controller.handle_message("[8]").unwrap(),
            Some("(00100000)\n".to_string())
        );
        assert!(controller.grid().is_active(2, 2));

        controller.handle_message("[8]").unwrap();
        assert!(!controller.grid().is_active(2, 2));

        assert_eq!(controller.handle_message("[99]").unwrap(), None);
    }

    #[test]
    fn test_record_writes_selected_slot() {
        let dir = TempDir::new().unwrap();
        let mut controller = controller(&dir, 5);

        controller.handle_message("[1]").unwrap();
        assert_eq!(controller.handle_message("[5]").unwrap(), None);

        let clip = PcmClip::load(controller.workspace().slot_path(1)).unwrap();
        assert_eq!(clip.len(), 41);
        assert!(clip.samples()[..40].iter().all(|&s| s == 5));
        assert_eq!(controller.driver.released, 1);
    }

    #[test]
    fn test_render_after_record() {
        let dir = TempDir::new().unwrap();
        let mut controller = controller(&dir, 64).with_grid(CompositionGrid::new());

        controller.handle(ControlCommand::SelectRow(3)).unwrap();
        controller.handle(ControlCommand::Record).unwrap();
        controller.handle(ControlCommand::ToggleStep(0)).unwrap();

        let report = controller.render().unwrap();
        assert_eq!(report.samples, 8 * 41);

        // Slot 3 is the last overlap: 64 / 2 = 32, then x16
        let amplified = PcmClip::load(&report.amplified_path).unwrap();
        assert_eq!(amplified.samples()[0], 512);
        assert!(!dir.path().join("trace.jsonl").exists());
    }

    #[test]
    fn test_render_with_missing_recording_is_an_error() {
        let dir = TempDir::new().unwrap();
        let mut controller = controller(&dir, 1);
        controller.handle(ControlCommand::ToggleStep(5)).unwrap();

        let error = controller.handle(ControlCommand::Render).unwrap_err();
        assert!(!error.message().is_empty());
    }
}
