// End-to-end composition checks through the public API

use gridbeat::audio::{make_silence, CaptureDriver, CaptureError, RawFrame, Register};
use gridbeat::pipeline::{read_trace_file, RenderStage, TraceWriter};
use gridbeat::render::{overlap, render_composition, CompositionGrid, SlotBank};
use gridbeat::{run_render_cycle, Controller, PcmClip, SequencerConfig, Workspace};
use tempfile::TempDir;

#[test]
fn test_single_active_cell_fills_first_column() {
    let silence = make_silence(0.01, 41000).unwrap();
    let n = silence.len();
    assert_eq!(n, 410);

    let slot0 = PcmClip::new(41000, (0..n as i32).map(|i| i * 1000 - 7).collect()).unwrap();
    let mut bank = SlotBank::new(silence.clone());
    bank.set_slot(0, slot0.clone()).unwrap();

    let mut grid = CompositionGrid::new();
    grid.set(0, 0, true).unwrap();

    let out = render_composition(&grid, &bank).unwrap();
    assert_eq!(out.len(), 8 * n);

    let first = overlap(&overlap(&overlap(&slot0, &silence).unwrap(), &silence).unwrap(), &silence)
        .unwrap();
    assert_eq!(&out.samples()[..n], first.samples());
    assert!(out.samples()[n..].iter().all(|&s| s == 0));
}

#[test]
fn test_render_cycle_on_disk() {
    let temp_dir = TempDir::new().unwrap();
    let workspace = Workspace::new(temp_dir.path().join("session"));
    workspace.ensure().unwrap();
    let config = SequencerConfig {
        record_duration_secs: 0.01,
        ..SequencerConfig::default()
    };
    let n = config.samples_per_clip();

    // Slot 3 is folded in last and halved once: 2^25 -> 2^24, x16 = 2^28
    PcmClip::new(41000, vec![1 << 25; n])
        .unwrap()
        .save(workspace.slot_path(3))
        .unwrap();
    // Slot 0 is halved three times: 2^31 - 1 -> 2^28 - 1, x16 wraps to -16
    PcmClip::new(41000, vec![i32::MAX; n])
        .unwrap()
        .save(workspace.slot_path(0))
        .unwrap();

    let mut grid = CompositionGrid::new();
    grid.set(3, 7, true).unwrap();
    grid.set(0, 2, true).unwrap();

    let trace = TraceWriter::new(workspace.trace_path());
    let report = run_render_cycle(&workspace, &grid, &config, Some(&trace)).unwrap();

    assert_eq!(report.samples, 8 * n);
    assert!(workspace.output_path().exists());
    assert!(workspace.amplified_path().exists());

    let amplified = PcmClip::load(workspace.amplified_path()).unwrap();
    assert_eq!(amplified.samples()[7 * n], 1 << 28);
    assert_eq!(amplified.samples()[2 * n], -16);
    assert!(amplified.samples()[..2 * n].iter().all(|&s| s == 0));

    let entries = read_trace_file(&workspace.trace_path()).unwrap();
    assert_eq!(entries.last().unwrap().stage, RenderStage::Idle);
    assert!(entries.iter().any(|e| e.stage == RenderStage::Amplified));
}

#[test]
fn test_controller_session_persists_grid() {
    let temp_dir = TempDir::new().unwrap();
    let workspace = Workspace::new(temp_dir.path());
    let config = SequencerConfig {
        trace_enabled: false,
        ..SequencerConfig::default()
    };

    struct Silent;

    impl CaptureDriver for Silent {
        fn receive_frame(&mut self) -> Result<RawFrame, CaptureError> {
            Ok(RawFrame::new(vec![0; 256]))
        }

        fn read_register(&mut self, _register: Register) -> Result<u32, CaptureError> {
            Ok(0)
        }

        fn write_register(&mut self, _register: Register, _value: u32) -> Result<(), CaptureError> {
            Ok(())
        }

        fn release(&mut self) {}
    }

    let mut controller = Controller::new(workspace.clone(), config, Silent);
    let leds: Vec<Option<String>> = ["[1]", "[6]", "[13]"]
        .iter()
        .map(|m| controller.handle_message(m).unwrap())
        .collect();
    assert_eq!(leds[2].as_deref(), Some("(10000001)\n"));

    workspace.save_grid(controller.grid()).unwrap();
    let reloaded = workspace.load_grid().unwrap();
    assert!(reloaded.is_active(1, 0));
    assert!(reloaded.is_active(1, 7));
    assert_eq!(reloaded.active_slots(), vec![1]);
}
