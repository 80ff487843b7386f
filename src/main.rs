// Gridbeat command line
// gridbeat [WORKSPACE] [BUTTON MESSAGE...]

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use gridbeat::audio::{CaptureDriver, CaptureError, RawFrame, Register};
use gridbeat::{init_logging, Controller, SequencerConfig, Workspace};

/// Stand-in driver for machines without the line-in hardware
struct NoCapture;

impl CaptureDriver for NoCapture {
    fn receive_frame(&mut self) -> Result<RawFrame, CaptureError> {
        Err(CaptureError::Unavailable(
            "no capture hardware on this machine".to_string(),
        ))
    }

    fn read_register(&mut self, _register: Register) -> Result<u32, CaptureError> {
        Ok(0)
    }

    fn write_register(&mut self, _register: Register, _value: u32) -> Result<(), CaptureError> {
        Ok(())
    }

    fn release(&mut self) {}
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let root = match args.next() {
        Some(dir) => PathBuf::from(dir),
        None => Workspace::default_root().context("Failed to locate default workspace")?,
    };
    let workspace = Workspace::new(root);

    let config = SequencerConfig::load(&workspace.config_path())
        .with_context(|| format!("Failed to load {}", workspace.config_path().display()))?;
    init_logging(config.log_filter()?);
    log::info!("Workspace {}", workspace.root().display());

    let messages: Vec<String> = args.collect();
    let mut stdout = std::io::stdout().lock();
    run_session(&workspace, config, &messages, &mut stdout)
}

/// Render the saved grid when no messages are given, otherwise replay the
/// button messages and write back the LED rows they produce
fn run_session(
    workspace: &Workspace,
    config: SequencerConfig,
    messages: &[String],
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let grid = workspace
        .load_grid()
        .with_context(|| format!("Failed to load {}", workspace.grid_path().display()))?;
    let mut controller = Controller::new(workspace.clone(), config, NoCapture).with_grid(grid);

    if messages.is_empty() {
        let report = controller
            .render()
            .map_err(|e| anyhow::anyhow!("{}", e.message()))?;
        writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
    } else {
        for message in messages {
            let led = controller
                .handle_message(message)
                .map_err(|e| anyhow::anyhow!("{}", e.message()))?;
            if let Some(led) = led {
                write!(out, "{}", led)?;
            }
        }
    }

    workspace
        .save_grid(controller.grid())
        .context("Failed to save grid")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn messages(list: &[&str]) -> Vec<String> {
        list.iter().map(|m| m.to_string()).collect()
    }

    #[test]
    fn test_session_prints_leds_and_saves_grid() {
        let dir = TempDir::new().unwrap();
        let workspace = Workspace::new(dir.path());
        let mut out = Vec::new();

        run_session(
            &workspace,
            SequencerConfig::default(),
            &messages(&["[1]", "[6]", "[bogus]"]),
            &mut out,
        )
        .unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "(00000000)\n(10000000)\n");
        assert!(workspace.load_grid().unwrap().is_active(1, 0));
    }

    #[test]
    fn test_session_render_failure_carries_message() {
        let dir = TempDir::new().unwrap();
        let workspace = Workspace::new(dir.path());
        let config = SequencerConfig {
            record_duration_secs: 0.001,
            trace_enabled: false,
            ..SequencerConfig::default()
        };
        let mut out = Vec::new();

        run_session(&workspace, config.clone(), &messages(&["[7]"]), &mut out).unwrap();
        let error = run_session(&workspace, config, &[], &mut out).unwrap_err();

        assert!(!error.to_string().is_empty());
        assert!(!workspace.output_path().exists());
    }

    #[test]
    fn test_session_record_without_hardware_fails() {
        let dir = TempDir::new().unwrap();
        let workspace = Workspace::new(dir.path());
        let mut out = Vec::new();

        let error = run_session(
            &workspace,
            SequencerConfig::default(),
            &messages(&["[5]"]),
            &mut out,
        )
        .unwrap_err();

        assert!(error.to_string().contains("no capture hardware"));
        assert!(out.is_empty());
    }
}
