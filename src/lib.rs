// Gridbeat - Step sequencer for recorded clips
// Module declarations

pub mod audio;
pub mod commands;
pub mod config;
pub mod pipeline;
pub mod render;
pub mod state;

pub use audio::{make_silence, CaptureDriver, ClipError, PcmClip};
pub use commands::{led_message, parse_message, CommandError, ControlCommand, Controller};
pub use config::{ConfigError, SequencerConfig};
pub use pipeline::{amplify_file, run_render_cycle, RenderReport};
pub use render::{append, amplify, overlap, render_column, render_composition, CompositionGrid};
pub use state::Workspace;

/// Install the env_logger backend. `RUST_LOG` overrides `level`.
/// Safe to call more than once; later calls are no-ops.
pub fn init_logging(level: log::LevelFilter) {
    let _ = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp_millis()
        .try_init();
}
