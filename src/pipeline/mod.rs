// Pipeline execution and monitoring module
// Runs the file-backed render cycle and records its progress

pub mod cycle;
pub mod trace;

pub use cycle::{amplify_file, run_render_cycle, CycleError, RenderReport};
pub use trace::{read_trace_file, RenderStage, TraceBuilder, TraceEntry, TraceError, TraceWriter};
