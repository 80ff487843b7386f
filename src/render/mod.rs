// Render Engine - Grid composition and post-processing
// Mixes recorded slot clips into one track and applies output gain

pub mod composition;
pub mod mixer;

// Re-export main types
pub use composition::{
    join_columns, render_column, render_composition, CompositionGrid, RenderError, SlotBank,
    NUM_COLUMNS, NUM_SLOTS,
};
pub use mixer::{amplify, append, overlap, AmplifyMode};
