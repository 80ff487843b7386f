// State management module
// Workspace layout, grid persistence, and artifact hashing

pub mod storage;

pub use storage::{calculate_sha256, hash_file, StorageError, StorageResult, Workspace};
