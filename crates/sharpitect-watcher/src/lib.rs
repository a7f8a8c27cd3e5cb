//! Sharpitect Watcher — debounced file watching and incremental updates

pub mod update;
pub mod watcher;


pub use update::{IncrementalUpdateService, ServiceState, UpdateCompleted, UpdateOptions};
pub use watcher::{ChangeKind, FileChange, FileChangeWatcher, DEFAULT_DEBOUNCE};
