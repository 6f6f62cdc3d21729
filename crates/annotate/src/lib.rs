//! Page annotation for shelfmark.
//!
//! This crate provides the document arena and selector matching, the
//! identifier extractor, the badge renderer, the scan/clear engine, and
//! the mutation/polling re-trigger loop.

pub mod dom;
pub mod extract;
pub mod render;
pub mod scanner;
pub mod selector;
pub mod watcher;

pub use dom::{Document, NodeId};
pub use extract::ExtractedId;
pub use render::Fragment;
pub use scanner::{DomScanner, ScanOutcome};
pub use watcher::MutationWatcher;
