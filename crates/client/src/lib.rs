//! Client code for shelfmark.
//!
//! This crate provides the HTTP transport, the dataset-specific fetch and
//! validation functions, and the refresh orchestrator that merges the
//! cached datasets into one catalog snapshot.

pub mod feeds;
pub mod fetch;
pub mod orchestrator;

pub use fetch::{FetchClient, FetchConfig, JsonTransport};
pub use orchestrator::{DatasetStatus, RefreshOrchestrator};
