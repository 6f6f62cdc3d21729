//! Core types and shared functionality for shelfmark.
//!
//! This crate provides:
//! - SQLite-backed key-value store
//! - Generic get-or-refresh dataset cache with stale fallback
//! - Catalog data model (ownership, delistings, DLC, cards, bundles)
//! - User settings and application configuration
//! - Unified error types

pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod settings;
pub mod store;

pub use cache::{CacheEntry, DatasetCache};
pub use catalog::{CatalogSnapshot, ItemId, PackageId, UserCatalogState};
pub use config::AppConfig;
pub use error::Error;
pub use settings::{RetriggerPolicy, Settings, SettingsStore};
pub use store::KeyValueStore;
