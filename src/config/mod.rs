//! Configuration management for barkeep
//!
//! This module provides two persistence paths:
//! - **preferences**: user settings read by the core (JSON file in the config dir)
//! - **store**: the persistence collaborator holding the section list as opaque blobs

pub mod preferences;
pub mod store;

// Re-export commonly used types
pub use preferences::{AppearanceConfig, Preferences, RehideStrategy};
pub use store::{load_sections, save_sections, FileStore, MemoryStore, Store};
