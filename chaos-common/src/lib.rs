//! # Chaos Common Library
//!
//! Shared code for the chaos request crates:
//! - Error types
//! - TOML configuration loading and per-operation reloading
//! - Difficulty ordinals and the per-song difficulty bitmask
//! - Level identifier / content hash helpers
//! - Event types (ChaosEvent enum) and the EventBus
//! - `m:ss` time formatting

pub mod config;
pub mod difficulty;
pub mod error;
pub mod events;
pub mod human_time;
pub mod level_id;

pub use difficulty::{Difficulty, DiffMask};
pub use error::{Error, Result};
