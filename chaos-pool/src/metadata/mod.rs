//! Song metadata service
//!
//! Resolves short map keys to content hashes and content hashes to song-level
//! and per-difficulty statistics. The service is initialized once, lazily, by
//! the first rebuild that needs it; lookups before that return nothing.

mod catalog;

pub use catalog::{parse_catalog, SongCatalog};

use async_trait::async_trait;
use chaos_common::Difficulty;
use std::sync::Arc;

use crate::error::Result;
use crate::library::STANDARD_CHARACTERISTIC;

/// Statistics for one difficulty of a song
#[derive(Debug, Clone, PartialEq)]
pub struct DifficultyStats {
    pub characteristic: String,
    pub difficulty: Difficulty,
    /// Note jump speed
    pub njs: f32,
    pub notes: u32,
    pub ranked: bool,
}

/// Song-level statistics
#[derive(Debug, Clone, PartialEq)]
pub struct SongStats {
    /// Uppercase content hash
    pub hash: String,
    /// Short map key (lowercase)
    pub key: String,
    pub bpm: f32,
    pub duration_secs: f32,
    /// Per-difficulty stats in catalog order
    pub difficulties: Vec<DifficultyStats>,
}

impl SongStats {
    /// Stats entry deciding `difficulty` under the Standard characteristic.
    ///
    /// When the catalog lists the same difficulty more than once, the last
    /// entry wins.
    pub fn standard_stats(&self, difficulty: Difficulty) -> Option<&DifficultyStats> {
        self.difficulties
            .iter()
            .rev()
            .find(|d| d.difficulty == difficulty && d.characteristic == STANDARD_CHARACTERISTIC)
    }

    /// Notes per second for `stats`; undefined for a non-positive duration
    pub fn notes_per_second(&self, stats: &DifficultyStats) -> Option<f32> {
        if self.duration_secs > 0.0 {
            Some(stats.notes as f32 / self.duration_secs)
        } else {
            None
        }
    }
}

/// Metadata service consumed by the filter and the request handler
#[async_trait]
pub trait SongMetadata: Send + Sync {
    /// Load the service; idempotent once it succeeds
    async fn initialize(&self) -> Result<()>;

    /// True once `initialize` has succeeded
    fn is_ready(&self) -> bool;

    /// Content hash for a short map key
    fn resolve_short_id(&self, key: &str) -> Option<String>;

    /// Statistics for a content hash
    fn find_by_hash(&self, hash: &str) -> Option<Arc<SongStats>>;
}
