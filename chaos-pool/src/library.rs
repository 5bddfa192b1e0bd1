//! Library model and the in-memory library source
//!
//! A library is a list of collections (level packs), each holding playable
//! items. Items are shared into filtered pools by `Arc`, never copied.

use async_trait::async_trait;
use chaos_common::level_id::hash_of_level_id;
use chaos_common::Difficulty;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::Result;

/// The only characteristic the filter considers
pub const STANDARD_CHARACTERISTIC: &str = "Standard";

/// Difficulties available under one characteristic
#[derive(Debug, Clone, PartialEq)]
pub struct DifficultySet {
    pub characteristic: String,
    pub difficulties: Vec<Difficulty>,
}

impl DifficultySet {
    pub fn new(characteristic: impl Into<String>, difficulties: Vec<Difficulty>) -> Self {
        Self {
            characteristic: characteristic.into(),
            difficulties,
        }
    }

    pub fn is_standard(&self) -> bool {
        self.characteristic == STANDARD_CHARACTERISTIC
    }
}

/// One playable level
#[derive(Debug, Clone, PartialEq)]
pub struct LibraryItem {
    /// Stable level identifier (`custom_level_<hash>` for custom levels)
    pub level_id: String,
    pub song_name: String,
    pub duration_secs: f32,
    /// Offset at which playback starts
    pub time_offset_secs: f32,
    /// Installation folder, set for locally installed custom levels
    pub local_path: Option<PathBuf>,
    pub difficulty_sets: Vec<DifficultySet>,
}

impl LibraryItem {
    pub fn new(level_id: impl Into<String>, duration_secs: f32) -> Self {
        Self {
            level_id: level_id.into(),
            song_name: String::new(),
            duration_secs,
            time_offset_secs: 0.0,
            local_path: None,
            difficulty_sets: Vec::new(),
        }
    }

    pub fn with_song_name(mut self, song_name: impl Into<String>) -> Self {
        self.song_name = song_name.into();
        self
    }

    pub fn with_offset(mut self, time_offset_secs: f32) -> Self {
        self.time_offset_secs = time_offset_secs;
        self
    }

    pub fn with_local_path(mut self, local_path: impl Into<PathBuf>) -> Self {
        self.local_path = Some(local_path.into());
        self
    }

    pub fn with_difficulties(
        mut self,
        characteristic: impl Into<String>,
        difficulties: Vec<Difficulty>,
    ) -> Self {
        self.difficulty_sets
            .push(DifficultySet::new(characteristic, difficulties));
        self
    }

    /// Length actually played (duration minus start offset)
    pub fn playable_duration(&self) -> f32 {
        self.duration_secs - self.time_offset_secs
    }

    /// Content hash, if the identifier carries one
    pub fn content_hash(&self) -> Option<String> {
        hash_of_level_id(&self.level_id)
    }
}

/// A named group of items (a level pack)
#[derive(Debug, Clone, Default)]
pub struct LibraryCollection {
    pub name: String,
    pub items: Vec<Arc<LibraryItem>>,
}

impl LibraryCollection {
    pub fn new(name: impl Into<String>, items: Vec<LibraryItem>) -> Self {
        Self {
            name: name.into(),
            items: items.into_iter().map(Arc::new).collect(),
        }
    }
}

/// Source of the installed library
#[async_trait]
pub trait LibrarySource: Send + Sync {
    /// All loaded collections
    async fn collections(&self) -> Result<Vec<LibraryCollection>>;
}

/// Library held in memory
#[derive(Debug, Clone, Default)]
pub struct StaticLibrary {
    collections: Vec<LibraryCollection>,
}

impl StaticLibrary {
    pub fn new(collections: Vec<LibraryCollection>) -> Self {
        Self { collections }
    }

    /// Single collection holding `items`
    pub fn from_items(items: Vec<LibraryItem>) -> Self {
        Self::new(vec![LibraryCollection::new("Custom Levels", items)])
    }
}

#[async_trait]
impl LibrarySource for StaticLibrary {
    async fn collections(&self) -> Result<Vec<LibraryCollection>> {
        Ok(self.collections.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_playable_duration_subtracts_offset() {
        let item = LibraryItem::new("x", 150.0).with_offset(30.0);
        assert_eq!(item.playable_duration(), 120.0);
    }

    #[test]
    fn test_content_hash_of_builtin_level() {
        let item = LibraryItem::new("100Bills", 150.0);
        assert_eq!(item.content_hash(), None);
    }

    #[tokio::test]
    async fn test_static_library_shares_items() {
        let library = StaticLibrary::from_items(vec![
            LibraryItem::new("a", 100.0),
            LibraryItem::new("b", 100.0),
        ]);
        let first = library.collections().await.unwrap();
        let second = library.collections().await.unwrap();
        assert_eq!(first[0].items.len(), 2);
        assert!(Arc::ptr_eq(&first[0].items[0], &second[0].items[0]));
    }
}
