//! Playlists and playlist membership
//!
//! A rebuild restricted to a playlist first turns the playlist into a
//! membership map keyed by content hash (or level id for built-in levels).
//! The map lives for one rebuild only.

use chaos_common::level_id::{custom_level_id, hash_of_level_id, is_content_hash};
use chaos_common::{DiffMask, Difficulty};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::Result;
use crate::library::LibraryItem;

/// One playlist entry
#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistEntry {
    pub level_id: String,
    /// Highlighted difficulties, if the entry carries any annotation
    pub difficulties: Option<Vec<Difficulty>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Playlist {
    pub name: String,
    pub entries: Vec<PlaylistEntry>,
}

/// Source of playlists, probed once per rebuild
pub trait PlaylistProvider: Send + Sync {
    fn is_available(&self) -> bool;

    fn list_playlists(&self) -> Result<Vec<Playlist>>;
}

/// Playlist status of one library item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    /// Not in the playlist
    Absent,
    /// In the playlist, every difficulty allowed
    Unrestricted,
    /// In the playlist, only these difficulties allowed
    Highlighted(DiffMask),
}

/// Item → membership side map for one rebuild
#[derive(Debug, Clone, Default)]
pub struct PlaylistMembership {
    entries: HashMap<String, Option<DiffMask>>,
}

fn membership_key(level_id: &str) -> String {
    hash_of_level_id(level_id).unwrap_or_else(|| level_id.to_string())
}

impl PlaylistMembership {
    /// Map that contains nothing
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from a playlist
    ///
    /// Entries for the same level are merged. Highlights are only kept when
    /// `only_highlighted` is set, and an entry without any highlighted
    /// difficulty means "no restriction" rather than "nothing allowed".
    pub fn build(playlist: &Playlist, only_highlighted: bool) -> Self {
        let mut highlights: HashMap<String, DiffMask> = HashMap::new();

        for entry in &playlist.entries {
            let mask = highlights
                .entry(membership_key(&entry.level_id))
                .or_default();
            if only_highlighted {
                if let Some(difficulties) = &entry.difficulties {
                    *mask |= difficulties.iter().copied().collect::<DiffMask>();
                }
            }
        }

        let entries = highlights
            .into_iter()
            .map(|(key, mask)| (key, if mask.is_empty() { None } else { Some(mask) }))
            .collect();

        Self { entries }
    }

    pub fn lookup(&self, item: &LibraryItem) -> Membership {
        match self.entries.get(&membership_key(&item.level_id)) {
            None => Membership::Absent,
            Some(None) => Membership::Unrestricted,
            Some(Some(mask)) => Membership::Highlighted(*mask),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ========================================
// Playlist files
// ========================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistFile {
    #[serde(default)]
    playlist_title: Option<String>,
    #[serde(default)]
    songs: Vec<PlaylistFileSong>,
}

#[derive(Debug, Deserialize)]
struct PlaylistFileSong {
    #[serde(default)]
    hash: Option<String>,
    #[serde(default, alias = "levelId")]
    levelid: Option<String>,
    #[serde(default)]
    difficulties: Option<Vec<PlaylistFileDifficulty>>,
}

#[derive(Debug, Deserialize)]
struct PlaylistFileDifficulty {
    name: String,
}

impl PlaylistFileSong {
    fn into_entry(self) -> Option<PlaylistEntry> {
        let level_id = match (self.levelid, self.hash) {
            (Some(level_id), _) if !level_id.trim().is_empty() => level_id,
            (_, Some(hash)) if is_content_hash(hash.trim()) => custom_level_id(&hash),
            _ => return None,
        };

        let difficulties = self.difficulties.map(|difficulties| {
            difficulties
                .into_iter()
                .filter_map(|d| d.name.parse::<Difficulty>().ok())
                .collect()
        });

        Some(PlaylistEntry {
            level_id,
            difficulties,
        })
    }
}

/// Parse one `.bplist` / `.json` playlist file
pub fn read_playlist_file(path: &Path) -> Result<Playlist> {
    let content = std::fs::read(path)?;
    let file: PlaylistFile = serde_json::from_slice(&content)?;

    let name = file
        .playlist_title
        .filter(|title| !title.trim().is_empty())
        .unwrap_or_else(|| {
            path.file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default()
        });

    let entries = file
        .songs
        .into_iter()
        .filter_map(PlaylistFileSong::into_entry)
        .collect();

    Ok(Playlist { name, entries })
}

/// Playlists stored as files in one directory
#[derive(Debug, Clone)]
pub struct BplistDirectory {
    directory: PathBuf,
}

impl BplistDirectory {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    fn is_playlist_file(path: &Path) -> bool {
        path.is_file()
            && path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case("bplist") || ext.eq_ignore_ascii_case("json"))
                .unwrap_or(false)
    }
}

impl PlaylistProvider for BplistDirectory {
    fn is_available(&self) -> bool {
        self.directory.is_dir()
    }

    fn list_playlists(&self) -> Result<Vec<Playlist>> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(&self.directory)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| Self::is_playlist_file(path))
            .collect();
        paths.sort();

        let mut playlists = Vec::with_capacity(paths.len());
        for path in paths {
            match read_playlist_file(&path) {
                Ok(playlist) => {
                    debug!(
                        "Loaded playlist '{}' ({} entries)",
                        playlist.name,
                        playlist.entries.len()
                    );
                    playlists.push(playlist);
                }
                Err(e) => warn!("Skipping playlist {}: {}", path.display(), e),
            }
        }

        Ok(playlists)
    }
}

/// Membership for the playlist called `name`
///
/// A playlist that cannot be found yields an empty map: every item is
/// rejected.
pub fn membership_for(
    provider: &dyn PlaylistProvider,
    name: &str,
    only_highlighted: bool,
) -> PlaylistMembership {
    let playlists = match provider.list_playlists() {
        Ok(playlists) => playlists,
        Err(e) => {
            warn!("Failed to list playlists: {}", e);
            return PlaylistMembership::empty();
        }
    };

    match playlists.iter().find(|p| p.name == name) {
        Some(playlist) => PlaylistMembership::build(playlist, only_highlighted),
        None => {
            warn!("Configured playlist '{}' not found", name);
            PlaylistMembership::empty()
        }
    }
}
