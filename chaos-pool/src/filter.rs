//! Pool filter engine
//!
//! Turns the installed library into the list of [`ValidSong`]s and the
//! requestable index (content hash → position in that list).
//!
//! A pass runs in three phases:
//! 1. enumerate the library (async)
//! 2. duration / playlist / hash / extra-data screening (blocking)
//! 3. metadata initialization (async), then per-difficulty validation and
//!    the requestable index (blocking)
//!
//! Items excluded for ordinary reasons never fail the pass. Only library
//! enumeration and metadata initialization failures do.

use chaos_common::config::FilterConfig;
use chaos_common::human_time::format_duration_secs;
use chaos_common::{DiffMask, Difficulty};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::error::{PoolError, Result};
use crate::extra_data::{ExtraDataLookup, ExtraDataResolver};
use crate::library::{LibraryItem, LibrarySource, STANDARD_CHARACTERISTIC};
use crate::metadata::{SongMetadata, SongStats};
use crate::playlist::{membership_for, Membership, PlaylistMembership, PlaylistProvider};
use crate::valid_song::ValidSong;

/// Result of one filter pass
#[derive(Debug, Default)]
pub struct FilterOutput {
    pub songs: Vec<ValidSong>,
    /// Content hash → index into `songs`
    pub requestable: HashMap<String, usize>,
}

/// Item that passed the pre-metadata screening
struct Candidate {
    item: Arc<LibraryItem>,
    hash: String,
    /// Highlighted difficulties from the playlist, if restricted
    highlighted: Option<DiffMask>,
    extra: Option<ExtraDataLookup>,
}

/// Per-stage exclusion counters, logged after each pass
#[derive(Debug, Default)]
struct FilterStats {
    enumerated: usize,
    too_short: usize,
    not_in_playlist: usize,
    no_hash: usize,
    no_extra_data: usize,
}

/// Filter engine wired to its collaborators
#[derive(Clone)]
pub struct PoolFilter {
    library: Arc<dyn LibrarySource>,
    metadata: Arc<dyn SongMetadata>,
    extra_data: Option<Arc<dyn ExtraDataResolver>>,
    playlists: Option<Arc<dyn PlaylistProvider>>,
}

impl PoolFilter {
    pub fn new(library: Arc<dyn LibrarySource>, metadata: Arc<dyn SongMetadata>) -> Self {
        Self {
            library,
            metadata,
            extra_data: None,
            playlists: None,
        }
    }

    pub fn with_extra_data(mut self, resolver: Arc<dyn ExtraDataResolver>) -> Self {
        self.extra_data = Some(resolver);
        self
    }

    pub fn with_playlists(mut self, provider: Arc<dyn PlaylistProvider>) -> Self {
        self.playlists = Some(provider);
        self
    }

    pub fn metadata(&self) -> &Arc<dyn SongMetadata> {
        &self.metadata
    }

    /// Run one complete pass with `config`
    pub async fn run(&self, config: &FilterConfig) -> Result<FilterOutput> {
        let started = Instant::now();

        let items: Vec<Arc<LibraryItem>> = self
            .library
            .collections()
            .await
            .map_err(|e| match e {
                PoolError::Library(_) => e,
                other => PoolError::Library(other.to_string()),
            })?
            .into_iter()
            .flat_map(|collection| collection.items)
            .collect();

        let screen = {
            let filter = self.clone();
            let config = config.clone();
            tokio::task::spawn_blocking(move || filter.screen(items, &config))
                .await
                .map_err(|e| PoolError::Internal(format!("screening task failed: {}", e)))?
        };
        let (candidates, stats) = screen;

        if candidates.is_empty() {
            debug!(?stats, "No candidates left after screening");
            return Ok(FilterOutput::default());
        }

        self.metadata.initialize().await?;

        let output = {
            let metadata = self.metadata.clone();
            let config = config.clone();
            tokio::task::spawn_blocking(move || validate(candidates, metadata.as_ref(), &config))
                .await
                .map_err(|e| PoolError::Internal(format!("validation task failed: {}", e)))?
        };

        info!(
            enumerated = stats.enumerated,
            too_short = stats.too_short,
            not_in_playlist = stats.not_in_playlist,
            no_hash = stats.no_hash,
            no_extra_data = stats.no_extra_data,
            valid = output.songs.len(),
            requestable = output.requestable.len(),
            elapsed = %format_duration_secs(started.elapsed().as_secs_f64()),
            "Filter pass complete"
        );

        Ok(output)
    }

    /// Duration, playlist, hash and extra-data screening
    fn screen(
        &self,
        items: Vec<Arc<LibraryItem>>,
        config: &FilterConfig,
    ) -> (Vec<Candidate>, FilterStats) {
        let mut stats = FilterStats {
            enumerated: items.len(),
            ..Default::default()
        };

        let min_length = config.min_playable_seconds();

        let membership: Option<PlaylistMembership> = match (config.playlist_name(), &self.playlists)
        {
            (Some(name), Some(provider)) if provider.is_available() => Some(membership_for(
                provider.as_ref(),
                name,
                config.playlist_only_highlighted,
            )),
            (Some(name), _) => {
                debug!("Playlist '{}' configured but no playlists available", name);
                None
            }
            _ => None,
        };

        let mut candidates = Vec::new();

        for item in items {
            if item.playable_duration() < min_length {
                stats.too_short += 1;
                continue;
            }

            let highlighted = match membership.as_ref().map(|m| m.lookup(&item)) {
                Some(Membership::Absent) => {
                    stats.not_in_playlist += 1;
                    continue;
                }
                Some(Membership::Highlighted(mask)) => Some(mask),
                Some(Membership::Unrestricted) | None => None,
            };

            let Some(hash) = item.content_hash() else {
                stats.no_hash += 1;
                continue;
            };

            let extra = match (&self.extra_data, &item.local_path) {
                (Some(resolver), Some(local_path)) => match resolver.resolve(&hash, local_path) {
                    Some(difficulties) => Some(ExtraDataLookup::new(difficulties)),
                    None => {
                        stats.no_extra_data += 1;
                        continue;
                    }
                },
                _ => None,
            };

            candidates.push(Candidate {
                item,
                hash,
                highlighted,
                extra,
            });
        }

        (candidates, stats)
    }
}

/// Per-difficulty validation and the requestable index
fn validate(
    candidates: Vec<Candidate>,
    metadata: &dyn SongMetadata,
    config: &FilterConfig,
) -> FilterOutput {
    let mut songs = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        let mask = valid_difficulties(&candidate, metadata, config);
        if let Some(song) = ValidSong::new(candidate.item, mask) {
            songs.push(song);
        }
    }

    // Second, independent gate: only songs the metadata service knows can be requested
    let mut requestable = HashMap::new();
    for (index, song) in songs.iter().enumerate() {
        let Some(hash) = song.item().content_hash() else {
            continue;
        };
        if metadata.find_by_hash(&hash).is_some() {
            requestable.insert(hash, index);
        }
    }

    FilterOutput { songs, requestable }
}

fn valid_difficulties(
    candidate: &Candidate,
    metadata: &dyn SongMetadata,
    config: &FilterConfig,
) -> DiffMask {
    let advanced = &config.advanced;
    let mut mask = DiffMask::EMPTY;

    for set in candidate
        .item
        .difficulty_sets
        .iter()
        .filter(|set| set.is_standard())
    {
        let song: Option<Arc<SongStats>> = if advanced.enabled {
            match metadata.find_by_hash(&candidate.hash) {
                Some(song) if song.bpm >= advanced.bpm_min => Some(song),
                _ => continue,
            }
        } else {
            None
        };

        for &difficulty in &set.difficulties {
            if let Some(highlighted) = candidate.highlighted {
                if !highlighted.contains(difficulty) {
                    continue;
                }
            }

            if let Some(extra) = &candidate.extra {
                match extra.requirements(STANDARD_CHARACTERISTIC, difficulty) {
                    Some(requirements) if requirements.is_empty() => {}
                    _ => continue,
                }
            }

            if let Some(song) = &song {
                if !passes_advanced(song, difficulty, config) {
                    continue;
                }
            }

            mask.insert(difficulty);
        }
    }

    mask
}

fn passes_advanced(song: &SongStats, difficulty: Difficulty, config: &FilterConfig) -> bool {
    let advanced = &config.advanced;

    let Some(stats) = song.standard_stats(difficulty) else {
        return false;
    };

    if stats.njs < advanced.njs_min || stats.njs > advanced.njs_max {
        return false;
    }

    match song.notes_per_second(stats) {
        Some(nps) if nps >= advanced.nps_min && nps <= advanced.nps_max => {}
        _ => return false,
    }

    !advanced.only_ranked || stats.ranked
}
