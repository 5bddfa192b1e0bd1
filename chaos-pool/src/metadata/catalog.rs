//! Catalog-dump backed metadata service
//!
//! The catalog is a JSON dump of every published map:
//!
//! ```json
//! {"songs": [{"key": "25f", "hash": "…", "bpm": 128.0, "duration_secs": 183.0,
//!             "difficulties": [{"characteristic": "Standard", "difficulty": "Hard",
//!                               "njs": 16.0, "notes": 612, "ranked": false}]}]}
//! ```
//!
//! A local cache file is preferred while it is younger than the configured
//! maximum age. Otherwise the dump is downloaded and the cache rewritten; if
//! the download fails, a stale cache is still better than nothing.

use async_trait::async_trait;
use chaos_common::config::MetadataConfig;
use chaos_common::level_id::normalize_hash;
use chaos_common::Difficulty;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::{DifficultyStats, SongMetadata, SongStats};
use crate::error::{PoolError, Result};
use crate::library::STANDARD_CHARACTERISTIC;

const USER_AGENT: &str = concat!("chaos-pool/", env!("CARGO_PKG_VERSION"));
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Deserialize)]
struct CatalogDump {
    #[serde(default)]
    songs: Vec<RawSong>,
}

#[derive(Debug, Deserialize)]
struct RawSong {
    key: String,
    hash: String,
    #[serde(default)]
    bpm: f32,
    #[serde(default)]
    duration_secs: f32,
    #[serde(default)]
    difficulties: Vec<RawDifficulty>,
}

#[derive(Debug, Deserialize)]
struct RawDifficulty {
    #[serde(default = "standard_characteristic")]
    characteristic: String,
    difficulty: String,
    #[serde(default)]
    njs: f32,
    #[serde(default)]
    notes: u32,
    #[serde(default)]
    ranked: bool,
}

fn standard_characteristic() -> String {
    STANDARD_CHARACTERISTIC.to_string()
}

/// Parse a catalog dump
///
/// Difficulty entries with unknown names are dropped.
pub fn parse_catalog(json: &[u8]) -> Result<Vec<SongStats>> {
    let dump: CatalogDump = serde_json::from_slice(json)?;

    Ok(dump
        .songs
        .into_iter()
        .map(|raw| SongStats {
            hash: normalize_hash(&raw.hash),
            key: raw.key.trim().to_ascii_lowercase(),
            bpm: raw.bpm,
            duration_secs: raw.duration_secs,
            difficulties: raw
                .difficulties
                .into_iter()
                .filter_map(|d| {
                    let difficulty = d.difficulty.parse::<Difficulty>().ok()?;
                    Some(DifficultyStats {
                        characteristic: d.characteristic,
                        difficulty,
                        njs: d.njs,
                        notes: d.notes,
                        ranked: d.ranked,
                    })
                })
                .collect(),
        })
        .collect())
}

struct CatalogIndex {
    by_hash: HashMap<String, Arc<SongStats>>,
    /// lowercase key -> uppercase hash
    by_key: HashMap<String, String>,
}

impl CatalogIndex {
    fn build(songs: Vec<SongStats>) -> Self {
        let mut by_hash = HashMap::with_capacity(songs.len());
        let mut by_key = HashMap::with_capacity(songs.len());

        for mut song in songs {
            song.hash = normalize_hash(&song.hash);
            song.key = song.key.trim().to_ascii_lowercase();
            if !song.key.is_empty() {
                by_key.insert(song.key.clone(), song.hash.clone());
            }
            by_hash.insert(song.hash.clone(), Arc::new(song));
        }

        Self { by_hash, by_key }
    }
}

/// Where the catalog comes from
enum CatalogSource {
    Dump {
        cache_file: Option<PathBuf>,
        dump_url: Option<String>,
        /// `None` = a cache never goes stale
        max_age: Option<Duration>,
    },
    Preloaded,
}

/// Init-once metadata catalog
pub struct SongCatalog {
    source: CatalogSource,
    index: OnceCell<CatalogIndex>,
}

impl SongCatalog {
    /// Catalog loaded from the configured cache file / dump URL
    ///
    /// `max_cache_age_hours = 0` keeps a cache forever.
    pub fn from_config(config: &MetadataConfig) -> Self {
        let max_age = match config.max_cache_age_hours {
            0 => None,
            hours => Some(Duration::from_secs(hours * 3600)),
        };

        Self {
            source: CatalogSource::Dump {
                cache_file: config.cache_file.clone(),
                dump_url: config.dump_url.clone(),
                max_age,
            },
            index: OnceCell::new(),
        }
    }

    /// Catalog over a fixed song list, ready immediately
    pub fn with_songs(songs: Vec<SongStats>) -> Self {
        Self {
            source: CatalogSource::Preloaded,
            index: OnceCell::from(CatalogIndex::build(songs)),
        }
    }

    /// Number of songs, 0 before initialization
    pub fn len(&self) -> usize {
        self.index.get().map(|i| i.by_hash.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn load(&self) -> Result<CatalogIndex> {
        let CatalogSource::Dump {
            cache_file,
            dump_url,
            max_age,
        } = &self.source
        else {
            return Err(PoolError::Internal(
                "preloaded catalog has no backing source".to_string(),
            ));
        };

        let cache_state = cache_file.as_deref().map(|path| cache_freshness(path, *max_age));

        let bytes = match (cache_file.as_deref(), cache_state, dump_url.as_deref()) {
            (Some(path), Some(CacheState::Fresh), _) => {
                debug!("Using catalog cache {}", path.display());
                tokio::fs::read(path).await?
            }
            (cache, state, Some(url)) => match download(url).await {
                Ok(bytes) => {
                    if let Some(path) = cache {
                        if let Err(e) = write_cache(path, &bytes).await {
                            warn!("Failed to write catalog cache {}: {}", path.display(), e);
                        }
                    }
                    bytes
                }
                Err(e) => match (cache, state) {
                    (Some(path), Some(CacheState::Stale)) => {
                        warn!(
                            "Catalog download failed ({}), using stale cache {}",
                            e,
                            path.display()
                        );
                        tokio::fs::read(path).await?
                    }
                    _ => return Err(PoolError::MetadataUnavailable(e.to_string())),
                },
            },
            (Some(path), Some(CacheState::Stale), None) => {
                debug!(
                    "Catalog cache {} is stale and no dump URL is configured",
                    path.display()
                );
                tokio::fs::read(path).await?
            }
            _ => {
                return Err(PoolError::MetadataUnavailable(
                    "no catalog cache and no dump URL configured".to_string(),
                ))
            }
        };

        let songs = parse_catalog(&bytes)?;
        info!("Loaded song catalog: {} songs", songs.len());
        Ok(CatalogIndex::build(songs))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CacheState {
    Fresh,
    Stale,
    Missing,
}

fn cache_freshness(path: &Path, max_age: Option<Duration>) -> CacheState {
    let Ok(metadata) = std::fs::metadata(path) else {
        return CacheState::Missing;
    };

    let Some(max_age) = max_age else {
        return CacheState::Fresh;
    };

    let age = metadata
        .modified()
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .unwrap_or_default();

    if age <= max_age {
        CacheState::Fresh
    } else {
        CacheState::Stale
    }
}

async fn download(url: &str) -> Result<Vec<u8>> {
    info!(url = %url, "Downloading song catalog");

    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(DOWNLOAD_TIMEOUT)
        .build()?;

    let response = client.get(url).send().await?.error_for_status()?;
    let bytes = response.bytes().await?;

    // Refuse to replace a good cache with something unparsable
    let _: CatalogDump = serde_json::from_slice(&bytes)?;
    Ok(bytes.to_vec())
}

async fn write_cache(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let temp_path = path.with_extension("tmp");
    tokio::fs::write(&temp_path, bytes).await?;
    tokio::fs::rename(&temp_path, path).await?;
    Ok(())
}

#[async_trait]
impl SongMetadata for SongCatalog {
    async fn initialize(&self) -> Result<()> {
        self.index
            .get_or_try_init(|| self.load())
            .await
            .map(|_| ())
            .map_err(|e| match e {
                PoolError::MetadataUnavailable(_) => e,
                other => PoolError::MetadataUnavailable(other.to_string()),
            })
    }

    fn is_ready(&self) -> bool {
        self.index.initialized()
    }

    fn resolve_short_id(&self, key: &str) -> Option<String> {
        let index = self.index.get()?;
        index.by_key.get(&key.trim().to_ascii_lowercase()).cloned()
    }

    fn find_by_hash(&self, hash: &str) -> Option<Arc<SongStats>> {
        let index = self.index.get()?;
        index.by_hash.get(&normalize_hash(hash)).cloned()
    }
}
