//! Configuration loading and reloading
//!
//! All settings live in a single TOML file. Every field has a default, so a
//! missing file or a partial file never prevents startup. The file is read
//! again in full before each rebuild and each handled chat command; callers
//! always work on an immutable snapshot.
//!
//! Config file resolution order:
//! 1. Command-line argument (highest priority)
//! 2. `CHAOS_CONFIG` environment variable
//! 3. `<platform config dir>/chaos/config.toml`

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{debug, info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "CHAOS_CONFIG";

/// Complete configuration file contents
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChaosConfig {
    pub logging: LoggingConfig,
    pub library: LibraryConfig,
    pub metadata: MetadataConfig,
    pub playlists: PlaylistsConfig,
    pub filter: FilterConfig,
    pub request: RequestConfig,
    pub chat: ChatConfig,
    pub pool: PoolConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level for the chaos crates when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Library database location
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// SQLite database listing installed levels
    pub database: Option<PathBuf>,
}

/// Song metadata catalog source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    /// Local copy of the catalog dump
    pub cache_file: Option<PathBuf>,
    /// Where to download the dump from when the cache is missing or stale
    pub dump_url: Option<String>,
    /// Cache age after which a fresh download is attempted
    pub max_cache_age_hours: u64,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            cache_file: None,
            dump_url: None,
            max_cache_age_hours: 24,
        }
    }
}

/// Playlist directory
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaylistsConfig {
    /// Directory holding `.bplist` / `.json` playlists
    pub directory: Option<PathBuf>,
}

/// Pool filter settings, consumed at the start of every rebuild
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Minimum playable length (duration minus start offset)
    pub min_seconds: f32,
    pub jumpcut_enabled: bool,
    /// Minimum length when jump-cut mode is on
    pub jumpcut_min_seconds: f32,
    /// Restrict the pool to this playlist (empty = no restriction)
    pub playlist: Option<String>,
    /// Only allow the difficulties highlighted in the playlist entry
    pub playlist_only_highlighted: bool,
    pub advanced: AdvancedFilterConfig,
}

impl FilterConfig {
    /// Effective minimum playable length
    pub fn min_playable_seconds(&self) -> f32 {
        if self.jumpcut_enabled {
            self.min_seconds.max(self.jumpcut_min_seconds)
        } else {
            self.min_seconds
        }
    }

    /// Configured playlist name, ignoring blank values
    pub fn playlist_name(&self) -> Option<&str> {
        self.playlist
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_seconds: 60.0,
            jumpcut_enabled: false,
            jumpcut_min_seconds: 0.0,
            playlist: None,
            playlist_only_highlighted: false,
            advanced: AdvancedFilterConfig::default(),
        }
    }
}

/// Statistical filters backed by the metadata catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvancedFilterConfig {
    pub enabled: bool,
    pub bpm_min: f32,
    pub njs_min: f32,
    pub njs_max: f32,
    pub nps_min: f32,
    pub nps_max: f32,
    pub only_ranked: bool,
}

impl Default for AdvancedFilterConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bpm_min: 0.0,
            njs_min: 0.0,
            njs_max: 25.0,
            nps_min: 0.0,
            nps_max: 12.0,
            only_ranked: false,
        }
    }
}

/// Chat request settings, consumed for every handled command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    pub enabled: bool,
    /// Command prefix that triggers a request
    pub command: String,
    /// Maximum queued requests per chat user
    pub limit_per_user: usize,
    /// Queue capacity
    pub queue_size: usize,
    pub allow_specific_diff: bool,
    pub allow_specific_time: bool,
    /// Pick the hardest valid difficulty instead of a random one
    pub prefer_top_diff: bool,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: "!chaos".to_string(),
            limit_per_user: 2,
            queue_size: 16,
            allow_specific_diff: true,
            allow_specific_time: true,
            prefer_top_diff: false,
        }
    }
}

/// Twitch chat connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// IRC server as `host:port`
    pub server: String,
    /// Login name (anonymous when unset)
    pub nick: Option<String>,
    /// OAuth token, with or without the `oauth:` prefix
    pub oauth_token: Option<String>,
    /// Channels to join, with or without `#`
    pub channels: Vec<String>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            server: "irc.chat.twitch.tv:6667".to_string(),
            nick: None,
            oauth_token: None,
            channels: Vec::new(),
        }
    }
}

/// Pool refresh scheduling
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Periodic rebuild interval (0 = only at startup and on demand)
    pub refresh_interval_secs: u64,
}

/// Parse a config file
pub fn read_config_file(path: &Path) -> Result<ChaosConfig> {
    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str(&content)?;
    Ok(config)
}

/// Write a config file atomically (temp file + rename)
pub fn write_config_file(config: &ChaosConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, content)?;
    std::fs::rename(&temp_path, path)?;
    Ok(())
}

/// Resolve which config file to use
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    default_config_path()
}

/// Platform default config file location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("chaos").join("config.toml"))
}

/// Reloading configuration source
///
/// `load()` re-reads the file every time. A missing file yields defaults; a
/// file that fails to parse keeps the last snapshot that did.
pub struct ConfigStore {
    path: Option<PathBuf>,
    last_good: RwLock<ChaosConfig>,
}

impl ConfigStore {
    /// Create a store backed by `path` and perform the initial load
    pub fn new(path: Option<PathBuf>) -> Self {
        let store = Self {
            path,
            last_good: RwLock::new(ChaosConfig::default()),
        };

        match &store.path {
            Some(path) if !path.exists() => {
                warn!(
                    "Config file {} not found, using defaults",
                    path.display()
                );
            }
            Some(path) => {
                info!("Using config file {}", path.display());
                store.load();
            }
            None => warn!("No config file location available, using defaults"),
        }

        store
    }

    /// Store with a fixed in-memory configuration and no backing file
    pub fn fixed(config: ChaosConfig) -> Self {
        Self {
            path: None,
            last_good: RwLock::new(config),
        }
    }

    /// Backing file, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Reload and return a full configuration snapshot
    ///
    /// Blocking; async callers use [`ConfigStore::reload`].
    pub fn load(&self) -> ChaosConfig {
        let Some(path) = &self.path else {
            return self.current();
        };

        self.apply(path, read_config_file(path))
    }

    /// Async variant of [`ConfigStore::load`] that reads through `tokio::fs`
    pub async fn reload(&self) -> ChaosConfig {
        let Some(path) = &self.path else {
            return self.current();
        };

        let result = match tokio::fs::read_to_string(path).await {
            Ok(content) => toml::from_str(&content).map_err(Error::from),
            Err(e) => Err(Error::from(e)),
        };
        self.apply(path, result)
    }

    /// Last successfully loaded snapshot, without touching the file
    pub fn current(&self) -> ChaosConfig {
        self.last_good
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn apply(&self, path: &Path, result: Result<ChaosConfig>) -> ChaosConfig {
        match result {
            Ok(config) => {
                *self.last_good.write().unwrap_or_else(|e| e.into_inner()) = config.clone();
                config
            }
            Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Config file {} missing, using defaults", path.display());
                let config = ChaosConfig::default();
                *self.last_good.write().unwrap_or_else(|e| e.into_inner()) = config.clone();
                config
            }
            Err(e) => {
                warn!(
                    "Failed to reload {}: {} (keeping previous settings)",
                    path.display(),
                    e
                );
                self.current()
            }
        }
    }
}
