//! Published pool generations
//!
//! The filtered song list and its requestable index are published together
//! as one immutable [`PoolGeneration`]. Readers clone an `Arc` to the current
//! generation and never observe a half-built pool; a failed rebuild leaves
//! the previous generation in place.

use chaos_common::config::FilterConfig;
use chaos_common::level_id::normalize_hash;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::Result;
use crate::filter::{FilterOutput, PoolFilter};
use crate::metadata::SongMetadata;
use crate::valid_song::ValidSong;

/// One published result of a filter pass
#[derive(Debug)]
pub struct PoolGeneration {
    generation: u64,
    songs: Vec<ValidSong>,
    requestable: HashMap<String, usize>,
    built_at: DateTime<Utc>,
}

impl PoolGeneration {
    pub fn new(generation: u64, output: FilterOutput) -> Self {
        Self {
            generation,
            songs: output.songs,
            requestable: output.requestable,
            built_at: Utc::now(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    pub fn songs(&self) -> &[ValidSong] {
        &self.songs
    }

    pub fn valid_count(&self) -> usize {
        self.songs.len()
    }

    pub fn requestable_count(&self) -> usize {
        self.requestable.len()
    }

    pub fn is_requestable(&self, hash: &str) -> bool {
        self.requestable.contains_key(&normalize_hash(hash))
    }

    /// Pool entry for a requestable content hash
    pub fn requestable_song(&self, hash: &str) -> Option<&ValidSong> {
        self.requestable
            .get(&normalize_hash(hash))
            .and_then(|&index| self.songs.get(index))
    }
}

/// Handle owning the filter and the currently published generation
pub struct MapPool {
    filter: PoolFilter,
    current: RwLock<Option<Arc<PoolGeneration>>>,
    /// Held for the whole rebuild; only one rebuild runs at a time
    rebuild_lock: Mutex<()>,
    next_generation: AtomicU64,
}

impl MapPool {
    pub fn new(filter: PoolFilter) -> Self {
        Self {
            filter,
            current: RwLock::new(None),
            rebuild_lock: Mutex::new(()),
            next_generation: AtomicU64::new(1),
        }
    }

    /// Current generation, if one is published
    pub fn snapshot(&self) -> Option<Arc<PoolGeneration>> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn is_available(&self) -> bool {
        self.snapshot().is_some()
    }

    /// Drop the published generation
    pub fn clear(&self) {
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = None;
        info!("Map pool cleared");
    }

    pub fn metadata(&self) -> &Arc<dyn SongMetadata> {
        self.filter.metadata()
    }

    /// Content hash for a short map key
    pub fn resolve_short_id(&self, key: &str) -> Option<String> {
        self.filter.metadata().resolve_short_id(key)
    }

    /// True while a rebuild holds the lock
    pub fn is_rebuilding(&self) -> bool {
        self.rebuild_lock.try_lock().is_err()
    }

    /// Run a filter pass and publish the result
    ///
    /// Concurrent callers are serialized. On error nothing is published.
    pub async fn rebuild(&self, config: &FilterConfig) -> Result<Arc<PoolGeneration>> {
        let _guard = self.rebuild_lock.lock().await;

        let output = match self.filter.run(config).await {
            Ok(output) => output,
            Err(e) => {
                warn!(
                    "Pool rebuild failed, keeping generation {:?}: {}",
                    self.snapshot().map(|g| g.generation()),
                    e
                );
                return Err(e);
            }
        };

        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        let published = Arc::new(PoolGeneration::new(generation, output));

        *self.current.write().unwrap_or_else(|e| e.into_inner()) = Some(published.clone());

        info!(
            generation,
            valid = published.valid_count(),
            requestable = published.requestable_count(),
            "Published map pool"
        );

        Ok(published)
    }
}
