//! SQLite-backed library source
//!
//! The installed library is mirrored into two tables by an external importer:
//!
//! ```text
//! levels(level_id, pack, song_name, duration, time_offset, local_path)
//! level_difficulties(level_id, characteristic, difficulty)
//! ```
//!
//! Items are grouped into collections by `pack`. The database is opened
//! read-only; this crate never writes library data outside of tests.

use async_trait::async_trait;
use chaos_common::Difficulty;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{PoolError, Result};
use crate::library::{DifficultySet, LibraryCollection, LibraryItem, LibrarySource};

/// Library source reading the level tables
#[derive(Clone)]
pub struct SqliteLibrary {
    db: SqlitePool,
}

impl SqliteLibrary {
    /// Wrap an existing pool
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Open the database at `path` read-only
    pub async fn connect_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PoolError::Library(format!(
                "Library database not found: {}",
                path.display()
            )));
        }

        let db_url = format!("sqlite://{}?mode=ro", path.display());
        let db = SqlitePoolOptions::new()
            .max_connections(4)
            .connect(&db_url)
            .await?;

        info!("Opened library database (read-only): {}", path.display());
        Ok(Self { db })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db
    }
}

/// Create the level tables if they do not exist
pub async fn ensure_schema(db: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS levels (
            level_id TEXT PRIMARY KEY,
            pack TEXT NOT NULL DEFAULT 'Custom Levels',
            song_name TEXT NOT NULL DEFAULT '',
            duration REAL NOT NULL,
            time_offset REAL NOT NULL DEFAULT 0,
            local_path TEXT
        )
        "#,
    )
    .execute(db)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS level_difficulties (
            level_id TEXT NOT NULL REFERENCES levels(level_id) ON DELETE CASCADE,
            characteristic TEXT NOT NULL,
            difficulty TEXT NOT NULL,
            PRIMARY KEY (level_id, characteristic, difficulty)
        )
        "#,
    )
    .execute(db)
    .await?;

    Ok(())
}

#[async_trait]
impl LibrarySource for SqliteLibrary {
    async fn collections(&self) -> Result<Vec<LibraryCollection>> {
        let levels = sqlx::query_as::<_, (String, String, String, f64, f64, Option<String>)>(
            r#"
            SELECT level_id, pack, song_name, duration, time_offset, local_path
            FROM levels
            ORDER BY pack ASC, rowid ASC
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        let rows = sqlx::query_as::<_, (String, String, String)>(
            r#"
            SELECT level_id, characteristic, difficulty
            FROM level_difficulties
            ORDER BY rowid ASC
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        // level_id -> characteristic sets, in first-seen order
        let mut sets: HashMap<String, Vec<DifficultySet>> = HashMap::new();
        for (level_id, characteristic, difficulty) in rows {
            let difficulty = match difficulty.parse::<Difficulty>() {
                Ok(d) => d,
                Err(_) => {
                    debug!(
                        "Skipping unknown difficulty '{}' on {}",
                        difficulty, level_id
                    );
                    continue;
                }
            };

            let level_sets = sets.entry(level_id).or_default();
            match level_sets
                .iter_mut()
                .find(|s| s.characteristic == characteristic)
            {
                Some(set) => {
                    if !set.difficulties.contains(&difficulty) {
                        set.difficulties.push(difficulty);
                    }
                }
                None => level_sets.push(DifficultySet::new(characteristic, vec![difficulty])),
            }
        }

        let mut collections: Vec<LibraryCollection> = Vec::new();
        for (level_id, pack, song_name, duration, time_offset, local_path) in levels {
            let item = LibraryItem {
                difficulty_sets: sets.remove(&level_id).unwrap_or_default(),
                level_id,
                song_name,
                duration_secs: duration as f32,
                time_offset_secs: time_offset as f32,
                local_path: local_path.map(PathBuf::from),
            };

            match collections.last_mut() {
                Some(collection) if collection.name == pack => {
                    collection.items.push(item.into());
                }
                _ => collections.push(LibraryCollection {
                    name: pack,
                    items: vec![item.into()],
                }),
            }
        }

        debug!(
            "Loaded {} collections ({} items) from library database",
            collections.len(),
            collections.iter().map(|c| c.items.len()).sum::<usize>()
        );
        Ok(collections)
    }
}
