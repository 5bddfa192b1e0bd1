//! Integration tests for the SQLite library source

use chaos_common::Difficulty;
use chaos_pool::db::{ensure_schema, SqliteLibrary};
use chaos_pool::LibrarySource;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::PathBuf;
use tempfile::TempDir;

async fn memory_pool() -> SqlitePool {
    let db = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    ensure_schema(&db).await.unwrap();
    db
}

async fn insert_level(
    db: &SqlitePool,
    level_id: &str,
    pack: &str,
    duration: f64,
    local_path: Option<&str>,
    difficulties: &[(&str, &str)],
) {
    sqlx::query(
        "INSERT INTO levels (level_id, pack, song_name, duration, time_offset, local_path)
         VALUES (?, ?, ?, ?, 0.5, ?)",
    )
    .bind(level_id)
    .bind(pack)
    .bind(format!("{} song", level_id))
    .bind(duration)
    .bind(local_path)
    .execute(db)
    .await
    .unwrap();

    for &(characteristic, difficulty) in difficulties {
        sqlx::query(
            "INSERT INTO level_difficulties (level_id, characteristic, difficulty) VALUES (?, ?, ?)",
        )
        .bind(level_id)
        .bind(characteristic)
        .bind(difficulty)
        .execute(db)
        .await
        .unwrap();
    }
}

#[tokio::test]
async fn test_collections_grouped_by_pack() {
    let db = memory_pool().await;
    insert_level(
        &db,
        "custom_level_A",
        "Custom Levels",
        120.0,
        Some("/levels/a"),
        &[("Standard", "Hard"), ("Standard", "ExpertPlus"), ("OneSaber", "Expert")],
    )
    .await;
    insert_level(&db, "100Bills", "Original", 140.0, None, &[("Standard", "Easy")]).await;
    insert_level(&db, "custom_level_B", "Custom Levels", 90.0, None, &[]).await;

    let library = SqliteLibrary::new(db);
    let collections = library.collections().await.unwrap();

    assert_eq!(collections.len(), 2);
    assert_eq!(collections[0].name, "Custom Levels");
    assert_eq!(collections[0].items.len(), 2);
    assert_eq!(collections[1].name, "Original");

    let a = &collections[0].items[0];
    assert_eq!(a.level_id, "custom_level_A");
    assert_eq!(a.song_name, "custom_level_A song");
    assert_eq!(a.duration_secs, 120.0);
    assert_eq!(a.time_offset_secs, 0.5);
    assert_eq!(a.local_path, Some(PathBuf::from("/levels/a")));
    assert_eq!(a.difficulty_sets.len(), 2);
    assert_eq!(a.difficulty_sets[0].characteristic, "Standard");
    assert_eq!(
        a.difficulty_sets[0].difficulties,
        vec![Difficulty::Hard, Difficulty::ExpertPlus]
    );

    assert!(collections[0].items[1].difficulty_sets.is_empty());
}

#[tokio::test]
async fn test_unknown_difficulty_names_skipped() {
    let db = memory_pool().await;
    insert_level(
        &db,
        "custom_level_C",
        "Custom Levels",
        120.0,
        None,
        &[("Standard", "expert"), ("Standard", "Impossible")],
    )
    .await;

    let collections = SqliteLibrary::new(db).collections().await.unwrap();
    let item = &collections[0].items[0];
    assert_eq!(item.difficulty_sets[0].difficulties, vec![Difficulty::Expert]);
}

#[tokio::test]
async fn test_connect_readonly_missing_file_is_error() {
    let temp_dir = TempDir::new().unwrap();
    let result = SqliteLibrary::connect_readonly(&temp_dir.path().join("absent.db")).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_connect_readonly_existing_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("library.db");

    let db = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&format!("sqlite://{}?mode=rwc", path.display()))
        .await
        .unwrap();
    ensure_schema(&db).await.unwrap();
    insert_level(&db, "custom_level_D", "Custom Levels", 60.0, None, &[("Standard", "Normal")]).await;
    db.close().await;

    let library = SqliteLibrary::connect_readonly(&path).await.unwrap();
    let collections = library.collections().await.unwrap();
    assert_eq!(collections[0].items.len(), 1);
}
