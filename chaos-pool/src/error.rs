//! Error types for chaos-pool
//!
//! Ordinary exclusions during filtering (missing hash, unresolvable extra
//! data, missing stats) are not errors. Only failures that make a rebuild
//! impossible surface here.

use thiserror::Error;

/// Main error type for the pool crate
#[derive(Error, Debug)]
pub enum PoolError {
    /// The metadata catalog could not be initialized
    #[error("Metadata service unavailable: {0}")]
    MetadataUnavailable(String),

    /// The library could not be enumerated
    #[error("Library error: {0}")]
    Library(String),

    /// Library database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON (catalog dump, playlists, Info.dat)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Catalog download errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using PoolError
pub type Result<T> = std::result::Result<T, PoolError>;
