//! # Chaos Pool
//!
//! Builds the pool of songs that can be played and requested:
//! - Library sources (in-memory, SQLite)
//! - Song metadata catalog (initialized once, lazily)
//! - Info.dat extra-data resolver
//! - Playlist provider and per-rebuild playlist membership
//! - The filter engine and the published [`MapPool`] generations

pub mod db;
pub mod error;
pub mod extra_data;
pub mod filter;
pub mod library;
pub mod metadata;
pub mod playlist;
pub mod pool;
pub mod valid_song;

pub use error::{PoolError, Result};
pub use filter::{FilterOutput, PoolFilter};
pub use library::{LibraryCollection, LibraryItem, LibrarySource, StaticLibrary};
pub use metadata::{SongCatalog, SongMetadata, SongStats};
pub use pool::{MapPool, PoolGeneration};
pub use valid_song::ValidSong;
