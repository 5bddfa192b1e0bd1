//! Error types for chaos-rq
//!
//! Chat-facing request rejections are not errors; see
//! [`crate::request::RequestRejection`].

use thiserror::Error;

/// Main error type for the request service
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pool rebuild or collaborator errors
    #[error("Pool error: {0}")]
    Pool(#[from] chaos_pool::PoolError),

    /// Chat transport errors
    #[error("Chat error: {0}")]
    Chat(String),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),

    /// File / socket I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Queue management errors
    #[error("Queue error: {0}")]
    Queue(String),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<chaos_common::Error> for Error {
    fn from(e: chaos_common::Error) -> Self {
        Error::Config(e.to_string())
    }
}

/// Convenience Result type using chaos-rq Error
pub type Result<T> = std::result::Result<T, Error>;
