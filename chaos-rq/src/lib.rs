//! # Chaos Request Service (chaos-rq)
//!
//! Serves a chat-driven request queue against the filtered map pool.
//!
//! **Purpose:** Connect to Twitch chat, validate `!chaos` requests against the
//! current pool generation, queue accepted requests, and expose queue/pool
//! status over HTTP and SSE.

pub mod api;
pub mod chat;
pub mod error;
pub mod queue;
pub mod request;
pub mod state;

pub use error::{Error, Result};
pub use queue::{QueuedSong, RequestQueue};
pub use request::{RequestHandler, RequestOutcome, RequestRejection};
pub use state::SharedState;
