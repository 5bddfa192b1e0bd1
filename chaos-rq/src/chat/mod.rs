//! Chat transport
//!
//! Inbound messages arrive on an mpsc channel; replies go out through a
//! [`ChatTransport`].

pub mod twitch;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;

pub use twitch::TwitchChat;

/// One inbound chat line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    /// Login name of the author
    pub sender: String,
    pub text: String,
    /// Channel name without `#`
    pub channel: String,
}

impl ChatMessage {
    pub fn new(
        sender: impl Into<String>,
        text: impl Into<String>,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            sender: sender.into(),
            text: text.into(),
            channel: channel.into(),
        }
    }
}

/// Outbound side of a chat connection
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send `text` to `channel`
    async fn send(&self, text: &str, channel: &str) -> Result<()>;
}
