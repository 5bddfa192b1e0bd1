//! Queue change type definitions

use serde::{Deserialize, Serialize};

/// Why the request queue changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum QueueChangeTrigger {
    /// A chat request was accepted
    ChatRequest,
    /// A downstream consumer took the head entry
    Consumed,
    /// A specific entry was removed
    Removed,
    /// The queue was emptied
    Cleared,
}

impl std::fmt::Display for QueueChangeTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueChangeTrigger::ChatRequest => write!(f, "ChatRequest"),
            QueueChangeTrigger::Consumed => write!(f, "Consumed"),
            QueueChangeTrigger::Removed => write!(f, "Removed"),
            QueueChangeTrigger::Cleared => write!(f, "Cleared"),
        }
    }
}
