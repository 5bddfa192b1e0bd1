//! Chat request handling
//!
//! Turns `!chaos <map id> [difficulty] [m:ss]` chat messages into queue
//! entries. Messages are handled one at a time; validation and insertion run
//! under the queue lock so two viewers cannot both claim the last slot.

pub mod command;

use chaos_common::config::RequestConfig;
use chaos_common::events::{ChaosEvent, QueueChangeTrigger};
use chaos_common::human_time::format_minutes_seconds;
use chaos_common::level_id::{custom_level_id, is_content_hash, normalize_hash};
use chaos_common::Difficulty;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::chat::{ChatMessage, ChatTransport};
use crate::queue::{QueuedSong, RequestQueue};
use crate::state::SharedState;

pub use command::{match_diff_time, DiffTimeMatch, RequestCommand};

/// Why a request was turned down
///
/// `Display` is the text sent back to chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestRejection {
    QueueFull,
    MissingTarget { command: String },
    UnknownMapId,
    PoolNotReady,
    NotRequestable,
    UserLimit { limit: usize },
    AlreadyQueued,
    InvalidTime,
    InvalidDifficulty,
    UnsupportedDifficulty(Difficulty),
    /// The queue refused an entry that passed validation
    QueueRejected,
}

impl fmt::Display for RequestRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestRejection::QueueFull => write!(f, "The queue is full"),
            RequestRejection::MissingTarget { command } => {
                write!(f, "Usage: {} <map id> [difficulty] [m:ss]", command)
            }
            RequestRejection::UnknownMapId => write!(f, "Unknown Map ID"),
            RequestRejection::PoolNotReady => write!(f, "The map pool is not ready yet"),
            RequestRejection::NotRequestable => write!(
                f,
                "The Map is not downloaded or does not match the configured filters"
            ),
            RequestRejection::UserLimit { limit } => {
                write!(f, "You already have {} Maps in the queue", limit)
            }
            RequestRejection::AlreadyQueued => {
                write!(f, "This song is already in the queue currently")
            }
            RequestRejection::InvalidTime => write!(f, "Invalid time (Ex: 2:33)"),
            RequestRejection::InvalidDifficulty => {
                write!(f, "Invalid difficulty (Ex: 'hard' or 'ExpertPlus')")
            }
            RequestRejection::UnsupportedDifficulty(diff) => write!(
                f,
                "The {} difficulty does not match the configured filters",
                diff
            ),
            RequestRejection::QueueRejected => write!(f, "Couldnt queue map (Unknown error)"),
        }
    }
}

/// Result of handling one chat message
#[derive(Debug, Clone, PartialEq)]
pub enum RequestOutcome {
    /// Not a request command, or requests are disabled
    Ignored,
    Queued(QueuedSong),
    Rejected(RequestRejection),
}

/// Prefix every reply with the addressed user
pub fn format_reply(sender: &str, body: &str) -> String {
    format!("! @{} {}", sender, body)
}

/// Acknowledgement text for an accepted request
pub fn acknowledgement(target: &str, song: &QueuedSong) -> String {
    match song.start_time_secs {
        Some(secs) => format!(
            "Queued {} ({}) from {}",
            target,
            song.difficulty,
            format_minutes_seconds(secs)
        ),
        None => format!("Queued {} ({})", target, song.difficulty),
    }
}

/// Validates chat commands and feeds the request queue
pub struct RequestHandler {
    state: Arc<SharedState>,
    transport: Arc<dyn ChatTransport>,
    rng: Mutex<StdRng>,
}

impl RequestHandler {
    pub fn new(state: Arc<SharedState>, transport: Arc<dyn ChatTransport>) -> Self {
        Self {
            state,
            transport,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Handler with a reproducible difficulty pick
    pub fn with_seed(state: Arc<SharedState>, transport: Arc<dyn ChatTransport>, seed: u64) -> Self {
        Self {
            state,
            transport,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Handle messages until the inbound channel closes
    pub async fn run(self: Arc<Self>, mut rx: mpsc::Receiver<ChatMessage>) {
        info!("Chat request handler started");

        while let Some(message) = rx.recv().await {
            self.handle_message(&message).await;
        }

        info!("Chat request handler stopped (inbound channel closed)");
    }

    /// Process one chat message and send the reply
    pub async fn handle_message(&self, message: &ChatMessage) -> RequestOutcome {
        // Settings are re-read for every command
        let config = self.state.config.reload().await.request;

        if !config.enabled {
            return RequestOutcome::Ignored;
        }

        let Some(command) = RequestCommand::parse(&message.text, &config.command) else {
            return RequestOutcome::Ignored;
        };

        let (outcome, reply) = {
            let mut queue = self.state.queue.lock().await;
            queue.set_capacity(config.queue_size);

            match self.validate(&queue, &command, &message.sender, &config) {
                Ok(song) => match queue.enqueue(song.clone()) {
                    Ok(()) => {
                        self.state
                            .queue_changed(&queue, QueueChangeTrigger::ChatRequest);
                        let target = command.target.unwrap_or_default();
                        let reply = acknowledgement(target, &song);
                        (RequestOutcome::Queued(song), reply)
                    }
                    Err(e) => {
                        warn!("Queue refused validated request from {}: {}", message.sender, e);
                        let rejection = RequestRejection::QueueRejected;
                        let reply = rejection.to_string();
                        (RequestOutcome::Rejected(rejection), reply)
                    }
                },
                Err(rejection) => {
                    let reply = rejection.to_string();
                    (RequestOutcome::Rejected(rejection), reply)
                }
            }
        };

        match &outcome {
            RequestOutcome::Queued(song) => {
                info!(
                    source = %song.source,
                    level_id = %song.level_id,
                    difficulty = %song.difficulty,
                    "Queued chat request"
                );
                self.state.broadcast_event(ChaosEvent::RequestQueued {
                    queue_entry_id: song.queue_entry_id,
                    level_id: song.level_id.clone(),
                    difficulty: song.difficulty,
                    start_time_secs: song.start_time_secs,
                    source: song.source.clone(),
                    timestamp: chrono::Utc::now(),
                });
            }
            RequestOutcome::Rejected(rejection) => {
                debug!(
                    "Rejected request {:?} from {}: {}",
                    message.text, message.sender, rejection
                );
                self.state.broadcast_event(ChaosEvent::RequestRejected {
                    source: message.sender.clone(),
                    reason: rejection.to_string(),
                    timestamp: chrono::Utc::now(),
                });
            }
            RequestOutcome::Ignored => {}
        }

        let reply = format_reply(&message.sender, &reply);
        if let Err(e) = self.transport.send(&reply, &message.channel).await {
            warn!("Failed to send chat reply to #{}: {}", message.channel, e);
        }

        outcome
    }

    /// Run every check in order; the first failure wins
    fn validate(
        &self,
        queue: &RequestQueue,
        command: &RequestCommand<'_>,
        sender: &str,
        config: &RequestConfig,
    ) -> Result<QueuedSong, RequestRejection> {
        if queue.is_full() {
            return Err(RequestRejection::QueueFull);
        }

        let target = command.target.ok_or_else(|| RequestRejection::MissingTarget {
            command: config.command.clone(),
        })?;

        // Short ids resolve through the catalog, which loads with the first build
        let generation = self
            .state
            .pool
            .snapshot()
            .ok_or(RequestRejection::PoolNotReady)?;

        let hash = self
            .resolve_hash(target)
            .ok_or(RequestRejection::UnknownMapId)?;
        let song = generation
            .requestable_song(&hash)
            .ok_or(RequestRejection::NotRequestable)?;

        if queue.count_from(sender) >= config.limit_per_user {
            return Err(RequestRejection::UserLimit {
                limit: config.limit_per_user,
            });
        }

        if queue.contains_hash(&hash) {
            return Err(RequestRejection::AlreadyQueued);
        }

        let mut difficulty = None;
        let mut start_time_secs = None;

        if command.has_trailing_args() && (config.allow_specific_diff || config.allow_specific_time)
        {
            let overrides = match_diff_time(command.text);

            if command.token_count >= 4 && overrides.time.is_none() {
                return Err(RequestRejection::InvalidTime);
            }

            if config.allow_specific_diff {
                let diff = overrides
                    .difficulty
                    .ok_or(RequestRejection::InvalidDifficulty)?;
                if !song.is_diff_valid(diff) {
                    return Err(RequestRejection::UnsupportedDifficulty(diff));
                }
                difficulty = Some(diff);
            }

            if config.allow_specific_time {
                start_time_secs = overrides.start_time_secs();
            }
        }

        let difficulty = match difficulty {
            Some(diff) => diff,
            None => {
                let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
                song.random_valid_diff(config.prefer_top_diff, &mut *rng)
            }
        };

        Ok(
            QueuedSong::new(custom_level_id(&hash), &hash, difficulty, sender)
                .with_start_time(start_time_secs),
        )
    }

    /// Content hash for a chat identifier
    fn resolve_hash(&self, target: &str) -> Option<String> {
        let key = target.trim().to_ascii_lowercase();
        if is_content_hash(&key) {
            return Some(normalize_hash(&key));
        }
        self.state.pool.resolve_short_id(&key)
    }
}
