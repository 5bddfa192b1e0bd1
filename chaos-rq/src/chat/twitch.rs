//! Twitch chat over plain IRC
//!
//! One background task owns the TCP connection. It performs the IRC
//! handshake, answers `PING`, forwards `PRIVMSG` lines as [`ChatMessage`]s
//! and writes queued outbound messages. Lost connections are retried with
//! capped exponential backoff.

use async_trait::async_trait;
use chaos_common::config::ChatConfig;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::{ChatMessage, ChatTransport};
use crate::error::{Error, Result};

const INBOUND_CAPACITY: usize = 256;
const OUTBOUND_CAPACITY: usize = 64;
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

#[derive(Debug)]
struct OutboundMessage {
    channel: String,
    text: String,
}

/// Login used for the IRC session
#[derive(Debug, Clone, PartialEq, Eq)]
enum Credentials {
    Anonymous { nick: String },
    Authenticated { nick: String, token: String },
}

impl Credentials {
    fn from_config(config: &ChatConfig) -> Self {
        match (&config.nick, &config.oauth_token) {
            (Some(nick), Some(token)) if !nick.trim().is_empty() && !token.trim().is_empty() => {
                let token = token.trim();
                Credentials::Authenticated {
                    nick: nick.trim().to_ascii_lowercase(),
                    token: if token.starts_with("oauth:") {
                        token.to_string()
                    } else {
                        format!("oauth:{}", token)
                    },
                }
            }
            (None, Some(_)) => {
                warn!("Chat token configured without nick, connecting anonymously");
                Credentials::anonymous()
            }
            _ => Credentials::anonymous(),
        }
    }

    fn anonymous() -> Self {
        let random_num: u32 = rand::random::<u32>() % 100000;
        Credentials::Anonymous {
            nick: format!("justinfan{}", random_num),
        }
    }

    fn nick(&self) -> &str {
        match self {
            Credentials::Anonymous { nick } | Credentials::Authenticated { nick, .. } => nick,
        }
    }

    fn is_anonymous(&self) -> bool {
        matches!(self, Credentials::Anonymous { .. })
    }
}

/// Channel name without `#`, lowercased
pub fn normalize_channel(channel: &str) -> String {
    channel.trim().trim_start_matches('#').to_ascii_lowercase()
}

fn handshake(credentials: &Credentials, channels: &[String]) -> Vec<String> {
    let mut lines = vec!["CAP REQ :twitch.tv/tags twitch.tv/commands".to_string()];

    if let Credentials::Authenticated { token, .. } = credentials {
        lines.push(format!("PASS {}", token));
    }
    lines.push(format!("NICK {}", credentials.nick()));

    for channel in channels {
        lines.push(format!("JOIN #{}", channel));
    }

    lines
}

/// Reply to a server `PING`, if `line` is one
pub fn pong_for(line: &str) -> Option<String> {
    line.strip_prefix("PING")
        .map(|rest| match rest.trim() {
            "" => "PONG :tmi.twitch.tv".to_string(),
            payload => format!("PONG {}", payload),
        })
}

/// Parse a `PRIVMSG` line (IRCv3 tags allowed)
///
/// `@tags :login!login@login.tmi.twitch.tv PRIVMSG #channel :text`
pub fn parse_privmsg(line: &str) -> Option<ChatMessage> {
    let mut remaining = line.trim_end_matches(['\r', '\n']);
    let mut tags = HashMap::new();

    if let Some(tagged) = remaining.strip_prefix('@') {
        let (tag_str, rest) = tagged.split_once(' ')?;
        for tag in tag_str.split(';') {
            if let Some((key, value)) = tag.split_once('=') {
                tags.insert(key, value);
            }
        }
        remaining = rest;
    }

    let parts: Vec<&str> = remaining.splitn(4, ' ').collect();
    if parts.len() < 4 || parts[1] != "PRIVMSG" {
        return None;
    }

    let login = parts[0]
        .strip_prefix(':')
        .and_then(|prefix| prefix.split('!').next())
        .filter(|login| !login.is_empty())?;

    let text = parts[3].strip_prefix(':').unwrap_or(parts[3]);

    // Prefer the login tag over the prefix when present
    let sender = tags
        .get("login")
        .copied()
        .filter(|l| !l.is_empty())
        .unwrap_or(login);

    Some(ChatMessage::new(
        sender.to_ascii_lowercase(),
        text.trim(),
        normalize_channel(parts[2]),
    ))
}

/// True for the server's `RECONNECT` notice
fn is_reconnect(line: &str) -> bool {
    let untagged = match line.strip_prefix('@') {
        Some(tagged) => tagged.split_once(' ').map(|(_, rest)| rest).unwrap_or(""),
        None => line,
    };
    let mut parts = untagged.split_whitespace();
    match parts.next() {
        Some(first) if first.starts_with(':') => parts.next() == Some("RECONNECT"),
        first => first == Some("RECONNECT"),
    }
}

fn strip_line_breaks(text: &str) -> String {
    text.chars()
        .map(|c| if c == '\r' || c == '\n' { ' ' } else { c })
        .collect()
}

/// Outbound handle of a Twitch chat connection
pub struct TwitchChat {
    outbound: mpsc::Sender<OutboundMessage>,
    anonymous: bool,
}

impl TwitchChat {
    /// Start the connection task
    ///
    /// Returns the outbound handle and the stream of inbound messages. The
    /// task ends once the inbound receiver is dropped.
    pub fn connect(config: &ChatConfig) -> Result<(Arc<TwitchChat>, mpsc::Receiver<ChatMessage>)> {
        let channels: Vec<String> = config
            .channels
            .iter()
            .map(|c| normalize_channel(c))
            .filter(|c| !c.is_empty())
            .collect();

        if channels.is_empty() {
            return Err(Error::Chat("no chat channels configured".to_string()));
        }

        let credentials = Credentials::from_config(config);
        let anonymous = credentials.is_anonymous();
        if anonymous {
            info!(
                nick = %credentials.nick(),
                "Connecting to chat anonymously (replies disabled)"
            );
        }

        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CAPACITY);
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);

        let connection = Connection {
            server: config.server.clone(),
            credentials,
            channels,
            inbound: inbound_tx,
            outbound: outbound_rx,
        };
        tokio::spawn(connection.run());

        Ok((
            Arc::new(TwitchChat {
                outbound: outbound_tx,
                anonymous,
            }),
            inbound_rx,
        ))
    }
}

#[async_trait]
impl ChatTransport for TwitchChat {
    async fn send(&self, text: &str, channel: &str) -> Result<()> {
        if self.anonymous {
            warn!("Dropping chat reply (anonymous connection): {}", text);
            return Ok(());
        }

        self.outbound
            .send(OutboundMessage {
                channel: normalize_channel(channel),
                text: strip_line_breaks(text),
            })
            .await
            .map_err(|_| Error::Chat("chat connection closed".to_string()))
    }
}

/// Why a session ended
enum SessionEnd {
    /// Connection lost; reconnect
    Disconnected,
    /// Nobody is listening anymore; stop
    Shutdown,
}

struct Connection {
    server: String,
    credentials: Credentials,
    channels: Vec<String>,
    inbound: mpsc::Sender<ChatMessage>,
    outbound: mpsc::Receiver<OutboundMessage>,
}

impl Connection {
    async fn run(mut self) {
        let mut backoff = INITIAL_BACKOFF;

        loop {
            match TcpStream::connect(&self.server).await {
                Ok(stream) => {
                    info!(server = %self.server, "Connected to chat server");
                    backoff = INITIAL_BACKOFF;

                    match self.session(stream).await {
                        Ok(SessionEnd::Shutdown) => {
                            info!("Chat consumer gone, closing chat connection");
                            return;
                        }
                        Ok(SessionEnd::Disconnected) => {
                            warn!("Chat connection closed by server");
                        }
                        Err(e) => {
                            warn!("Chat connection error: {}", e);
                        }
                    }
                }
                Err(e) => {
                    error!(server = %self.server, "Failed to connect to chat: {}", e);
                }
            }

            if self.inbound.is_closed() {
                return;
            }

            debug!("Reconnecting to chat in {:?}", backoff);
            tokio::time::sleep(backoff).await;
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }
    }

    async fn session(&mut self, stream: TcpStream) -> Result<SessionEnd> {
        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();

        for line in handshake(&self.credentials, &self.channels) {
            write_half.write_all(format!("{}\r\n", line).as_bytes()).await?;
        }
        info!(channels = ?self.channels, "Joined chat channels");

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        return Ok(SessionEnd::Disconnected);
                    };

                    if let Some(pong) = pong_for(&line) {
                        write_half.write_all(format!("{}\r\n", pong).as_bytes()).await?;
                        continue;
                    }

                    if is_reconnect(&line) {
                        info!("Chat server requested reconnect");
                        return Ok(SessionEnd::Disconnected);
                    }

                    if let Some(message) = parse_privmsg(&line) {
                        if self.inbound.send(message).await.is_err() {
                            return Ok(SessionEnd::Shutdown);
                        }
                    }
                }
                outbound = self.outbound.recv() => {
                    let Some(message) = outbound else {
                        return Ok(SessionEnd::Shutdown);
                    };
                    let line = format!("PRIVMSG #{} :{}\r\n", message.channel, message.text);
                    write_half.write_all(line.as_bytes()).await?;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_privmsg_with_tags() {
        let line = "@badge-info=;badges=broadcaster/1;color=#FF0000;display-name=TestUser;emotes=;id=abc123;mod=0;room-id=12345;subscriber=0;tmi-sent-ts=1234567890;turbo=0;user-id=67890;user-type= :testuser!testuser@testuser.tmi.twitch.tv PRIVMSG #Channel :!chaos 25f hard";

        let msg = parse_privmsg(line).unwrap();
        assert_eq!(msg.sender, "testuser");
        assert_eq!(msg.channel, "channel");
        assert_eq!(msg.text, "!chaos 25f hard");
    }

    #[test]
    fn test_parse_privmsg_without_tags() {
        let msg = parse_privmsg(":viewer!viewer@viewer.tmi.twitch.tv PRIVMSG #stream :hello there\r\n")
            .unwrap();
        assert_eq!(msg, ChatMessage::new("viewer", "hello there", "stream"));
    }

    #[test]
    fn test_non_privmsg_lines_ignored() {
        assert!(parse_privmsg("PING :tmi.twitch.tv").is_none());
        assert!(parse_privmsg(":tmi.twitch.tv 001 justinfan1 :Welcome, GLHF!").is_none());
        assert!(parse_privmsg(":viewer!viewer@viewer.tmi.twitch.tv JOIN #stream").is_none());
    }

    #[test]
    fn test_pong() {
        assert_eq!(pong_for("PING :tmi.twitch.tv").as_deref(), Some("PONG :tmi.twitch.tv"));
        assert_eq!(pong_for("PING").as_deref(), Some("PONG :tmi.twitch.tv"));
        assert!(pong_for(":tmi.twitch.tv PONG").is_none());
    }

    #[test]
    fn test_handshake_authenticated() {
        let config = ChatConfig {
            nick: Some("ChaosBot".to_string()),
            oauth_token: Some("abc".to_string()),
            channels: vec!["#Stream".to_string()],
            ..Default::default()
        };
        let credentials = Credentials::from_config(&config);
        assert!(!credentials.is_anonymous());

        let lines = handshake(&credentials, &["stream".to_string()]);
        assert_eq!(
            lines,
            vec![
                "CAP REQ :twitch.tv/tags twitch.tv/commands",
                "PASS oauth:abc",
                "NICK chaosbot",
                "JOIN #stream",
            ]
        );
    }

    #[test]
    fn test_anonymous_without_token() {
        let credentials = Credentials::from_config(&ChatConfig::default());
        assert!(credentials.is_anonymous());
        assert!(credentials.nick().starts_with("justinfan"));

        let lines = handshake(&credentials, &[]);
        assert!(!lines.iter().any(|l| l.starts_with("PASS")));
    }

    #[test]
    fn test_connect_requires_channels() {
        assert!(TwitchChat::connect(&ChatConfig::default()).is_err());
    }

    #[test]
    fn test_normalize_channel() {
        assert_eq!(normalize_channel(" #SomeChannel "), "somechannel");
        assert_eq!(normalize_channel("other"), "other");
    }

    #[test]
    fn test_reconnect_notice() {
        assert!(is_reconnect(":tmi.twitch.tv RECONNECT"));
        assert!(is_reconnect("RECONNECT"));
        assert!(!is_reconnect(
            ":viewer!viewer@viewer.tmi.twitch.tv PRIVMSG #stream : RECONNECT"
        ));
    }

    #[test]
    fn test_strip_line_breaks() {
        assert_eq!(strip_line_breaks("a\r\nJOIN #x"), "a  JOIN #x");
    }
}
