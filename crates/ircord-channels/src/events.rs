//! Inbound traffic reported by the adapters.
//!
//! Adapters translate protocol traffic into these events and push them onto
//! the single channel the orchestrator drains.

use chrono::{DateTime, Utc};
use ircord_core::{Presence, UserRecord};

#[derive(Debug, Clone)]
pub enum BridgeEvent {
    Irc(IrcEvent),
    Discord(DiscordEvent),
    /// Begin a graceful shutdown (operator command, signal).
    Shutdown { reason: String },
}

/// IRC traffic. `own` marks events about the bridge's own nick.
#[derive(Debug, Clone, PartialEq)]
pub enum IrcEvent {
    /// Registration finished (001).
    Welcome { nick: String },
    /// ISUPPORT `NETWORK=` value (005).
    Network { name: String },
    /// PRIVMSG to a channel; `action` for CTCP ACTION.
    Message {
        channel: String,
        nick: String,
        text: String,
        action: bool,
    },
    Join {
        channel: String,
        nick: String,
        host: String,
        own: bool,
    },
    Part {
        channel: String,
        nick: String,
        reason: Option<String>,
        own: bool,
    },
    Quit {
        nick: String,
        reason: Option<String>,
    },
    Kick {
        channel: String,
        by: String,
        nick: String,
        reason: Option<String>,
        own: bool,
    },
    NickChange {
        old: String,
        new: String,
        own: bool,
    },
    /// Someone changed the topic.
    Topic {
        channel: String,
        nick: String,
        topic: String,
    },
    /// Topic query reply (331/332). `channel` is `None` when the reply did
    /// not carry a usable channel parameter; `raw` is the full line.
    TopicReply {
        channel: Option<String>,
        topic: Option<String>,
        raw: String,
    },
    /// NAMES reply (353).
    Names { channel: String, names: String },
    /// WHO reply (352).
    Who {
        channel: String,
        nick: String,
        host: String,
    },
    Disconnected { reason: String, requested: bool },
}

/// A Discord channel as seen at gateway ready.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscordChannelInfo {
    pub id: u64,
    pub name: String,
    pub topic: Option<String>,
}

/// A message quoted by a reply or a pin notice.
#[derive(Debug, Clone, PartialEq)]
pub struct QuotedMessage {
    pub author: String,
    pub content: String,
    pub attachments: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiscordMessage {
    pub channel_id: u64,
    pub author_id: String,
    /// Guild nick if set, else the account's display name.
    pub author_name: String,
    /// Content with mentions already rendered as `@name`.
    pub content: String,
    pub attachments: Vec<String>,
    pub reply_to: Option<QuotedMessage>,
    /// Set for "pinned a message" system messages.
    pub pinned: Option<QuotedMessage>,
    /// Posted by the bridge's own account.
    pub from_self: bool,
    pub webhook_id: Option<u64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DiscordEvent {
    /// Gateway ready and guild cached.
    Ready {
        bot_name: String,
        channels: Vec<DiscordChannelInfo>,
        members: Vec<UserRecord>,
    },
    Message(DiscordMessage),
    Edit {
        channel_id: u64,
        author: String,
        from_self: bool,
        created_at: DateTime<Utc>,
        before: Option<String>,
        after: String,
    },
    Reaction {
        channel_id: u64,
        user: String,
        emoji: String,
        author: String,
        content: String,
        created_at: DateTime<Utc>,
    },
    Presence { user_id: String, presence: Presence },
    TopicChanged { channel_id: u64, topic: Option<String> },
    /// The configured guild or channels do not exist; the bridge cannot run.
    ConfigInvalid { reason: String },
    Disconnected { reason: String, requested: bool },
}
