use ircord_core::ChannelRef;
use serde::{Deserialize, Serialize};

/// A message to be delivered to one channel on either network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub target: ChannelRef,
    pub content: String,
    #[serde(default)]
    pub kind: MessageKind,
    #[serde(default)]
    pub identity: PostIdentity,
}

impl OutboundMessage {
    pub fn text(target: ChannelRef, content: impl Into<String>) -> Self {
        Self {
            target,
            content: content.into(),
            kind: MessageKind::Text,
            identity: PostIdentity::Bot,
        }
    }

    /// Post through a Discord webhook under `username`.
    pub fn via_webhook(mut self, url: impl Into<String>, username: impl Into<String>) -> Self {
        self.identity = PostIdentity::Webhook {
            url: url.into(),
            username: username.into(),
        };
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    #[default]
    Text,
    /// IRC `/me` action.
    Action,
}

/// Who the message appears to come from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum PostIdentity {
    /// The bridge's own account.
    #[default]
    Bot,
    /// A Discord webhook posting under a custom name.
    Webhook { url: String, username: String },
}

/// Protocol actions the orchestrator can ask an adapter for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlRequest {
    Join(String),
    Part(String),
    /// Query the member list; answered with a `Names` event.
    Names(String),
    /// Query the topic; answered with a `TopicReply` event.
    Topic(String),
    /// Query hosts; answered with `Who` events.
    Who(String),
    Nick(String),
    /// Replace the bot's "Listening to" activity.
    SetActivity(String),
    /// Drop the current connection (if any) and connect again.
    Reconnect,
    /// Leave the network for good with a farewell message.
    Quit(String),
}

/// Runtime connection state of an adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    /// Fully connected and ready to send/receive.
    Connected,

    /// Attempting to establish or re-establish the connection.
    Connecting,

    /// Not connected (initial state, or after a drop or quit).
    Disconnected,

    /// The last attempt failed; a retry may follow.
    Error(String),
}
