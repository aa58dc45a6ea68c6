use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the two chat networks joined by the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Network {
    Irc,
    Discord,
}

impl Network {
    /// The network on the other side of the bridge.
    pub fn peer(self) -> Network {
        match self {
            Network::Irc => Network::Discord,
            Network::Discord => Network::Irc,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Irc => write!(f, "IRC"),
            Network::Discord => write!(f, "Discord"),
        }
    }
}

/// A channel on either network.
///
/// IRC channels are addressed by name, Discord channels by snowflake id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "network", content = "id", rename_all = "snake_case")]
pub enum ChannelRef {
    Irc(String),
    Discord(u64),
}

impl ChannelRef {
    pub fn network(&self) -> Network {
        match self {
            ChannelRef::Irc(_) => Network::Irc,
            ChannelRef::Discord(_) => Network::Discord,
        }
    }

    pub fn as_irc(&self) -> Option<&str> {
        match self {
            ChannelRef::Irc(name) => Some(name),
            ChannelRef::Discord(_) => None,
        }
    }

    pub fn as_discord(&self) -> Option<u64> {
        match self {
            ChannelRef::Discord(id) => Some(*id),
            ChannelRef::Irc(_) => None,
        }
    }
}

impl fmt::Display for ChannelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelRef::Irc(name) => write!(f, "irc:{name}"),
            ChannelRef::Discord(id) => write!(f, "discord:{id}"),
        }
    }
}

/// A configured pairing of one IRC channel with one Discord channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelLink {
    /// IRC channel name including the leading `#`.
    pub irc: String,
    /// Discord channel id.
    pub discord: u64,
    /// Optional Discord webhook URL used to post IRC lines under the sender's nick.
    #[serde(default)]
    pub webhook: Option<String>,
    /// Discord channel name, resolved once the gateway is ready.
    #[serde(skip)]
    pub discord_name: Option<String>,
}

impl ChannelLink {
    pub fn new(irc: impl Into<String>, discord: u64) -> Self {
        Self {
            irc: irc.into(),
            discord,
            webhook: None,
            discord_name: None,
        }
    }

    pub fn with_webhook(mut self, url: impl Into<String>) -> Self {
        self.webhook = Some(url.into());
        self
    }

    /// Webhook id parsed from `https://discord.com/api/webhooks/<id>/<token>`.
    pub fn webhook_id(&self) -> Option<u64> {
        let url = self.webhook.as_deref()?;
        let mut parts = url.split("/webhooks/").nth(1)?.split('/');
        parts.next()?.parse().ok()
    }

    /// Display name of the Discord side, falling back to the numeric id.
    pub fn discord_label(&self) -> String {
        self.discord_name
            .clone()
            .unwrap_or_else(|| self.discord.to_string())
    }
}

/// Presence of a Discord user as seen by the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Presence {
    Online,
    Away,
    Offline,
    #[default]
    Unknown,
}

impl Presence {
    /// Map a Discord status string (`online`, `idle`, `dnd`, `invisible`, `offline`).
    pub fn from_discord(status: &str) -> Self {
        match status {
            "online" => Presence::Online,
            "idle" | "dnd" => Presence::Away,
            "offline" | "invisible" => Presence::Offline,
            _ => Presence::Unknown,
        }
    }
}

/// A Discord user known to the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: String,
    /// Account name (unique handle).
    pub name: String,
    /// Name shown in the guild; mention lookups match this first.
    pub display_name: String,
    pub presence: Presence,
    /// Linked Discord channels the user can see.
    #[serde(default)]
    pub channels: BTreeSet<u64>,
}

impl UserRecord {
    pub fn new(
        user_id: impl Into<String>,
        name: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            name: name.into(),
            display_name: display_name.into(),
            presence: Presence::Unknown,
            channels: BTreeSet::new(),
        }
    }

    /// Discord mention markup for this user.
    pub fn mention(&self) -> String {
        format!("<@{}>", self.user_id)
    }
}
