//! Serenity models to bridge types.
//!
//! Anything that touches the cache reads it synchronously and copies what
//! it needs out; cache guards must not be held across an `.await`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use ircord_channels::{DiscordChannelInfo, QuotedMessage};
use ircord_core::{Presence, UserRecord};
use serenity::cache::Cache;
use serenity::model::channel::Message;
use serenity::model::id::GuildId;
use serenity::model::user::{OnlineStatus, User};
use serenity::model::Timestamp;

/// Guild nick, then global display name, then account name.
pub fn display_name(nick: Option<&str>, global_name: Option<&str>, name: &str) -> String {
    [nick, global_name]
        .into_iter()
        .flatten()
        .find(|n| !n.trim().is_empty())
        .unwrap_or(name)
        .to_string()
}

/// Display name of `user`, using their guild nick when the cache knows it.
pub fn member_name(cache: &Arc<Cache>, guild: Option<GuildId>, user: &User) -> String {
    let nick = guild
        .and_then(|g| cache.guild(g))
        .and_then(|g| g.members.get(&user.id).and_then(|m| m.nick.clone()));
    display_name(nick.as_deref(), user.global_name.as_deref(), &user.name)
}

pub fn presence_of(status: OnlineStatus) -> Presence {
    Presence::from_discord(status.name())
}

pub fn timestamp_utc(ts: Timestamp) -> DateTime<Utc> {
    DateTime::from_timestamp(ts.unix_timestamp(), 0).unwrap_or_else(Utc::now)
}

pub fn attachment_urls(msg: &Message) -> Vec<String> {
    msg.attachments.iter().map(|a| a.url.clone()).collect()
}

/// A referenced message as quoted by replies and pin notices.
///
/// Referenced payloads usually lack a guild id, so the caller passes it.
pub fn quote(cache: &Arc<Cache>, guild: Option<GuildId>, msg: &Message) -> QuotedMessage {
    QuotedMessage {
        author: member_name(cache, guild.or(msg.guild_id), &msg.author),
        content: msg.content_safe(cache),
        attachments: attachment_urls(msg),
        created_at: timestamp_utc(msg.timestamp),
    }
}

/// Channel names, topics and members of the bridged guild.
#[derive(Debug)]
pub struct GuildSnapshot {
    pub guild_id: GuildId,
    pub channels: Vec<DiscordChannelInfo>,
    pub members: Vec<UserRecord>,
}

/// Read the bridged guild out of the cache.
///
/// Fails with a readable reason when no guild is configured, or the guild
/// or a linked channel does not exist.
pub fn snapshot_guild(
    cache: &Arc<Cache>,
    guild_id: Option<GuildId>,
    linked: &[u64],
) -> Result<GuildSnapshot, String> {
    let Some(guild_id) = guild_id else {
        return Err(format!(
            "discord.guild_id is not set; the bot is in: {}",
            known_guilds(cache)
        ));
    };
    let guild = cache
        .guild(guild_id)
        .ok_or_else(|| format!("the bot is not a member of guild {guild_id}"))?;

    let mut channels = Vec::with_capacity(linked.len());
    for id in linked {
        let channel = guild
            .channels
            .values()
            .find(|c| c.id.get() == *id)
            .ok_or_else(|| format!("channel {id} does not exist in guild {}", guild.name))?;
        channels.push(DiscordChannelInfo {
            id: *id,
            name: channel.name.clone(),
            topic: channel.topic.clone().filter(|t| !t.is_empty()),
        });
    }

    let members = guild
        .members
        .values()
        .map(|m| {
            let mut record = UserRecord::new(
                m.user.id.to_string(),
                m.user.name.clone(),
                display_name(m.nick.as_deref(), m.user.global_name.as_deref(), &m.user.name),
            );
            record.presence = guild
                .presences
                .get(&m.user.id)
                .map_or(Presence::Offline, |p| presence_of(p.status));
            record
        })
        .collect();

    Ok(GuildSnapshot {
        guild_id,
        channels,
        members,
    })
}

/// `name (id)` for every cached guild, for configuration errors.
fn known_guilds(cache: &Arc<Cache>) -> String {
    let guilds: Vec<String> = cache
        .guilds()
        .into_iter()
        .map(|id| match cache.guild(id) {
            Some(guild) => format!("{} ({id})", guild.name),
            None => id.to_string(),
        })
        .collect();
    if guilds.is_empty() {
        "no guilds".to_string()
    } else {
        guilds.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nick_wins_over_global_and_account_name() {
        assert_eq!(display_name(Some("Nick"), Some("Global"), "acct"), "Nick");
        assert_eq!(display_name(None, Some("Global"), "acct"), "Global");
        assert_eq!(display_name(None, None, "acct"), "acct");
    }

    #[test]
    fn blank_names_fall_through() {
        assert_eq!(display_name(Some(" "), Some("Global"), "acct"), "Global");
        assert_eq!(display_name(Some(""), Some(""), "acct"), "acct");
    }

    #[test]
    fn online_statuses_map_to_presence() {
        assert_eq!(presence_of(OnlineStatus::Online), Presence::Online);
        assert_eq!(presence_of(OnlineStatus::Idle), Presence::Away);
        assert_eq!(presence_of(OnlineStatus::DoNotDisturb), Presence::Away);
        assert_eq!(presence_of(OnlineStatus::Invisible), Presence::Offline);
        assert_eq!(presence_of(OnlineStatus::Offline), Presence::Offline);
    }

    #[test]
    fn timestamps_convert_to_utc() {
        let ts = Timestamp::from_unix_timestamp(1_700_000_000).unwrap();
        assert_eq!(timestamp_utc(ts).timestamp(), 1_700_000_000);
    }
}
