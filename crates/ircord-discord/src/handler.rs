use std::sync::{Arc, OnceLock};

use chrono::Utc;
use ircord_channels::{BridgeEvent, DiscordEvent, DiscordMessage, QuotedMessage};
use serenity::async_trait;
use serenity::model::channel::{GuildChannel, Message, MessageType, Reaction};
use serenity::model::event::MessageUpdateEvent;
use serenity::model::gateway::{Presence, Ready};
use serenity::model::id::{GuildId, UserId};
use serenity::prelude::{Context, EventHandler};
use tracing::{debug, error, info, warn};

use crate::adapter::Shared;
use crate::convert::{
    attachment_urls, member_name, presence_of, quote, snapshot_guild, timestamp_utc,
};

/// Serenity event handler that turns gateway traffic into bridge events.
pub struct BridgeHandler {
    pub(crate) guild_id: Option<GuildId>,
    pub(crate) linked: Vec<u64>,
    pub(crate) events: tokio::sync::mpsc::Sender<BridgeEvent>,
    pub(crate) shared: Arc<Shared>,
    pub(crate) bot_id: OnceLock<UserId>,
    pub(crate) bot_name: OnceLock<String>,
}

impl BridgeHandler {
    fn is_linked(&self, channel_id: u64) -> bool {
        self.linked.contains(&channel_id)
    }

    fn is_self(&self, user: UserId) -> bool {
        self.bot_id.get() == Some(&user)
    }

    fn in_guild(&self, guild: Option<GuildId>) -> bool {
        match (self.guild_id, guild) {
            (Some(want), Some(got)) => want == got,
            _ => true,
        }
    }

    async fn emit(&self, event: DiscordEvent) {
        if self.events.send(BridgeEvent::Discord(event)).await.is_err() {
            debug!("bridge event channel closed");
        }
    }

    /// The message a "pinned a message" notice refers to.
    async fn pinned(&self, ctx: &Context, msg: &Message) -> Option<QuotedMessage> {
        let id = msg.message_reference.as_ref()?.message_id?;
        match msg.channel_id.message(ctx, id).await {
            Ok(pinned) => Some(quote(&ctx.cache, msg.guild_id, &pinned)),
            Err(e) => {
                warn!(error = %e, "could not fetch pinned message");
                None
            }
        }
    }
}

#[async_trait]
impl EventHandler for BridgeHandler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        self.bot_id.set(ready.user.id).ok();
        self.bot_name.set(ready.user.name.clone()).ok();
        self.shared.gateway_ready(ctx.shard.clone());
        info!(name = %ready.user.name, guilds = ready.guilds.len(), "Discord bot connected");
    }

    async fn cache_ready(&self, ctx: Context, _guilds: Vec<GuildId>) {
        let snapshot = snapshot_guild(&ctx.cache, self.guild_id, &self.linked);
        match snapshot {
            Ok(snapshot) => {
                info!(
                    guild = %snapshot.guild_id,
                    channels = snapshot.channels.len(),
                    members = snapshot.members.len(),
                    "Discord guild cached"
                );
                let bot_name = self.bot_name.get().cloned().unwrap_or_default();
                self.emit(DiscordEvent::Ready {
                    bot_name,
                    channels: snapshot.channels,
                    members: snapshot.members,
                })
                .await;
            }
            Err(reason) => {
                error!(%reason, "Discord configuration does not match the guild");
                self.emit(DiscordEvent::ConfigInvalid { reason }).await;
            }
        }
    }

    async fn message(&self, ctx: Context, msg: Message) {
        let channel_id = msg.channel_id.get();
        if !self.is_linked(channel_id) || !self.in_guild(msg.guild_id) {
            return;
        }
        let pinned = match msg.kind {
            MessageType::Regular | MessageType::InlineReply => None,
            MessageType::PinsAdd => match self.pinned(&ctx, &msg).await {
                Some(pinned) => Some(pinned),
                None => return,
            },
            other => {
                debug!(kind = ?other, "ignoring system message");
                return;
            }
        };

        let author_name = member_name(&ctx.cache, msg.guild_id, &msg.author);
        let content = if pinned.is_some() {
            String::new()
        } else {
            msg.content_safe(&ctx.cache)
        };
        let reply_to = msg
            .referenced_message
            .as_deref()
            .map(|m| quote(&ctx.cache, msg.guild_id, m));

        self.emit(DiscordEvent::Message(DiscordMessage {
            channel_id,
            author_id: msg.author.id.to_string(),
            author_name,
            content,
            attachments: attachment_urls(&msg),
            reply_to,
            pinned,
            from_self: self.is_self(msg.author.id),
            webhook_id: msg.webhook_id.map(|id| id.get()),
            created_at: timestamp_utc(msg.timestamp),
        }))
        .await;
    }

    async fn message_update(
        &self,
        ctx: Context,
        old_if_available: Option<Message>,
        new: Option<Message>,
        event: MessageUpdateEvent,
    ) {
        let channel_id = event.channel_id.get();
        if !self.is_linked(channel_id) {
            return;
        }
        // Embed-only updates carry no content.
        let Some(raw_after) = event.content.clone() else {
            return;
        };
        let author = event
            .author
            .as_ref()
            .or(new.as_ref().map(|m| &m.author))
            .or(old_if_available.as_ref().map(|m| &m.author));
        let Some(author) = author else {
            return;
        };
        let created = old_if_available
            .as_ref()
            .map(|m| m.timestamp)
            .or(event.timestamp)
            .or(new.as_ref().map(|m| m.timestamp));

        let edit = DiscordEvent::Edit {
            channel_id,
            author: member_name(&ctx.cache, event.guild_id, author),
            from_self: self.is_self(author.id),
            created_at: created.map_or_else(Utc::now, timestamp_utc),
            before: old_if_available.as_ref().map(|m| m.content_safe(&ctx.cache)),
            after: new
                .as_ref()
                .map_or(raw_after, |m| m.content_safe(&ctx.cache)),
        };
        self.emit(edit).await;
    }

    async fn reaction_add(&self, ctx: Context, reaction: Reaction) {
        let channel_id = reaction.channel_id.get();
        if !self.is_linked(channel_id) {
            return;
        }
        let Some(user_id) = reaction.user_id else {
            return;
        };
        if self.is_self(user_id) {
            return;
        }
        let user = match user_id.to_user(&ctx).await {
            Ok(user) => member_name(&ctx.cache, reaction.guild_id, &user),
            Err(e) => {
                warn!(error = %e, "could not resolve reacting user");
                return;
            }
        };
        let message = match reaction.message(&ctx).await {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "could not fetch reacted message");
                return;
            }
        };
        let quoted = quote(&ctx.cache, reaction.guild_id, &message);
        self.emit(DiscordEvent::Reaction {
            channel_id,
            user,
            emoji: reaction.emoji.to_string(),
            author: quoted.author,
            content: quoted.content,
            created_at: quoted.created_at,
        })
        .await;
    }

    async fn presence_update(&self, _ctx: Context, new_data: Presence) {
        if !self.in_guild(new_data.guild_id) {
            return;
        }
        self.emit(DiscordEvent::Presence {
            user_id: new_data.user.id.to_string(),
            presence: presence_of(new_data.status),
        })
        .await;
    }

    async fn channel_update(&self, _ctx: Context, old: Option<GuildChannel>, new: GuildChannel) {
        let channel_id = new.id.get();
        if !self.is_linked(channel_id) {
            return;
        }
        let topic = new.topic.filter(|t| !t.is_empty());
        if old.is_some_and(|old| old.topic.filter(|t| !t.is_empty()) == topic) {
            return;
        }
        self.emit(DiscordEvent::TopicChanged { channel_id, topic }).await;
    }
}
