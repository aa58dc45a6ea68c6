use std::sync::Arc;

use chrono::{DateTime, Utc};
use ircord_channels::{DiscordEvent, DiscordMessage};
use ircord_core::{ChannelLink, ChannelRef, Network, Word};
use ircord_format::{local_hhmm, markdown_to_irc, rewrite_custom_emoji, tidy_tags};
use tracing::{debug, info};

use crate::commands::{self, Invocation};
use crate::compose::{at_suffix, find_urls, normalize, reply_suffix};
use crate::context::BridgeContext;
use crate::lifecycle;
use crate::preview;

pub(crate) async fn handle(ctx: &Arc<BridgeContext>, event: DiscordEvent) {
    match event {
        DiscordEvent::Ready {
            bot_name,
            channels,
            members,
        } => {
            for channel in channels {
                ctx.state.set_discord_channel_name(channel.id, &channel.name);
                ctx.state.set_discord_topic(channel.id, channel.topic);
            }
            info!(members = members.len(), "Discord member cache loaded");
            ctx.state.replace_users(members);
            lifecycle::on_discord_ready(ctx, &bot_name);
        }
        DiscordEvent::Message(msg) => on_message(ctx, msg).await,
        DiscordEvent::Edit {
            channel_id,
            author,
            from_self,
            created_at,
            before,
            after,
        } => {
            if from_self {
                return;
            }
            on_edit(ctx, channel_id, &author, created_at, before.as_deref(), &after);
        }
        DiscordEvent::Reaction {
            channel_id,
            user,
            emoji,
            author,
            content,
            created_at,
        } => {
            let Some(link) = relayable(ctx, channel_id) else {
                return;
            };
            let suffix = at_suffix(
                &author,
                &content,
                created_at,
                ctx.config.bridge.local_time_shift_hours,
                ctx.config.bridge.excerpt_chars,
            );
            let line = format!("{} {} {suffix}", speaker(ctx, &user), rewrite_custom_emoji(&emoji));
            send_to_irc(ctx, &link, &line);
        }
        DiscordEvent::Presence { user_id, presence } => {
            if ctx.state.record_presence(&user_id, presence) {
                debug!(%user_id, ?presence, "presence changed");
            }
        }
        DiscordEvent::TopicChanged { channel_id, topic } => {
            ctx.state.set_discord_topic(channel_id, topic);
        }
        DiscordEvent::ConfigInvalid { reason } => lifecycle::on_config_invalid(ctx, &reason),
        DiscordEvent::Disconnected { reason, requested } => {
            lifecycle::on_disconnect(ctx, Network::Discord, &reason, requested)
        }
    }
}

/// The link for a Discord channel, if its traffic should be relayed now.
fn relayable(ctx: &BridgeContext, channel_id: u64) -> Option<ChannelLink> {
    if !ctx.is_running() || ctx.in_startup_grace() {
        return None;
    }
    ctx.state.link_for(&ChannelRef::Discord(channel_id))
}

/// `<relay_tag><prefix>name<postfix>`
fn speaker(ctx: &BridgeContext, name: &str) -> String {
    let discord = &ctx.config.discord;
    format!(
        "{}{}{name}{}",
        discord.relay_tag, discord.nick_prefix, discord.nick_postfix
    )
}

fn send_to_irc(ctx: &BridgeContext, link: &ChannelLink, line: &str) {
    ctx.say_on_irc(&link.irc, &markdown_to_irc(&tidy_tags(line)));
}

async fn on_message(ctx: &Arc<BridgeContext>, msg: DiscordMessage) {
    if msg.from_self {
        return;
    }
    let Some(link) = relayable(ctx, msg.channel_id) else {
        debug!(channel = msg.channel_id, "Discord message not relayed");
        return;
    };
    if msg.webhook_id.is_some() && msg.webhook_id == link.webhook_id() {
        return;
    }
    let origin = ChannelRef::Discord(link.discord);
    ctx.set_last_used(origin.clone());

    let shift = ctx.config.bridge.local_time_shift_hours;
    let max_chars = ctx.config.bridge.excerpt_chars;
    let mut content = rewrite_custom_emoji(&normalize(&msg.content));
    if let Some(pinned) = &msg.pinned {
        content = format!(
            "{}: {}",
            ctx.word(Word::PinnedMessage),
            at_suffix(&pinned.author, &pinned.content, pinned.created_at, shift, max_chars)
        );
    }
    for url in &msg.attachments {
        if !content.is_empty() {
            content.push(' ');
        }
        content.push_str(url);
    }
    if content.is_empty() {
        return;
    }
    let relayed = match &msg.reply_to {
        Some(quoted) => format!("{content} {}", reply_suffix(quoted, shift, max_chars)),
        None => content.clone(),
    };
    send_to_irc(ctx, &link, &format!("{} {relayed}", speaker(ctx, &msg.author_name)));

    preview::schedule_preview(ctx, find_urls(&content), &link.irc);
    let is_operator = ctx.config.is_discord_operator(&msg.author_id);
    if let Some(inv) = Invocation::parse(&msg.content, origin, &msg.author_name, is_operator) {
        commands::dispatch(ctx, inv).await;
    }
}

fn on_edit(
    ctx: &BridgeContext,
    channel_id: u64,
    author: &str,
    created_at: DateTime<Utc>,
    before: Option<&str>,
    after: &str,
) {
    let Some(link) = relayable(ctx, channel_id) else {
        return;
    };
    let after = rewrite_custom_emoji(&normalize(after));
    let before = before.map(|b| rewrite_custom_emoji(&normalize(b)));
    if after.is_empty() || before.as_deref() == Some(after.as_str()) {
        return;
    }
    let stamp = local_hhmm(created_at, ctx.config.bridge.local_time_shift_hours);
    let quoted = match before {
        Some(before) => format!("{stamp} {before}"),
        None => stamp,
    };
    let line = format!("{} [EDIT] @\"{quoted}\" -> \"{after}\"", speaker(ctx, author));
    send_to_irc(ctx, &link, &line);
}
