use std::sync::Arc;

use ircord_channels::{ControlRequest, IrcEvent};
use ircord_core::{ChannelLink, ChannelRef, Network, Word};
use ircord_format::{irc_to_markdown, markdown_to_irc, strip_irc_formatting};
use ircord_state::GuardCategory;
use tracing::{debug, info, warn};

use crate::commands::{self, Invocation};
use crate::compose::{extract_first_channel, find_urls, neutralize_broadcasts, normalize, rewrite_mentions};
use crate::context::BridgeContext;
use crate::lifecycle;
use crate::preview;

/// Delay before rejoining a channel the bridge was removed from.
const REJOIN_DELAY_SECS: f64 = 3.0;
/// Delay between the bridge's own join and the banner.
const BANNER_DELAY_SECS: f64 = 2.0;

pub(crate) async fn handle(ctx: &Arc<BridgeContext>, event: IrcEvent) {
    match event {
        IrcEvent::Welcome { nick } => lifecycle::on_irc_welcome(ctx, &nick),
        IrcEvent::Network { name } => {
            debug!(network = %name, "IRC network name");
            ctx.state.set_network_name(&name);
        }
        IrcEvent::Message {
            channel,
            nick,
            text,
            action,
        } => on_message(ctx, &channel, &nick, &text, action).await,
        IrcEvent::Join {
            channel,
            nick,
            host,
            own,
        } => {
            if own {
                on_own_join(ctx, &channel).await;
            } else {
                on_join(ctx, &channel, &nick, &host);
            }
        }
        IrcEvent::Part {
            channel,
            nick,
            reason,
            own,
        } => on_part(ctx, &channel, &nick, reason.as_deref(), own),
        IrcEvent::Quit { nick, reason } => on_quit(ctx, &nick, reason.as_deref()),
        IrcEvent::Kick {
            channel,
            by,
            nick,
            reason,
            own,
        } => on_kick(ctx, &channel, &by, &nick, reason.as_deref(), own),
        IrcEvent::NickChange { old, new, own } => {
            if own {
                info!(%old, %new, "own IRC nick changed");
                ctx.set_irc_nick(&new);
            }
            for channel in ctx.state.record_rename(&old, &new) {
                if let Some(link) = irc_link(ctx, &channel) {
                    let text = format!("**{old}** *{}* **{new}**", ctx.word(Word::NewNickIs));
                    notice(ctx, &link, &text);
                }
            }
        }
        IrcEvent::Topic {
            channel,
            nick,
            topic,
        } => {
            let Some(link) = irc_link(ctx, &channel) else {
                return;
            };
            debug!(%channel, %nick, "topic changed");
            if ctx.state.guard_allows(&link.irc, GuardCategory::Topic, &topic) {
                let text = format!(
                    "{} - {}: **{}**",
                    link.irc,
                    ctx.word(Word::TopicChanged),
                    irc_to_markdown(&topic)
                );
                notice(ctx, &link, &text);
            }
        }
        IrcEvent::TopicReply {
            channel,
            topic,
            raw,
        } => on_topic_reply(ctx, channel, topic, &raw),
        IrcEvent::Names { channel, names } => on_names(ctx, &channel, &names),
        IrcEvent::Who {
            channel,
            nick,
            host,
        } => ctx.state.record_join(&channel, &nick, &host),
        IrcEvent::Disconnected { reason, requested } => {
            lifecycle::on_disconnect(ctx, Network::Irc, &reason, requested)
        }
    }
}

fn irc_link(ctx: &BridgeContext, channel: &str) -> Option<ChannelLink> {
    ctx.state.link_for(&ChannelRef::Irc(channel.to_string()))
}

/// Bridge-identity notice to Discord, suppressed once shutdown has begun.
fn notice(ctx: &BridgeContext, link: &ChannelLink, text: &str) {
    if ctx.is_running() {
        ctx.notice_to_discord(link, text);
    }
}

async fn on_message(ctx: &Arc<BridgeContext>, channel: &str, nick: &str, raw: &str, action: bool) {
    let Some(link) = irc_link(ctx, channel) else {
        debug!(%channel, "message on an unlinked IRC channel");
        return;
    };
    if !ctx.is_running() {
        return;
    }
    if ctx.is_own_irc_nick(nick) {
        debug!(%channel, %nick, "ignoring own IRC message");
        return;
    }
    let origin = ChannelRef::Irc(link.irc.clone());
    ctx.set_last_used(origin.clone());

    let text = normalize(&irc_to_markdown(raw));
    if text.is_empty() {
        return;
    }
    let text = neutralize_broadcasts(
        &text,
        &ctx.word(Word::FixEveryone),
        &ctx.word(Word::FixHere),
    );
    let text = rewrite_mentions(&text, |token| ctx.state.resolve_user_by_token(token));
    let text = if action { format!("*{text}*") } else { text };
    ctx.relay_to_discord(&link, nick, &text);

    let plain = strip_irc_formatting(raw);
    preview::schedule_preview(ctx, find_urls(&plain), &link.irc);
    if action {
        return;
    }
    let is_operator = ctx.config.is_irc_operator(nick);
    if let Some(inv) = Invocation::parse(&plain, origin, nick, is_operator) {
        commands::dispatch(ctx, inv).await;
    }
}

async fn on_own_join(ctx: &Arc<BridgeContext>, channel: &str) {
    let Some(link) = irc_link(ctx, channel) else {
        warn!(%channel, "joined an unlinked IRC channel, leaving");
        ctx.request(Network::Irc, ControlRequest::Part(channel.to_string()))
            .await;
        return;
    };
    info!(channel = %link.irc, discord = link.discord, "joined linked IRC channel");
    ctx.request(Network::Irc, ControlRequest::Who(link.irc.clone()))
        .await;
    ctx.request(Network::Irc, ControlRequest::Topic(link.irc.clone()))
        .await;
    ctx.request(Network::Irc, ControlRequest::Names(link.irc.clone()))
        .await;

    let job_ctx = Arc::clone(ctx);
    let job = async move {
        let banner = format!(
            "** !! {} 'IRC {}' - 'Discord #{}' -{} == {} !! **",
            job_ctx.word(Word::Connected),
            link.irc,
            link.discord_label(),
            job_ctx.word(Word::Bridge),
            job_ctx.word(Word::RelayingNotice)
        );
        job_ctx.say_on_discord(link.discord, &banner);
        job_ctx.say_on_irc(&link.irc, &markdown_to_irc(&banner));
        job_ctx.say_on_irc(&link.irc, &job_ctx.discord_topic_line(&link));
        job_ctx.say_on_irc(&link.irc, &job_ctx.discord_presence_line(&link));
    };
    let name = format!("banner-{}", channel.to_lowercase());
    if ctx.scheduler.exists(&name) {
        let _ = ctx.scheduler.cancel(&name);
    }
    if let Err(e) = ctx.scheduler.schedule(&name, BANNER_DELAY_SECS, job) {
        warn!(%channel, error = %e, "could not schedule join banner");
    }
}

fn on_join(ctx: &BridgeContext, channel: &str, nick: &str, host: &str) {
    let Some(link) = irc_link(ctx, channel) else {
        return;
    };
    ctx.state.record_join(&link.irc, nick, host);
    if !ctx.is_ignored(nick) {
        notice(ctx, &link, &format!("**{nick} {} {}**", ctx.word(Word::Joined), link.irc));
    }
}

fn rejoin(ctx: &BridgeContext, channel: &str) {
    ctx.state.forget_channel(channel);
    if ctx.is_running() {
        ctx.request_later(
            &format!("join-{}", channel.to_lowercase()),
            REJOIN_DELAY_SECS,
            Network::Irc,
            ControlRequest::Join(channel.to_string()),
        );
    }
}

fn on_part(ctx: &BridgeContext, channel: &str, nick: &str, reason: Option<&str>, own: bool) {
    let Some(link) = irc_link(ctx, channel) else {
        return;
    };
    if own {
        warn!(channel = %link.irc, "left a linked IRC channel, rejoining");
        rejoin(ctx, &link.irc);
        return;
    }
    ctx.state.record_part(&link.irc, nick);
    if !ctx.is_ignored(nick) {
        let text = format!(
            "**{nick} {} {} ({}: ({}))**",
            ctx.word(Word::LeftChannel),
            link.irc,
            ctx.word(Word::Reason),
            reason.unwrap_or_default()
        );
        notice(ctx, &link, &text);
    }
}

fn on_quit(ctx: &BridgeContext, nick: &str, reason: Option<&str>) {
    let channels = ctx.state.record_quit(nick);
    if ctx.is_ignored(nick) {
        return;
    }
    let network = ctx
        .state
        .network_name()
        .unwrap_or_else(|| ctx.config.irc.server.clone());
    let text = format!(
        "**{nick} {} / {network} ({}: {})**",
        ctx.word(Word::QuitIrc),
        ctx.word(Word::Reason),
        reason.unwrap_or_default()
    );
    for channel in channels {
        if let Some(link) = irc_link(ctx, &channel) {
            notice(ctx, &link, &text);
        }
    }
}

fn on_kick(
    ctx: &BridgeContext,
    channel: &str,
    by: &str,
    nick: &str,
    reason: Option<&str>,
    own: bool,
) {
    let Some(link) = irc_link(ctx, channel) else {
        return;
    };
    let text = format!(
        "**{by} {} {nick} ({})**",
        ctx.word(Word::KickedUser),
        reason.unwrap_or_default()
    );
    notice(ctx, &link, &text);
    if own {
        warn!(channel = %link.irc, %by, "kicked from a linked IRC channel, rejoining");
        rejoin(ctx, &link.irc);
    } else {
        ctx.state.record_part(&link.irc, nick);
    }
}

fn on_topic_reply(ctx: &BridgeContext, channel: Option<String>, topic: Option<String>, raw: &str) {
    let channel = channel
        .or_else(|| extract_first_channel(raw))
        .or_else(|| ctx.last_used_irc_channel());
    let Some(link) = channel.as_deref().and_then(|c| irc_link(ctx, c)) else {
        debug!(%raw, "topic reply for no linked channel");
        return;
    };
    let topic = topic
        .filter(|t| !t.trim().is_empty())
        .map(|t| irc_to_markdown(&t))
        .unwrap_or_else(|| ctx.word(Word::NoTopic));
    if ctx.take_query(&link.irc, GuardCategory::Topic) {
        ctx.state.guard_record(&link.irc, GuardCategory::Topic, &topic);
    } else if !ctx.state.guard_allows(&link.irc, GuardCategory::Topic, &topic) {
        return;
    }
    let text = format!("{} @ {} : **{topic}**", ctx.word(Word::TopicWord), link.irc);
    notice(ctx, &link, &text);
}

fn on_names(ctx: &BridgeContext, channel: &str, names: &str) {
    let Some(link) = irc_link(ctx, channel) else {
        return;
    };
    ctx.state.update_membership(&link.irc, names);
    let names = names.trim();
    if ctx.take_query(&link.irc, GuardCategory::Names) {
        ctx.state.guard_record(&link.irc, GuardCategory::Names, names);
    } else if !ctx.state.guard_allows(&link.irc, GuardCategory::Names, names) {
        return;
    }
    let text = format!("{} @ {} : **{names}**", ctx.word(Word::OnTheChannel), link.irc);
    notice(ctx, &link, &text);
}
