//! Startup, reconnect and shutdown sequencing.

use std::sync::Arc;
use std::time::Duration;

use ircord_channels::{ControlRequest, RetryDecision};
use ircord_core::{Network, Word};
use ircord_format::markdown_to_irc;
use tracing::{debug, error, info, warn};

use crate::context::BridgeContext;

pub(crate) const SHUTDOWN_TIMER: &str = "shutdown";
pub(crate) const STATUS_TIMER: &str = "discord-status";

/// Extra wait after the last queued post before the adapters quit.
const TEARDOWN_GRACE: Duration = Duration::from_secs(2);
/// Seconds between the joins issued after IRC registration.
const JOIN_STAGGER_SECS: f64 = 2.0;

fn reconnect_timer(network: Network) -> String {
    format!("{}-reconnect", network.to_string().to_lowercase())
}

/// Announce the shutdown on every linked channel, then quit both networks
/// once the announcement has been delivered. Only the first call has an effect.
pub(crate) fn begin_shutdown(ctx: &Arc<BridgeContext>, reason: &str) {
    if !ctx.stop_running() {
        debug!(%reason, "shutdown already in progress");
        return;
    }
    info!(%reason, "bridge shutting down");
    let notice = format!(
        "** !! {} {} [*({reason})*] !! **",
        ctx.word(Word::ShutdownMessage),
        ctx.uptime_text()
    );
    ctx.broadcast(Network::Irc, &markdown_to_irc(&notice));
    ctx.broadcast(Network::Discord, &notice);
    schedule_teardown(ctx, reason, ctx.delivery_backlog() + TEARDOWN_GRACE);
}

fn schedule_teardown(ctx: &Arc<BridgeContext>, reason: &str, delay: Duration) {
    let job = teardown(Arc::clone(ctx), reason.to_string());
    if let Err(e) = ctx.scheduler.schedule(SHUTDOWN_TIMER, delay.as_secs_f64(), job) {
        warn!(error = %e, "teardown already scheduled");
    }
}

async fn teardown(ctx: Arc<BridgeContext>, reason: String) {
    ctx.persist_runtime();
    let farewell = format!(
        "{} {} ({reason})",
        ctx.word(Word::QuitMessage),
        ctx.uptime_text()
    );
    ctx.peers.quit_all(&farewell).await;
    info!("adapters closed");
    ctx.signal_shutdown();
}

/// An adapter lost its connection.
pub(crate) fn on_disconnect(ctx: &Arc<BridgeContext>, network: Network, reason: &str, requested: bool) {
    if network == Network::Irc {
        for link in ctx.state.links() {
            ctx.state.forget_channel(&link.irc);
        }
    }
    if requested || !ctx.is_running() {
        info!(%network, %reason, "disconnected");
        return;
    }

    let (decision, max) = {
        let mut tracker = ctx.retries(network).lock().expect("reconnect tracker poisoned");
        (tracker.record_failure(), tracker.max_attempts())
    };
    match decision {
        RetryDecision::Retry { attempt, delay } => {
            warn!(%network, %reason, attempt, max, "connection lost, reconnecting");
            let notice = format!("{} {network} ({attempt}/{max})", ctx.word(Word::Reconnecting));
            ctx.broadcast(network.peer(), &notice);
            ctx.request_later(
                &reconnect_timer(network),
                delay.as_secs_f64(),
                network,
                ControlRequest::Reconnect,
            );
        }
        RetryDecision::GiveUp { attempts } => {
            error!(%network, %reason, attempts, "reconnect attempts exhausted");
            let notice = format!(
                "{} {network} {attempts} {}: {reason}",
                ctx.word(Word::Retried),
                ctx.word(Word::TimesNoSuccess)
            );
            ctx.broadcast(network.peer(), &notice);
            if ctx.stop_running() {
                schedule_teardown(ctx, reason, ctx.delivery_backlog() + TEARDOWN_GRACE);
            }
        }
    }
}

/// IRC registration finished: join every linked channel, a couple of
/// seconds apart, and start the Discord activity rotation.
pub(crate) fn on_irc_welcome(ctx: &Arc<BridgeContext>, nick: &str) {
    info!(%nick, "registered on IRC");
    ctx.set_irc_nick(nick);
    connection_restored(ctx, Network::Irc);
    for (i, link) in ctx.state.links().iter().enumerate() {
        ctx.request_later(
            &format!("join-{}", link.irc.to_lowercase()),
            1.0 + JOIN_STAGGER_SECS * (i + 1) as f64,
            Network::Irc,
            ControlRequest::Join(link.irc.clone()),
        );
    }
    if !ctx.scheduler.exists(STATUS_TIMER) {
        schedule_status_rotation(ctx, 1.0);
    }
}

pub(crate) fn on_discord_ready(ctx: &Arc<BridgeContext>, bot_name: &str) {
    info!(bot = %bot_name, "Discord gateway ready");
    connection_restored(ctx, Network::Discord);
}

fn connection_restored(ctx: &Arc<BridgeContext>, network: Network) {
    ctx.retries(network)
        .lock()
        .expect("reconnect tracker poisoned")
        .reset();
    let timer = reconnect_timer(network);
    if ctx.scheduler.exists(&timer) {
        let _ = ctx.scheduler.cancel(&timer);
    }
}

/// Set the next status message as the bot activity, then reschedule.
fn schedule_status_rotation(ctx: &Arc<BridgeContext>, delay_secs: f64) {
    if ctx.config.discord.status_messages.is_empty() {
        return;
    }
    let job_ctx = Arc::clone(ctx);
    let job = async move {
        if !job_ctx.is_running() {
            return;
        }
        if let Some(status) = job_ctx.next_status_message() {
            job_ctx
                .request(Network::Discord, ControlRequest::SetActivity(status))
                .await;
        }
        let interval = job_ctx.config.discord.status_interval_secs as f64;
        schedule_status_rotation(&job_ctx, interval);
    };
    if let Err(e) = ctx.scheduler.schedule(STATUS_TIMER, delay_secs, job) {
        warn!(error = %e, "could not schedule status rotation");
    }
}

/// The configured Discord guild or channels are missing.
pub(crate) fn on_config_invalid(ctx: &Arc<BridgeContext>, reason: &str) {
    error!(%reason, "Discord configuration does not match the server");
    begin_shutdown(ctx, reason);
}
