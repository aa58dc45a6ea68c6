use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use ircord_channels::{BridgeEvent, Peers};
use ircord_core::{IrcordConfig, Localization, RuntimeState};
use ircord_discord::DiscordAdapter;
use ircord_irc::IrcAdapter;
use ircord_relay::{Bridge, BridgeContext};
use ircord_scheduler::Scheduler;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

/// Room for bursts of gateway traffic before adapters wait on the bridge.
const EVENT_QUEUE: usize = 1024;
/// How long adapters get to say goodbye once shutdown is signalled.
const ADAPTER_GRACE: Duration = Duration::from_secs(10);

/// Built-in tables plus the optional `bridge.locale_path` overlay.
pub fn load_locale(config: &IrcordConfig) -> anyhow::Result<Localization> {
    let extra = config.bridge.locale_path.as_deref().map(Path::new);
    Localization::load(&config.bridge.default_language, extra)
        .context("failed to load localization tables")
}

/// Persisted language and ignore list, or fresh defaults from the config.
///
/// A stored language the tables no longer know falls back to the default.
pub fn load_runtime(config: &IrcordConfig, locale: &Localization) -> RuntimeState {
    let path = Path::new(&config.bridge.state_path);
    match RuntimeState::load(path) {
        Some(mut state) => {
            if !locale.has_language(&state.language) {
                warn!(language = %state.language, "stored language unknown, using default");
                state.language = locale.default_language().to_string();
            }
            info!(path = %path.display(), "runtime state restored");
            state
        }
        None => RuntimeState::new(
            locale.default_language(),
            config.bridge.ignore_quits.clone(),
        ),
    }
}

/// Wire adapters, scheduler and bridge together and run until shutdown.
pub async fn run(config: IrcordConfig) -> anyhow::Result<()> {
    let locale = load_locale(&config)?;
    let runtime = load_runtime(&config, &locale);

    let (events_tx, events_rx) = mpsc::channel::<BridgeEvent>(EVENT_QUEUE);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let (irc, irc_handle) = IrcAdapter::new(&config.irc, events_tx.clone());
    let (discord, discord_handle) =
        DiscordAdapter::new(&config.discord, &config.channels, events_tx.clone());
    let peers = Peers::new(irc_handle, discord_handle);

    let scheduler = Arc::new(Scheduler::new());
    let ctx = BridgeContext::new(
        config,
        locale,
        runtime,
        peers,
        Arc::clone(&scheduler),
        shutdown_tx,
    )?;
    let bridge = Bridge::new(ctx);

    tokio::spawn(scheduler.run(shutdown_rx.clone()));
    let irc_task = tokio::spawn(irc.run(shutdown_rx.clone()));
    let discord_task = tokio::spawn(discord.run(shutdown_rx.clone()));
    let bridge_task = tokio::spawn(bridge.run(events_rx, shutdown_rx.clone()));
    info!("ircord started");

    tokio::spawn(forward_signals(events_tx, shutdown_rx.clone()));

    let mut shutdown = shutdown_rx;
    while !*shutdown.borrow() {
        if shutdown.changed().await.is_err() {
            break;
        }
    }
    info!("shutdown signalled, waiting for adapters");

    let adapters = async {
        let _ = irc_task.await;
        let _ = discord_task.await;
        let _ = bridge_task.await;
    };
    if tokio::time::timeout(ADAPTER_GRACE, adapters).await.is_err() {
        warn!("adapters did not stop in time");
    }
    info!("ircord stopped");
    Ok(())
}

/// Turn Ctrl-C (and SIGTERM on unix) into a graceful bridge shutdown.
async fn forward_signals(events: mpsc::Sender<BridgeEvent>, mut shutdown: watch::Receiver<bool>) {
    let reason = tokio::select! {
        _ = interrupted() => "Killed from terminal",
        _ = terminated() => "Terminated",
        _ = shutdown.changed() => return,
    };
    info!(%reason, "signal received");
    let _ = events
        .send(BridgeEvent::Shutdown {
            reason: reason.to_string(),
        })
        .await;
}

async fn interrupted() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn terminated() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            term.recv().await;
        }
        Err(_) => std::future::pending::<()>().await,
    }
}

#[cfg(not(unix))]
async fn terminated() {
    std::future::pending::<()>().await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(state_path: &Path) -> IrcordConfig {
        IrcordConfig::from_toml(&format!(
            r##"
            [irc]
            server = "irc.example"

            [discord]
            token = "token"

            [bridge]
            state_path = "{}"
            ignore_quits = ["ChanServ"]

            [[channels]]
            irc = "#c"
            discord = 1
            "##,
            state_path.display()
        ))
        .unwrap()
    }

    #[test]
    fn fresh_runtime_comes_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir.path().join("state.json"));
        let locale = load_locale(&config).unwrap();
        let runtime = load_runtime(&config, &locale);
        assert_eq!(runtime.language, locale.default_language());
        assert_eq!(runtime.ignore_quits, vec!["ChanServ".to_string()]);
    }

    #[test]
    fn stored_runtime_wins_but_unknown_language_resets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        RuntimeState::new("klingon", vec!["bot".into()])
            .save(&path)
            .unwrap();
        let config = config(&path);
        let locale = load_locale(&config).unwrap();
        let runtime = load_runtime(&config, &locale);
        assert_eq!(runtime.language, locale.default_language());
        assert_eq!(runtime.ignore_quits, vec!["bot".to_string()]);
    }
}
