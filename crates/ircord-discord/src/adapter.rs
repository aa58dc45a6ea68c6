use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use async_trait::async_trait;
use ircord_channels::{
    BridgeEvent, Channel, ChannelError, ChannelStatus, ControlRequest, DiscordEvent,
    OutboundMessage, PostIdentity,
};
use ircord_core::config::DiscordConfig;
use ircord_core::{ChannelLink, ChannelRef, Network};
use serenity::all::ActivityData;
use serenity::cache::Settings as CacheSettings;
use serenity::gateway::{ShardManager, ShardMessenger};
use serenity::http::Http;
use serenity::model::gateway::GatewayIntents;
use serenity::model::id::{ChannelId, GuildId};
use serenity::model::webhook::Webhook;
use serenity::Client;
use tokio::sync::{mpsc, watch, Notify};
use tracing::{debug, info, warn};

use crate::error::DiscordError;
use crate::handler::BridgeHandler;
use crate::send::{execute_chunked, send_chunked};

/// Messages kept per channel so edits can show the text before the change.
const MESSAGE_CACHE: usize = 200;

fn intents() -> GatewayIntents {
    GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT
        | GatewayIntents::GUILD_MESSAGE_REACTIONS
        | GatewayIntents::GUILD_MEMBERS
        | GatewayIntents::GUILD_PRESENCES
}

/// State shared between the gateway task, its event handler and the
/// [`DiscordHandle`].
pub(crate) struct Shared {
    status: Mutex<ChannelStatus>,
    http: Mutex<Option<Arc<Http>>>,
    shard: Mutex<Option<ShardMessenger>>,
    manager: Mutex<Option<Arc<ShardManager>>>,
    webhooks: Mutex<HashMap<String, Webhook>>,
    quitting: AtomicBool,
    restarting: AtomicBool,
    reconnect: Notify,
    stop: Notify,
}

impl Shared {
    fn set_status(&self, status: ChannelStatus) {
        *self.status.lock().expect("discord status poisoned") = status;
    }

    /// Called from the handler once the gateway session is up.
    pub(crate) fn gateway_ready(&self, shard: ShardMessenger) {
        *self.shard.lock().expect("discord shard poisoned") = Some(shard);
        self.set_status(ChannelStatus::Connected);
    }

    fn http(&self) -> Result<Arc<Http>, ChannelError> {
        self.http
            .lock()
            .expect("discord http poisoned")
            .clone()
            .ok_or_else(|| ChannelError::NotConnected("Discord client is down".into()))
    }

    fn manager(&self) -> Option<Arc<ShardManager>> {
        self.manager.lock().expect("discord manager poisoned").clone()
    }

    fn attach(&self, http: Arc<Http>, manager: Arc<ShardManager>) {
        *self.http.lock().expect("discord http poisoned") = Some(http);
        *self.manager.lock().expect("discord manager poisoned") = Some(manager);
    }

    fn detach(&self) {
        self.http.lock().expect("discord http poisoned").take();
        self.manager.lock().expect("discord manager poisoned").take();
        self.shard.lock().expect("discord shard poisoned").take();
    }
}

enum SessionEnd {
    Lost(String),
    Reconnect,
    Quit,
    Shutdown,
}

/// The bridge's view of the Discord connection.
pub struct DiscordHandle {
    shared: Arc<Shared>,
}

impl DiscordHandle {
    async fn webhook(&self, http: &Http, url: &str) -> Result<Webhook, ChannelError> {
        if let Some(hook) = self
            .shared
            .webhooks
            .lock()
            .expect("discord webhooks poisoned")
            .get(url)
        {
            return Ok(hook.clone());
        }
        let hook = Webhook::from_url(http, url)
            .await
            .map_err(|e| ChannelError::SendFailed(format!("webhook lookup failed: {e}")))?;
        self.shared
            .webhooks
            .lock()
            .expect("discord webhooks poisoned")
            .insert(url.to_string(), hook.clone());
        Ok(hook)
    }

    fn forget_webhook(&self, url: &str) {
        self.shared
            .webhooks
            .lock()
            .expect("discord webhooks poisoned")
            .remove(url);
    }
}

#[async_trait]
impl Channel for DiscordHandle {
    fn network(&self) -> Network {
        Network::Discord
    }

    async fn send(&self, msg: &OutboundMessage) -> Result<(), ChannelError> {
        let target = match &msg.target {
            ChannelRef::Discord(id) if *id != 0 => ChannelId::new(*id),
            other => {
                return Err(ChannelError::Unsupported(format!(
                    "Discord cannot deliver to {other}"
                )))
            }
        };
        let http = self.shared.http()?;

        match &msg.identity {
            PostIdentity::Bot => send_chunked(&http, target, &msg.content)
                .await
                .map_err(|e| ChannelError::SendFailed(e.to_string())),
            PostIdentity::Webhook { url, username } => {
                let hook = self.webhook(&http, url).await?;
                execute_chunked(&http, &hook, username, &msg.content)
                    .await
                    .map_err(|e| {
                        self.forget_webhook(url);
                        ChannelError::SendFailed(format!("webhook post failed: {e}"))
                    })
            }
        }
    }

    async fn request(&self, req: ControlRequest) -> Result<(), ChannelError> {
        match req {
            ControlRequest::SetActivity(text) => {
                let shard = self.shared.shard.lock().expect("discord shard poisoned").clone();
                let shard = shard
                    .ok_or_else(|| ChannelError::NotConnected("Discord gateway is down".into()))?;
                debug!(%text, "setting Discord activity");
                shard.set_activity(Some(ActivityData::listening(text)));
                Ok(())
            }
            ControlRequest::Reconnect => {
                info!("Discord reconnect requested");
                match self.shared.manager() {
                    Some(manager) => {
                        self.shared.restarting.store(true, Ordering::SeqCst);
                        manager.shutdown_all().await;
                    }
                    None => self.shared.reconnect.notify_one(),
                }
                Ok(())
            }
            ControlRequest::Quit(_) => {
                self.shared.quitting.store(true, Ordering::SeqCst);
                match self.shared.manager() {
                    Some(manager) => manager.shutdown_all().await,
                    None => self.shared.stop.notify_one(),
                }
                Ok(())
            }
            other => Err(ChannelError::Unsupported(format!(
                "Discord does not handle {other:?}"
            ))),
        }
    }

    fn status(&self) -> ChannelStatus {
        self.shared.status.lock().expect("discord status poisoned").clone()
    }
}

/// Owns the serenity client for the bridged guild.
///
/// Serenity resumes dropped gateway sessions by itself. When the client
/// stops for good the adapter reports [`DiscordEvent::Disconnected`] and
/// waits for a [`ControlRequest::Reconnect`]; the retry policy belongs to
/// the bridge.
pub struct DiscordAdapter {
    config: DiscordConfig,
    linked: Vec<u64>,
    shared: Arc<Shared>,
    events: mpsc::Sender<BridgeEvent>,
}

impl DiscordAdapter {
    pub fn new(
        config: &DiscordConfig,
        links: &[ChannelLink],
        events: mpsc::Sender<BridgeEvent>,
    ) -> (Self, Arc<DiscordHandle>) {
        let shared = Arc::new(Shared {
            status: Mutex::new(ChannelStatus::Disconnected),
            http: Mutex::new(None),
            shard: Mutex::new(None),
            manager: Mutex::new(None),
            webhooks: Mutex::new(HashMap::new()),
            quitting: AtomicBool::new(false),
            restarting: AtomicBool::new(false),
            reconnect: Notify::new(),
            stop: Notify::new(),
        });
        let handle = Arc::new(DiscordHandle {
            shared: Arc::clone(&shared),
        });
        let adapter = Self {
            config: config.clone(),
            linked: links.iter().map(|l| l.discord).collect(),
            shared,
            events,
        };
        (adapter, handle)
    }

    /// Connect, serve, and wait for reconnect requests until quit or shutdown.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut connect_now = true;
        loop {
            if !connect_now {
                tokio::select! {
                    _ = self.shared.reconnect.notified() => {}
                    _ = self.shared.stop.notified() => break,
                    _ = shutdown.changed() => break,
                }
            }
            if *shutdown.borrow() || self.shared.quitting.load(Ordering::SeqCst) {
                break;
            }
            connect_now = false;

            self.shared.set_status(ChannelStatus::Connecting);
            info!("Discord gateway connecting");
            let end = self.serve(&mut shutdown).await;
            self.shared.detach();
            self.shared.set_status(ChannelStatus::Disconnected);

            match end {
                SessionEnd::Reconnect => {
                    info!("Discord reconnecting on request");
                    connect_now = true;
                }
                SessionEnd::Quit => {
                    info!("Discord gateway closed after quit");
                    self.emit(DiscordEvent::Disconnected {
                        reason: "quit".into(),
                        requested: true,
                    })
                    .await;
                    break;
                }
                SessionEnd::Shutdown => break,
                SessionEnd::Lost(reason) => {
                    warn!(%reason, "Discord connection lost");
                    self.shared.set_status(ChannelStatus::Error(reason.clone()));
                    self.emit(DiscordEvent::Disconnected {
                        reason,
                        requested: false,
                    })
                    .await;
                }
            }
        }
        info!("Discord adapter stopped");
    }

    async fn emit(&self, event: DiscordEvent) {
        if self.events.send(BridgeEvent::Discord(event)).await.is_err() {
            debug!("bridge event channel closed");
        }
    }

    async fn serve(&self, shutdown: &mut watch::Receiver<bool>) -> SessionEnd {
        let mut client = match self.build_client().await {
            Ok(client) => client,
            Err(e) => return SessionEnd::Lost(format!("client setup failed: {e}")),
        };
        let manager = Arc::clone(&client.shard_manager);
        self.shared.attach(Arc::clone(&client.http), Arc::clone(&manager));

        let result = tokio::select! {
            result = client.start() => Some(result),
            _ = shutdown.changed() => None,
        };
        let Some(result) = result else {
            manager.shutdown_all().await;
            return SessionEnd::Shutdown;
        };

        if self.shared.quitting.load(Ordering::SeqCst) {
            SessionEnd::Quit
        } else if self.shared.restarting.swap(false, Ordering::SeqCst) {
            SessionEnd::Reconnect
        } else {
            match result {
                Ok(()) => SessionEnd::Lost("gateway closed".into()),
                Err(e) => SessionEnd::Lost(e.to_string()),
            }
        }
    }

    /// Build a fresh serenity `Client` with our event handler.
    async fn build_client(&self) -> Result<Client, DiscordError> {
        if self.config.token.trim().is_empty() {
            return Err(DiscordError::NoToken);
        }
        let handler = BridgeHandler {
            guild_id: (self.config.guild_id != 0).then(|| GuildId::new(self.config.guild_id)),
            linked: self.linked.clone(),
            events: self.events.clone(),
            shared: Arc::clone(&self.shared),
            bot_id: OnceLock::new(),
            bot_name: OnceLock::new(),
        };
        let mut cache = CacheSettings::default();
        cache.max_messages = MESSAGE_CACHE;

        let client = Client::builder(&self.config.token, intents())
            .event_handler(handler)
            .cache_settings(cache)
            .await?;
        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use ircord_core::IrcordConfig;

    use super::*;

    fn adapter() -> (DiscordAdapter, Arc<DiscordHandle>, mpsc::Receiver<BridgeEvent>) {
        let config = IrcordConfig::from_toml(
            r##"
            [irc]
            server = "irc.example"

            [discord]
            token = "token"
            guild_id = 5

            [[channels]]
            irc = "#c"
            discord = 7
            "##,
        )
        .unwrap();
        let (tx, rx) = mpsc::channel(8);
        let (adapter, handle) = DiscordAdapter::new(&config.discord, &config.channels, tx);
        (adapter, handle, rx)
    }

    #[tokio::test]
    async fn offline_handle_reports_not_connected() {
        let (adapter, handle, _rx) = adapter();
        assert_eq!(adapter.linked, vec![7]);
        assert_eq!(handle.status(), ChannelStatus::Disconnected);
        let err = handle
            .send(&OutboundMessage::text(ChannelRef::Discord(7), "hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::NotConnected(_)));
        let err = handle
            .request(ControlRequest::SetActivity("music".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::NotConnected(_)));
    }

    #[tokio::test]
    async fn irc_only_requests_are_unsupported() {
        let (_adapter, handle, _rx) = adapter();
        for req in [
            ControlRequest::Join("#c".into()),
            ControlRequest::Names("#c".into()),
            ControlRequest::Who("#c".into()),
        ] {
            assert!(matches!(
                handle.request(req).await,
                Err(ChannelError::Unsupported(_))
            ));
        }
        let err = handle
            .send(&OutboundMessage::text(ChannelRef::Irc("#c".into()), "hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::Unsupported(_)));
    }

    #[tokio::test]
    async fn quit_before_connecting_stops_the_adapter() {
        let (adapter, handle, mut rx) = adapter();
        handle
            .request(ControlRequest::Quit("bye".into()))
            .await
            .unwrap();
        let (_tx, shutdown) = watch::channel(false);
        tokio::time::timeout(Duration::from_secs(5), adapter.run(shutdown))
            .await
            .unwrap();
        assert!(rx.try_recv().is_err());
    }
}
