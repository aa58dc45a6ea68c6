use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use ircord_channels::{ControlRequest, OutboundMessage, Peers, ReconnectTracker};
use ircord_core::{
    ChannelRef, IrcordConfig, Localization, Network, RuntimeState, Word,
};
use ircord_format::{format_uptime, UptimeUnits};
use ircord_scheduler::Scheduler;
use ircord_state::{GuardCategory, StateCache};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::outbox::Outbox;

const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Everything the orchestrator, its scheduled jobs and its helper tasks share.
///
/// Built once at startup and handed around as `Arc<BridgeContext>`.
pub struct BridgeContext {
    pub config: IrcordConfig,
    pub state: StateCache,
    pub scheduler: Arc<Scheduler>,
    pub peers: Peers,
    pub locale: Localization,
    pub http: reqwest::Client,
    runtime: Mutex<RuntimeState>,
    started: Instant,
    running: AtomicBool,
    irc_nick: Mutex<String>,
    last_used: Mutex<Option<ChannelRef>>,
    pending_queries: Mutex<HashSet<(String, GuardCategory)>>,
    irc_outbox: Mutex<Outbox>,
    discord_outbox: Mutex<Outbox>,
    irc_retries: Mutex<ReconnectTracker>,
    discord_retries: Mutex<ReconnectTracker>,
    status_index: AtomicUsize,
    shutdown_tx: watch::Sender<bool>,
}

impl BridgeContext {
    pub fn new(
        config: IrcordConfig,
        locale: Localization,
        runtime: RuntimeState,
        peers: Peers,
        scheduler: Arc<Scheduler>,
        shutdown_tx: watch::Sender<bool>,
    ) -> Result<Arc<Self>> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.preview.timeout_secs))
            .build()?;
        let min_interval = Duration::from_secs_f64(config.bridge.min_post_interval_secs);
        let state = StateCache::new(
            config.channels.clone(),
            Duration::from_secs(config.bridge.spam_window_secs),
        );
        let irc_retries = ReconnectTracker::new(
            config.irc.max_reconnects,
            Duration::from_secs(config.irc.reconnect_delay_secs),
        );
        let discord_retries = ReconnectTracker::new(
            config.discord.max_reconnects,
            Duration::from_secs(config.discord.reconnect_delay_secs),
        );

        let irc_nick = Mutex::new(config.irc.nickname.clone());
        Ok(Arc::new(Self {
            config,
            state,
            scheduler,
            peers,
            locale,
            http,
            runtime: Mutex::new(runtime),
            started: Instant::now(),
            running: AtomicBool::new(true),
            irc_nick,
            last_used: Mutex::new(None),
            pending_queries: Mutex::new(HashSet::new()),
            irc_outbox: Mutex::new(Outbox::new(min_interval)),
            discord_outbox: Mutex::new(Outbox::new(min_interval)),
            irc_retries: Mutex::new(irc_retries),
            discord_retries: Mutex::new(discord_retries),
            status_index: AtomicUsize::new(0),
            shutdown_tx,
        }))
    }

    // ---------------------------------------------------------------------
    // Language and runtime settings
    // ---------------------------------------------------------------------

    pub fn language(&self) -> String {
        self.runtime.lock().expect("runtime state poisoned").language.clone()
    }

    pub fn set_language(&self, language: &str) {
        self.runtime.lock().expect("runtime state poisoned").language = language.to_string();
    }

    /// Follow the nick the bridge currently holds on IRC.
    pub fn set_irc_nick(&self, nick: &str) {
        *self.irc_nick.lock().expect("irc nick poisoned") = nick.to_string();
    }

    pub fn is_own_irc_nick(&self, nick: &str) -> bool {
        self.irc_nick
            .lock()
            .expect("irc nick poisoned")
            .eq_ignore_ascii_case(nick)
    }

    /// A word in the active language.
    pub fn word(&self, word: Word) -> String {
        self.locale.word(&self.language(), word).to_string()
    }

    /// Help text in the active language.
    pub fn help(&self, topic: &str) -> Option<String> {
        self.locale.help(&self.language(), topic).map(String::from)
    }

    pub fn is_ignored(&self, nick: &str) -> bool {
        self.runtime.lock().expect("runtime state poisoned").is_ignored(nick)
    }

    pub fn ignore(&self, nick: &str) -> bool {
        self.runtime.lock().expect("runtime state poisoned").ignore(nick)
    }

    pub fn runtime_snapshot(&self) -> RuntimeState {
        self.runtime.lock().expect("runtime state poisoned").clone()
    }

    /// Write language and ignore list to `bridge.state_path`.
    pub fn persist_runtime(&self) {
        let path = Path::new(&self.config.bridge.state_path);
        match self.runtime_snapshot().save(path) {
            Ok(()) => info!(path = %path.display(), "runtime state saved"),
            Err(e) => warn!(path = %path.display(), error = %e, "could not save runtime state"),
        }
    }

    // ---------------------------------------------------------------------
    // Lifecycle flags
    // ---------------------------------------------------------------------

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn uptime_text(&self) -> String {
        let lang = self.language();
        let units = UptimeUnits {
            day: self.locale.word(&lang, Word::DayShort),
            hour: self.locale.word(&lang, Word::HourShort),
            minute: self.locale.word(&lang, Word::MinuteShort),
            second: self.locale.word(&lang, Word::SecondShort),
        };
        format_uptime(self.uptime(), units)
    }

    /// Discord history replayed right after start is not relayed.
    pub fn in_startup_grace(&self) -> bool {
        self.uptime() < Duration::from_secs(self.config.bridge.startup_grace_secs)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Leave the running state. Returns `false` if it was already left.
    pub fn stop_running(&self) -> bool {
        self.running.swap(false, Ordering::SeqCst)
    }

    /// Tell every task holding a shutdown receiver to stop.
    pub fn signal_shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    pub fn retries(&self, network: Network) -> &Mutex<ReconnectTracker> {
        match network {
            Network::Irc => &self.irc_retries,
            Network::Discord => &self.discord_retries,
        }
    }

    /// Next entry of `discord.status_messages`, round robin.
    pub fn next_status_message(&self) -> Option<String> {
        let messages = &self.config.discord.status_messages;
        if messages.is_empty() {
            return None;
        }
        let i = self.status_index.fetch_add(1, Ordering::Relaxed) % messages.len();
        Some(messages[i].clone())
    }

    // ---------------------------------------------------------------------
    // Routing
    // ---------------------------------------------------------------------

    pub fn set_last_used(&self, channel: ChannelRef) {
        *self.last_used.lock().expect("last used poisoned") = Some(channel);
    }

    pub fn last_used(&self) -> Option<ChannelRef> {
        self.last_used.lock().expect("last used poisoned").clone()
    }

    /// IRC side of the last channel anything was said on.
    pub fn last_used_irc_channel(&self) -> Option<String> {
        match self.last_used()? {
            ChannelRef::Irc(name) => Some(name),
            discord @ ChannelRef::Discord(_) => self
                .state
                .resolve_peer_channel(&discord)
                .and_then(|c| c.as_irc().map(String::from)),
        }
    }

    /// Remember that a user explicitly asked for a topic or names listing.
    pub fn mark_query(&self, irc_channel: &str, kind: GuardCategory) {
        self.pending_queries
            .lock()
            .expect("pending queries poisoned")
            .insert((irc_channel.to_lowercase(), kind));
    }

    /// Consume an explicit query flag.
    pub fn take_query(&self, irc_channel: &str, kind: GuardCategory) -> bool {
        self.pending_queries
            .lock()
            .expect("pending queries poisoned")
            .remove(&(irc_channel.to_lowercase(), kind))
    }

    // ---------------------------------------------------------------------
    // Delivery
    // ---------------------------------------------------------------------

    fn outbox(&self, network: Network) -> &Mutex<Outbox> {
        match network {
            Network::Irc => &self.irc_outbox,
            Network::Discord => &self.discord_outbox,
        }
    }

    /// Queue a post, paced per target network.
    pub fn post(&self, msg: OutboundMessage) {
        self.post_with_fallback(msg, None);
    }

    /// Queue a post; if delivery fails and `fallback` is set, send that instead.
    pub fn post_with_fallback(&self, msg: OutboundMessage, fallback: Option<OutboundMessage>) {
        let network = msg.target.network();
        let delay = self
            .outbox(network)
            .lock()
            .expect("outbox poisoned")
            .plan(Instant::now());
        let peer = self.peers.get(network);
        let target = msg.target.clone();
        let job = async move {
            let Err(e) = peer.send(&msg).await else {
                return;
            };
            match fallback {
                Some(fb) => {
                    warn!(target = %msg.target, error = %e, "delivery failed, using fallback");
                    if let Err(e) = peer.send(&fb).await {
                        warn!(target = %fb.target, error = %e, "fallback delivery failed");
                    }
                }
                None => warn!(target = %msg.target, error = %e, "delivery failed"),
            }
        };
        match self.scheduler.schedule("", delay.as_secs_f64(), job) {
            Ok(name) => debug!(%target, timer = %name, delay_ms = delay.as_millis() as u64, "post queued"),
            Err(e) => warn!(%target, error = %e, "could not queue post"),
        }
    }

    /// Post the same text to every linked channel on `network`.
    pub fn broadcast(&self, network: Network, text: &str) {
        for link in self.state.links() {
            let target = match network {
                Network::Irc => ChannelRef::Irc(link.irc.clone()),
                Network::Discord => ChannelRef::Discord(link.discord),
            };
            self.post(OutboundMessage::text(target, text));
        }
    }

    /// Time until every queued post on both networks has gone out.
    pub fn delivery_backlog(&self) -> Duration {
        let now = Instant::now();
        let irc = self.irc_outbox.lock().expect("outbox poisoned").backlog(now);
        let discord = self.discord_outbox.lock().expect("outbox poisoned").backlog(now);
        irc.max(discord)
    }

    /// Send a control request right away; failures are logged.
    pub async fn request(&self, network: Network, req: ControlRequest) {
        let label = format!("{req:?}");
        if let Err(e) = self.peers.get(network).request(req).await {
            warn!(%network, request = %label, error = %e, "control request failed");
        }
    }

    /// Send a control request after `delay_secs` under the timer `name`,
    /// replacing a pending timer of the same name.
    pub fn request_later(&self, name: &str, delay_secs: f64, network: Network, req: ControlRequest) {
        if self.scheduler.exists(name) {
            let _ = self.scheduler.cancel(name);
        }
        let peer = self.peers.get(network);
        let label = format!("{req:?}");
        let job = async move {
            if let Err(e) = peer.request(req).await {
                warn!(%network, request = %label, error = %e, "scheduled control request failed");
            }
        };
        if let Err(e) = self.scheduler.schedule(name, delay_secs, job) {
            warn!(timer = %name, error = %e, "could not schedule control request");
        }
    }
}
