use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{Sink, SinkExt, StreamExt};
use ircord_channels::{
    BridgeEvent, Channel, ChannelError, ChannelStatus, ControlRequest, IrcEvent, MessageKind,
    OutboundMessage,
};
use ircord_core::config::IrcConfig;
use ircord_core::{ChannelRef, Network};
use ircord_format::{split_irc_line, IRC_LINE_MAX};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, Notify};
use tokio::time::timeout;
use tokio_util::codec::Framed;
use tracing::{debug, error, info, warn};

use crate::codec::IrcLineCodec;
use crate::error::IrcError;
use crate::message::{command, IrcMessage};
use crate::session::Session;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
/// Servers ping idle clients well within this.
const READ_TIMEOUT: Duration = Duration::from_secs(300);
/// Gap after each PRIVMSG so the server does not flood us off.
const LINE_PACING: Duration = Duration::from_millis(500);
/// Longest host part a server may show for us before we learn the real one.
const ASSUMED_HOST_LEN: usize = 63;
/// `\x01ACTION ` plus the closing `\x01`.
const ACTION_OVERHEAD: usize = 9;

/// State shared between the connection task and the [`IrcHandle`].
struct Shared {
    status: Mutex<ChannelStatus>,
    nick: Mutex<String>,
    own_prefix: Mutex<Option<String>>,
    writer: Mutex<Option<mpsc::UnboundedSender<String>>>,
    quitting: AtomicBool,
    reconnect: Notify,
    stop: Notify,
}

impl Shared {
    fn set_status(&self, status: ChannelStatus) {
        *self.status.lock().expect("irc status poisoned") = status;
    }

    fn send_line(&self, line: String) -> Result<(), ChannelError> {
        let writer = self.writer.lock().expect("irc writer poisoned");
        let tx = writer
            .as_ref()
            .ok_or_else(|| ChannelError::NotConnected("IRC connection is down".into()))?;
        tx.send(line)
            .map_err(|_| ChannelError::SendFailed("IRC writer closed".into()))
    }

    /// Drop the writer; the writer task flushes what is queued and exits.
    fn close_writer(&self) {
        self.writer.lock().expect("irc writer poisoned").take();
    }
}

enum SessionEnd {
    Lost(String),
    Reconnect,
    Quit,
    Shutdown,
}

/// The bridge's view of the IRC connection.
pub struct IrcHandle {
    username: String,
    shared: Arc<Shared>,
}

impl IrcHandle {
    /// Bytes the server adds in front of a relayed PRIVMSG to `channel`.
    fn relay_overhead(&self, channel: &str) -> usize {
        let source_len = match &*self.shared.own_prefix.lock().expect("irc prefix poisoned") {
            Some(prefix) => prefix.len(),
            None => {
                let nick = self.shared.nick.lock().expect("irc nick poisoned");
                nick.len() + self.username.len() + ASSUMED_HOST_LEN + 3
            }
        };
        // ":<source> PRIVMSG <channel> :"
        source_len + channel.len() + 12
    }

    pub fn nick(&self) -> String {
        self.shared.nick.lock().expect("irc nick poisoned").clone()
    }
}

#[async_trait]
impl Channel for IrcHandle {
    fn network(&self) -> Network {
        Network::Irc
    }

    async fn send(&self, msg: &OutboundMessage) -> Result<(), ChannelError> {
        let ChannelRef::Irc(channel) = &msg.target else {
            return Err(ChannelError::Unsupported(format!(
                "IRC cannot deliver to {}",
                msg.target
            )));
        };
        let action = msg.kind == MessageKind::Action;
        let extra = if action { ACTION_OVERHEAD } else { 0 };
        let budget = IRC_LINE_MAX.saturating_sub(self.relay_overhead(channel) + extra);

        for text in msg.content.lines().filter(|l| !l.trim().is_empty()) {
            for chunk in split_irc_line(text, budget) {
                let line = if action {
                    format!("PRIVMSG {channel} :\x01ACTION {chunk}\x01")
                } else {
                    format!("PRIVMSG {channel} :{chunk}")
                };
                self.shared.send_line(line)?;
            }
        }
        Ok(())
    }

    async fn request(&self, req: ControlRequest) -> Result<(), ChannelError> {
        match req {
            ControlRequest::Join(channel) => self.shared.send_line(format!("JOIN {channel}")),
            ControlRequest::Part(channel) => self.shared.send_line(format!("PART {channel}")),
            ControlRequest::Names(channel) => self.shared.send_line(format!("NAMES {channel}")),
            ControlRequest::Topic(channel) => self.shared.send_line(format!("TOPIC {channel}")),
            ControlRequest::Who(channel) => self.shared.send_line(format!("WHO {channel}")),
            ControlRequest::Nick(nick) => self.shared.send_line(format!("NICK {nick}")),
            ControlRequest::SetActivity(_) => Err(ChannelError::Unsupported(
                "IRC has no bot activity".into(),
            )),
            ControlRequest::Reconnect => {
                info!("IRC reconnect requested");
                self.shared.reconnect.notify_one();
                Ok(())
            }
            ControlRequest::Quit(message) => {
                self.shared.quitting.store(true, Ordering::SeqCst);
                let sent = self.shared.send_line(command("QUIT", &[&message]));
                self.shared.close_writer();
                if sent.is_err() {
                    self.shared.stop.notify_one();
                }
                Ok(())
            }
        }
    }

    fn status(&self) -> ChannelStatus {
        self.shared.status.lock().expect("irc status poisoned").clone()
    }
}

/// Owns the TCP connection to the IRC server.
///
/// Reports every inbound event to the bridge. A lost connection is reported
/// as [`IrcEvent::Disconnected`] and the adapter then waits for a
/// [`ControlRequest::Reconnect`]; the retry policy belongs to the bridge.
pub struct IrcAdapter {
    config: IrcConfig,
    shared: Arc<Shared>,
    events: mpsc::Sender<BridgeEvent>,
}

impl IrcAdapter {
    pub fn new(config: &IrcConfig, events: mpsc::Sender<BridgeEvent>) -> (Self, Arc<IrcHandle>) {
        let shared = Arc::new(Shared {
            status: Mutex::new(ChannelStatus::Disconnected),
            nick: Mutex::new(config.nickname.clone()),
            own_prefix: Mutex::new(None),
            writer: Mutex::new(None),
            quitting: AtomicBool::new(false),
            reconnect: Notify::new(),
            stop: Notify::new(),
        });
        let handle = Arc::new(IrcHandle {
            username: config.username.clone(),
            shared: Arc::clone(&shared),
        });
        let adapter = Self {
            config: config.clone(),
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
            info!(server = %self.config.server, port = self.config.port, "IRC connecting");
            let end = self.serve(&mut shutdown).await;
            self.shared.set_status(ChannelStatus::Disconnected);
            *self.shared.own_prefix.lock().expect("irc prefix poisoned") = None;

            match end {
                SessionEnd::Reconnect => {
                    info!("IRC reconnecting on request");
                    connect_now = true;
                }
                SessionEnd::Quit => {
                    info!("IRC connection closed after QUIT");
                    self.emit(IrcEvent::Disconnected {
                        reason: "quit".into(),
                        requested: true,
                    })
                    .await;
                    break;
                }
                SessionEnd::Shutdown => break,
                SessionEnd::Lost(reason) => {
                    warn!(%reason, "IRC connection lost");
                    self.shared.set_status(ChannelStatus::Error(reason.clone()));
                    self.emit(IrcEvent::Disconnected {
                        reason,
                        requested: false,
                    })
                    .await;
                }
            }
        }
        self.shared.close_writer();
        info!("IRC adapter stopped");
    }

    async fn emit(&self, event: IrcEvent) {
        if self.events.send(BridgeEvent::Irc(event)).await.is_err() {
            debug!("bridge event channel closed");
        }
    }

    async fn serve(&self, shutdown: &mut watch::Receiver<bool>) -> SessionEnd {
        let addr = (self.config.server.as_str(), self.config.port);
        let stream = match timeout(CONNECT_TIMEOUT, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return SessionEnd::Lost(format!("connect failed: {e}")),
            Err(_) => return SessionEnd::Lost("connect timed out".into()),
        };
        info!(server = %self.config.server, "IRC connected, registering");

        let (sink, mut lines) = Framed::new(stream, IrcLineCodec::new()).split();
        let (tx, rx) = mpsc::unbounded_channel();
        *self.shared.writer.lock().expect("irc writer poisoned") = Some(tx);
        let mut writer = tokio::spawn(write_lines(sink, rx));

        let mut session = Session::new(self.config.nickname.clone());
        for line in session.registration(&self.config.username, &self.config.realname) {
            let _ = self.shared.send_line(line);
        }

        let end = loop {
            tokio::select! {
                next = timeout(READ_TIMEOUT, lines.next()) => match next {
                    Err(_) => break SessionEnd::Lost("no traffic from server".into()),
                    Ok(None) if self.shared.quitting.load(Ordering::SeqCst) => break SessionEnd::Quit,
                    Ok(None) => break SessionEnd::Lost("connection closed by server".into()),
                    Ok(Some(Err(e))) => break SessionEnd::Lost(e.to_string()),
                    Ok(Some(Ok(line))) => self.on_line(&mut session, &line).await,
                },
                done = &mut writer => break match done {
                    Ok(Ok(())) if self.shared.quitting.load(Ordering::SeqCst) => SessionEnd::Quit,
                    Ok(Ok(())) => SessionEnd::Lost("writer closed".into()),
                    Ok(Err(e)) => SessionEnd::Lost(e.to_string()),
                    Err(e) => SessionEnd::Lost(format!("writer task failed: {e}")),
                },
                _ = self.shared.reconnect.notified() => break SessionEnd::Reconnect,
                _ = shutdown.changed() => break SessionEnd::Shutdown,
            }
        };
        self.shared.close_writer();
        writer.abort();
        end
    }

    async fn on_line(&self, session: &mut Session, line: &str) {
        let msg = match IrcMessage::parse(line) {
            Ok(msg) => msg,
            Err(e) => {
                debug!(error = %e, "unparsable IRC line");
                return;
            }
        };
        let outcome = session.handle(&msg);
        for reply in outcome.replies {
            if let Err(e) = self.shared.send_line(reply) {
                warn!(error = %e, "could not answer server");
            }
        }
        if let Some(prefix) = outcome.own_prefix {
            *self.shared.own_prefix.lock().expect("irc prefix poisoned") = Some(prefix);
        }
        *self.shared.nick.lock().expect("irc nick poisoned") = session.nick().to_string();

        for event in outcome.events {
            if let IrcEvent::Welcome { nick } = &event {
                info!(%nick, "IRC registration complete");
                self.shared.set_status(ChannelStatus::Connected);
            }
            self.emit(event).await;
        }
    }
}

async fn write_lines<S>(mut sink: S, mut rx: mpsc::UnboundedReceiver<String>) -> Result<(), IrcError>
where
    S: Sink<String, Error = IrcError> + Unpin,
{
    while let Some(line) = rx.recv().await {
        let paced = line.starts_with("PRIVMSG ");
        debug!(line = %line, "IRC >>");
        sink.send(line).await?;
        if paced {
            tokio::time::sleep(LINE_PACING).await;
        }
    }
    if let Err(e) = sink.close().await {
        error!(error = %e, "closing IRC connection");
    }
    Ok(())
}
