use std::time::Duration;

use ircord_channels::{
    BridgeEvent, Channel, ChannelStatus, ControlRequest, IrcEvent, OutboundMessage,
};
use ircord_core::{ChannelRef, IrcordConfig};
use ircord_irc::IrcAdapter;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

fn irc_config(port: u16) -> ircord_core::config::IrcConfig {
    let toml = format!(
        r##"
        [irc]
        server = "127.0.0.1"
        port = {port}
        nickname = "ircord"
        username = "bridge"
        realname = "test bridge"

        [discord]
        token = "token"

        [[channels]]
        irc = "#c"
        discord = 1
        "##
    );
    IrcordConfig::from_toml(&toml).unwrap().irc
}

async fn read_line(reader: &mut BufReader<OwnedReadHalf>) -> String {
    let mut line = String::new();
    timeout(WAIT, reader.read_line(&mut line))
        .await
        .expect("client line in time")
        .unwrap();
    line.trim_end().to_string()
}

async fn write_line(writer: &mut OwnedWriteHalf, line: &str) {
    writer
        .write_all(format!("{line}\r\n").as_bytes())
        .await
        .unwrap();
}

async fn next_event(events: &mut mpsc::Receiver<BridgeEvent>) -> IrcEvent {
    match timeout(WAIT, events.recv()).await.expect("event in time") {
        Some(BridgeEvent::Irc(event)) => event,
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn registers_relays_and_quits() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (events_tx, mut events) = mpsc::channel(64);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let (adapter, handle) = IrcAdapter::new(&irc_config(port), events_tx);
    let task = tokio::spawn(adapter.run(shutdown_rx));

    let (socket, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
    let (read, mut write) = socket.into_split();
    let mut reader = BufReader::new(read);

    assert_eq!(read_line(&mut reader).await, "NICK ircord");
    assert_eq!(read_line(&mut reader).await, "USER bridge 0 * :test bridge");

    write_line(&mut write, ":srv 433 * ircord :Nickname is already in use").await;
    assert_eq!(read_line(&mut reader).await, "NICK ircord_");

    write_line(&mut write, ":srv 001 ircord_ :Welcome").await;
    assert_eq!(
        next_event(&mut events).await,
        IrcEvent::Welcome {
            nick: "ircord_".into()
        }
    );
    assert_eq!(handle.status(), ChannelStatus::Connected);

    write_line(&mut write, "PING :srv").await;
    assert_eq!(read_line(&mut reader).await, "PONG :srv");

    handle
        .request(ControlRequest::Join("#c".into()))
        .await
        .unwrap();
    assert_eq!(read_line(&mut reader).await, "JOIN #c");

    write_line(&mut write, ":someone!u@h PRIVMSG #c :hello bridge").await;
    assert_eq!(
        next_event(&mut events).await,
        IrcEvent::Message {
            channel: "#c".into(),
            nick: "someone".into(),
            text: "hello bridge".into(),
            action: false,
        }
    );

    handle
        .send(&OutboundMessage::text(
            ChannelRef::Irc("#c".into()),
            "first\nsecond",
        ))
        .await
        .unwrap();
    assert_eq!(read_line(&mut reader).await, "PRIVMSG #c :first");
    assert_eq!(read_line(&mut reader).await, "PRIVMSG #c :second");

    handle
        .request(ControlRequest::Quit("bye".into()))
        .await
        .unwrap();
    assert_eq!(read_line(&mut reader).await, "QUIT :bye");
    drop(write);

    assert_eq!(
        next_event(&mut events).await,
        IrcEvent::Disconnected {
            reason: "quit".into(),
            requested: true,
        }
    );
    timeout(WAIT, task).await.unwrap().unwrap();
    assert!(handle.send(&OutboundMessage::text(ChannelRef::Irc("#c".into()), "late")).await.is_err());
}

#[tokio::test]
async fn lost_connection_is_reported_and_reconnect_is_on_request() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (events_tx, mut events) = mpsc::channel(64);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (adapter, handle) = IrcAdapter::new(&irc_config(port), events_tx);
    let task = tokio::spawn(adapter.run(shutdown_rx));

    let (socket, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
    drop(socket);
    match next_event(&mut events).await {
        IrcEvent::Disconnected { requested, .. } => assert!(!requested),
        other => panic!("unexpected {other:?}"),
    }
    assert!(!handle.is_connected());

    handle.request(ControlRequest::Reconnect).await.unwrap();
    let (socket, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
    let mut reader = BufReader::new(socket);
    let mut line = String::new();
    timeout(WAIT, reader.read_line(&mut line)).await.unwrap().unwrap();
    assert_eq!(line.trim_end(), "NICK ircord");

    shutdown_tx.send(true).unwrap();
    timeout(WAIT, task).await.unwrap().unwrap();
}
