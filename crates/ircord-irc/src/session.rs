//! Protocol state of one IRC connection.
//!
//! [`Session::handle`] turns each parsed line into bridge events plus any
//! lines that must be written back (PONG, nick retries). It does no I/O.

use ircord_channels::IrcEvent;
use tracing::{debug, warn};

use crate::message::{command, ctcp_action, is_channel, IrcMessage};

/// Nick to try after `nick` was refused as already in use.
///
/// `name` becomes `name_`; a nick ending in `[R]` keeps that suffix last
/// (`name[R]` becomes `name_[R]`).
pub fn alternate_nick(nick: &str) -> String {
    match nick.strip_suffix("[R]") {
        Some(base) => format!("{base}_[R]"),
        None => format!("{nick}_"),
    }
}

/// What one inbound line produced.
#[derive(Debug, Default, PartialEq)]
pub struct Outcome {
    pub events: Vec<IrcEvent>,
    pub replies: Vec<String>,
    /// Our own `nick!user@host`, learned from our JOIN echo.
    pub own_prefix: Option<String>,
}

impl Outcome {
    fn event(event: IrcEvent) -> Self {
        Self {
            events: vec![event],
            ..Self::default()
        }
    }

    fn reply(line: String) -> Self {
        Self {
            replies: vec![line],
            ..Self::default()
        }
    }
}

pub struct Session {
    nick: String,
    registered: bool,
}

impl Session {
    pub fn new(nick: impl Into<String>) -> Self {
        Self {
            nick: nick.into(),
            registered: false,
        }
    }

    /// Nick we currently hold, or are trying to register with.
    pub fn nick(&self) -> &str {
        &self.nick
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }

    /// Registration lines sent right after connecting.
    pub fn registration(&self, username: &str, realname: &str) -> Vec<String> {
        vec![
            format!("NICK {}", self.nick),
            command("USER", &[username, "0", "*", realname]),
        ]
    }

    fn is_me(&self, nick: &str) -> bool {
        nick.eq_ignore_ascii_case(&self.nick)
    }

    pub fn handle(&mut self, msg: &IrcMessage) -> Outcome {
        let nick = msg.source_nick().unwrap_or_default().to_string();
        let p = |i: usize| msg.param(i).unwrap_or_default().to_string();
        let opt = |i: usize| msg.param(i).map(String::from);

        match msg.command.as_str() {
            "PING" => Outcome::reply(command("PONG", &[msg.param(0).unwrap_or_default()])),
            "001" => {
                if let Some(me) = msg.param(0) {
                    self.nick = me.to_string();
                }
                self.registered = true;
                Outcome::event(IrcEvent::Welcome {
                    nick: self.nick.clone(),
                })
            }
            "005" => {
                let network = msg
                    .params
                    .iter()
                    .find_map(|t| t.strip_prefix("NETWORK="))
                    .map(String::from);
                match network {
                    Some(name) => Outcome::event(IrcEvent::Network { name }),
                    None => Outcome::default(),
                }
            }
            "433" => {
                let refused = msg.param(1).unwrap_or(self.nick.as_str()).to_string();
                let next = alternate_nick(&refused);
                warn!(%refused, %next, "nick in use, retrying");
                if !self.registered {
                    self.nick = next.clone();
                }
                Outcome::reply(format!("NICK {next}"))
            }
            "PRIVMSG" => {
                let target = p(0);
                if !is_channel(&target) {
                    debug!(from = %nick, "ignoring private message");
                    return Outcome::default();
                }
                let raw_text = p(1);
                let (text, action) = match ctcp_action(&raw_text) {
                    Some(body) => (body.to_string(), true),
                    None if raw_text.starts_with('\x01') => return Outcome::default(),
                    None => (raw_text.clone(), false),
                };
                Outcome::event(IrcEvent::Message {
                    channel: target,
                    nick,
                    text,
                    action,
                })
            }
            "JOIN" => {
                let own = self.is_me(&nick);
                let host = msg.prefix.as_ref().map(|p| p.user_host()).unwrap_or_default();
                let mut outcome = Outcome::event(IrcEvent::Join {
                    channel: p(0),
                    nick,
                    host,
                    own,
                });
                if own {
                    outcome.own_prefix = msg.prefix.as_ref().map(|p| p.to_string());
                }
                outcome
            }
            "PART" => Outcome::event(IrcEvent::Part {
                channel: p(0),
                own: self.is_me(&nick),
                nick,
                reason: opt(1).filter(|r| !r.is_empty()),
            }),
            "QUIT" => Outcome::event(IrcEvent::Quit {
                nick,
                reason: opt(0).filter(|r| !r.is_empty()),
            }),
            "KICK" => {
                let kicked = p(1);
                Outcome::event(IrcEvent::Kick {
                    channel: p(0),
                    by: nick,
                    own: self.is_me(&kicked),
                    nick: kicked,
                    reason: opt(2).filter(|r| !r.is_empty()),
                })
            }
            "NICK" => {
                let new = p(0);
                let own = self.is_me(&nick);
                if own {
                    self.nick = new.clone();
                }
                Outcome::event(IrcEvent::NickChange {
                    old: nick,
                    new,
                    own,
                })
            }
            "TOPIC" => Outcome::event(IrcEvent::Topic {
                channel: p(0),
                nick,
                topic: p(1),
            }),
            // RPL_TOPIC: <me> <channel> :<topic>
            "332" => Outcome::event(IrcEvent::TopicReply {
                channel: opt(1).filter(|c| is_channel(c)),
                topic: opt(2),
                raw: msg.raw.clone(),
            }),
            // RPL_NOTOPIC: <me> <channel> :No topic is set
            "331" => Outcome::event(IrcEvent::TopicReply {
                channel: opt(1).filter(|c| is_channel(c)),
                topic: None,
                raw: msg.raw.clone(),
            }),
            // RPL_NAMREPLY: <me> <symbol> <channel> :<names>
            "353" => Outcome::event(IrcEvent::Names {
                channel: p(2),
                names: p(3),
            }),
            // RPL_WHOREPLY: <me> <channel> <user> <host> <server> <nick> <flags> :<hops> <realname>
            "352" => Outcome::event(IrcEvent::Who {
                channel: p(1),
                nick: p(5),
                host: format!("{}@{}", p(2), p(3)),
            }),
            "ERROR" => {
                warn!(reason = %p(0), "server sent ERROR");
                Outcome::default()
            }
            _ => Outcome::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(session: &mut Session, line: &str) -> Outcome {
        session.handle(&IrcMessage::parse(line).unwrap())
    }

    #[test]
    fn alternate_nicks() {
        assert_eq!(alternate_nick("bridge"), "bridge_");
        assert_eq!(alternate_nick("bridge[R]"), "bridge_[R]");
    }

    #[test]
    fn answers_ping() {
        let mut s = Session::new("ircord");
        assert_eq!(feed(&mut s, "PING :abc").replies, vec!["PONG :abc"]);
    }

    #[test]
    fn nick_in_use_before_registration_retries() {
        let mut s = Session::new("ircord");
        let out = feed(&mut s, ":srv 433 * ircord :Nickname is already in use");
        assert_eq!(out.replies, vec!["NICK ircord_"]);
        assert_eq!(s.nick(), "ircord_");
        let out = feed(&mut s, ":srv 001 ircord_ :Welcome");
        assert_eq!(out.events, vec![IrcEvent::Welcome { nick: "ircord_".into() }]);
        assert!(s.is_registered());
    }

    #[test]
    fn own_join_reports_prefix() {
        let mut s = Session::new("ircord");
        let out = feed(&mut s, ":IRCord!~b@bridge.host JOIN #Chan");
        assert_eq!(out.own_prefix.as_deref(), Some("IRCord!~b@bridge.host"));
        assert!(matches!(&out.events[0], IrcEvent::Join { own: true, channel, .. } if channel == "#Chan"));
    }

    #[test]
    fn actions_and_private_messages() {
        let mut s = Session::new("ircord");
        let out = feed(&mut s, ":a!u@h PRIVMSG #c :\x01ACTION waves\x01");
        assert_eq!(
            out.events,
            vec![IrcEvent::Message {
                channel: "#c".into(),
                nick: "a".into(),
                text: "waves".into(),
                action: true
            }]
        );
        assert!(feed(&mut s, ":a!u@h PRIVMSG ircord :psst").events.is_empty());
        assert!(feed(&mut s, ":a!u@h PRIVMSG #c :\x01VERSION\x01").events.is_empty());
    }

    #[test]
    fn own_nick_change_is_tracked() {
        let mut s = Session::new("ircord");
        let out = feed(&mut s, ":ircord!u@h NICK :bridge");
        assert_eq!(
            out.events,
            vec![IrcEvent::NickChange {
                old: "ircord".into(),
                new: "bridge".into(),
                own: true
            }]
        );
        assert_eq!(s.nick(), "bridge");
    }

    #[test]
    fn kick_of_self_is_own() {
        let mut s = Session::new("ircord");
        let out = feed(&mut s, ":op!u@h KICK #c ircord :bye");
        assert!(matches!(&out.events[0], IrcEvent::Kick { own: true, by, .. } if by == "op"));
    }

    #[test]
    fn numerics_map_to_replies() {
        let mut s = Session::new("ircord");
        let out = feed(&mut s, ":srv 332 ircord #c :the topic");
        assert_eq!(
            out.events,
            vec![IrcEvent::TopicReply {
                channel: Some("#c".into()),
                topic: Some("the topic".into()),
                raw: ":srv 332 ircord #c :the topic".into()
            }]
        );
        let out = feed(&mut s, ":srv 005 ircord CHANTYPES=# NETWORK=Libera :are supported");
        assert_eq!(out.events, vec![IrcEvent::Network { name: "Libera".into() }]);
        let out = feed(&mut s, ":srv 352 ircord #c ~u host.x srv nick H :0 Real Name");
        assert_eq!(
            out.events,
            vec![IrcEvent::Who {
                channel: "#c".into(),
                nick: "nick".into(),
                host: "~u@host.x".into()
            }]
        );
    }
}
