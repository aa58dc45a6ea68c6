//! IRC line parsing and rendering.

use std::fmt;

use crate::error::{IrcError, Result};

/// Message source: `nick!user@host` or a bare server name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prefix {
    pub nick: String,
    pub user: Option<String>,
    pub host: Option<String>,
}

impl Prefix {
    pub fn parse(raw: &str) -> Self {
        let (nick_user, host) = match raw.split_once('@') {
            Some((left, host)) => (left, Some(host.to_string())),
            None => (raw, None),
        };
        let (nick, user) = match nick_user.split_once('!') {
            Some((nick, user)) => (nick, Some(user.to_string())),
            None => (nick_user, None),
        };
        Self {
            nick: nick.to_string(),
            user,
            host,
        }
    }

    /// `user@host`, or whatever part of it is known.
    pub fn user_host(&self) -> String {
        match (&self.user, &self.host) {
            (Some(user), Some(host)) => format!("{user}@{host}"),
            (None, Some(host)) => host.clone(),
            (Some(user), None) => user.clone(),
            (None, None) => String::new(),
        }
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.nick)?;
        if let Some(user) = &self.user {
            write!(f, "!{user}")?;
        }
        if let Some(host) = &self.host {
            write!(f, "@{host}")?;
        }
        Ok(())
    }
}

/// One parsed protocol line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrcMessage {
    /// IRCv3 tags, unparsed.
    pub tags: Option<String>,
    pub prefix: Option<Prefix>,
    /// Upper-cased command or three-digit numeric.
    pub command: String,
    /// Middle parameters followed by the trailing one, if any.
    pub params: Vec<String>,
    pub raw: String,
}

impl IrcMessage {
    pub fn parse(line: &str) -> Result<Self> {
        let raw = line.trim_end_matches(['\r', '\n']);
        let mut rest = raw;

        let tags = match rest.strip_prefix('@') {
            Some(tagged) => {
                let (tags, tail) = tagged
                    .split_once(' ')
                    .ok_or_else(|| IrcError::Malformed(raw.to_string()))?;
                rest = tail.trim_start();
                Some(tags.to_string())
            }
            None => None,
        };

        let prefix = match rest.strip_prefix(':') {
            Some(sourced) => {
                let (source, tail) = sourced
                    .split_once(' ')
                    .ok_or_else(|| IrcError::Malformed(raw.to_string()))?;
                rest = tail.trim_start();
                Some(Prefix::parse(source))
            }
            None => None,
        };

        let (command, mut rest) = match rest.split_once(' ') {
            Some((command, tail)) => (command, tail),
            None => (rest, ""),
        };
        if command.is_empty() {
            return Err(IrcError::Malformed(raw.to_string()));
        }

        let mut params = Vec::new();
        loop {
            rest = rest.trim_start_matches(' ');
            if rest.is_empty() {
                break;
            }
            if let Some(trailing) = rest.strip_prefix(':') {
                params.push(trailing.to_string());
                break;
            }
            match rest.split_once(' ') {
                Some((param, tail)) => {
                    params.push(param.to_string());
                    rest = tail;
                }
                None => {
                    params.push(rest.to_string());
                    break;
                }
            }
        }

        Ok(Self {
            tags,
            prefix,
            command: command.to_ascii_uppercase(),
            params,
            raw: raw.to_string(),
        })
    }

    pub fn param(&self, i: usize) -> Option<&str> {
        self.params.get(i).map(String::as_str)
    }

    pub fn source_nick(&self) -> Option<&str> {
        self.prefix.as_ref().map(|p| p.nick.as_str())
    }
}

/// Render a client command; the last parameter is sent as trailing.
pub fn command(name: &str, params: &[&str]) -> String {
    let mut line = name.to_string();
    if let Some((last, middle)) = params.split_last() {
        for param in middle {
            line.push(' ');
            line.push_str(param);
        }
        line.push_str(" :");
        line.push_str(last);
    }
    line
}

/// Body of a CTCP ACTION (`/me`), if `text` is one.
pub fn ctcp_action(text: &str) -> Option<&str> {
    let inner = text.strip_prefix('\x01')?;
    let inner = inner.strip_suffix('\x01').unwrap_or(inner);
    inner
        .strip_prefix("ACTION")
        .map(|body| body.strip_prefix(' ').unwrap_or(body))
}

pub fn is_channel(target: &str) -> bool {
    target.starts_with('#') || target.starts_with('&')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_line() {
        let msg = IrcMessage::parse(
            "@time=2024-01-01T00:00:00Z :nick!~u@host.example PRIVMSG #chan :hello there\r\n",
        )
        .unwrap();
        assert_eq!(msg.tags.as_deref(), Some("time=2024-01-01T00:00:00Z"));
        let prefix = msg.prefix.clone().unwrap();
        assert_eq!(prefix.nick, "nick");
        assert_eq!(prefix.user_host(), "~u@host.example");
        assert_eq!(prefix.to_string(), "nick!~u@host.example");
        assert_eq!(msg.command, "PRIVMSG");
        assert_eq!(msg.params, vec!["#chan", "hello there"]);
    }

    #[test]
    fn parses_numeric_and_bare_commands() {
        let msg = IrcMessage::parse(":irc.example 353 me = #chan :@op +voice plain").unwrap();
        assert_eq!(msg.command, "353");
        assert_eq!(msg.param(2), Some("#chan"));
        assert_eq!(msg.param(3), Some("@op +voice plain"));

        let ping = IrcMessage::parse("ping :token").unwrap();
        assert_eq!(ping.command, "PING");
        assert_eq!(ping.source_nick(), None);

        let empty_trailing = IrcMessage::parse(":n!u@h PART #c :").unwrap();
        assert_eq!(empty_trailing.params, vec!["#c", ""]);
    }

    #[test]
    fn rejects_garbage() {
        assert!(IrcMessage::parse(":onlyprefix").is_err());
        assert!(IrcMessage::parse("").is_err());
    }

    #[test]
    fn renders_commands() {
        assert_eq!(command("PRIVMSG", &["#c", "hi there"]), "PRIVMSG #c :hi there");
        assert_eq!(command("QUIT", &[]), "QUIT");
    }

    #[test]
    fn recognizes_actions() {
        assert_eq!(ctcp_action("\x01ACTION waves\x01"), Some("waves"));
        assert_eq!(ctcp_action("\x01VERSION\x01"), None);
        assert_eq!(ctcp_action("plain"), None);
    }
}
