//! Chat commands understood on both networks.
//!
//! The first word of a relayed message, lower-cased, is looked up among the
//! operator commands (only for operators) and then the public ones. A message
//! is always relayed before its command runs.

use std::sync::Arc;

use ircord_channels::ControlRequest;
use ircord_core::locale::HELP_OVERVIEW;
use ircord_core::{ChannelRef, Network, Word};
use ircord_state::GuardCategory;
use tracing::{info, warn};

use crate::context::BridgeContext;
use crate::lifecycle;
use crate::market;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Help,
    Info,
    Status,
    Who,
    Topic,
    Speak,
    Btc,
    Mstr,
    Stock,
    Shutdown,
    Nick,
    IgnoreQuits,
}

const OPERATOR_COMMANDS: &[Command] = &[Command::Shutdown, Command::Nick, Command::IgnoreQuits];

const PUBLIC_COMMANDS: &[Command] = &[
    Command::Help,
    Command::Info,
    Command::Status,
    Command::Who,
    Command::Topic,
    Command::Speak,
    Command::Btc,
    Command::Mstr,
    Command::Stock,
];

impl Command {
    /// Canonical spelling; also the help-table key.
    pub fn canonical(self) -> &'static str {
        self.aliases()[0]
    }

    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Command::Help => &["!help", "!apua", "!apuva"],
            Command::Info => &["!info"],
            Command::Status => &["!status", "!tila"],
            Command::Who => &["!who", "!ketä", "!kuka"],
            Command::Topic => &["!topic", "!otsikko"],
            Command::Speak => &["!speak", "!puhu", "!viännä"],
            Command::Btc => &["!btc"],
            Command::Mstr => &["!mstr"],
            Command::Stock => &["!stock", "!kurssi", "!value"],
            Command::Shutdown => &["!shutdown", "!sammu"],
            Command::Nick => &["!nick"],
            Command::IgnoreQuits => &["!ignorequits"],
        }
    }

    /// Resolve a lower-cased token. Operator commands are only visible to operators.
    pub fn lookup(token: &str, is_operator: bool) -> Option<Command> {
        let operator = if is_operator { OPERATOR_COMMANDS } else { &[] };
        operator
            .iter()
            .chain(PUBLIC_COMMANDS)
            .copied()
            .find(|c| c.aliases().contains(&token))
    }
}

/// A recognized command with its context.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub command: Command,
    pub args: Vec<String>,
    pub origin: ChannelRef,
    pub sender: String,
}

impl Invocation {
    /// Parse a relayed message; `None` if it does not start with a known command.
    pub fn parse(text: &str, origin: ChannelRef, sender: &str, is_operator: bool) -> Option<Self> {
        let mut words = text.split_whitespace();
        let token = words.next()?.to_lowercase();
        let command = Command::lookup(&token, is_operator)?;
        Some(Self {
            command,
            args: words.map(String::from).collect(),
            origin,
            sender: sender.to_string(),
        })
    }

    fn arg(&self, i: usize) -> Option<&str> {
        self.args.get(i).map(String::as_str)
    }
}

/// Help-table key for `!help <topic>`; aliases with or without `!` map to
/// the canonical command, anything else is looked up as typed.
fn help_key(topic: &str) -> String {
    let topic = topic.to_lowercase();
    Command::lookup(&topic, true)
        .or_else(|| Command::lookup(&format!("!{topic}"), true))
        .map_or(topic.clone(), |c| c.canonical().to_string())
}

/// Run a command. Replies go to the origin channel unless noted.
pub async fn dispatch(ctx: &Arc<BridgeContext>, inv: Invocation) {
    let Some(link) = ctx.state.link_for(&inv.origin) else {
        return;
    };
    let from_irc = inv.origin.network() == Network::Irc;
    info!(command = inv.command.canonical(), sender = %inv.sender, origin = %inv.origin, "chat command");

    match inv.command {
        Command::Help => {
            let reply = match inv.arg(0) {
                None => ctx.help(HELP_OVERVIEW),
                Some(topic) => {
                    let key = help_key(topic);
                    Some(
                        ctx.help(&key)
                            .unwrap_or_else(|| format!("{} {key}", ctx.word(Word::InvalidCommandParam))),
                    )
                }
            };
            if let Some(text) = reply {
                let text = if from_irc { text.replace('\n', " - ") } else { text };
                ctx.say(&inv.origin, &text);
            }
        }
        Command::Info => {
            if let Some(text) = ctx.help(Command::Info.canonical()) {
                ctx.say(&inv.origin, &text);
            }
        }
        Command::Status => {
            let text = format!("{} {}", ctx.word(Word::BridgeUptime), ctx.uptime_text());
            ctx.say_on_irc(&link.irc, &text);
            ctx.say_on_discord(link.discord, &text);
        }
        Command::Who => {
            if from_irc {
                ctx.say_on_irc(&link.irc, &ctx.discord_presence_line(&link));
            } else {
                ctx.mark_query(&link.irc, GuardCategory::Names);
                ctx.request(Network::Irc, ControlRequest::Names(link.irc.clone()))
                    .await;
            }
        }
        Command::Topic => {
            if from_irc {
                ctx.say_on_irc(&link.irc, &ctx.discord_topic_line(&link));
            } else {
                ctx.mark_query(&link.irc, GuardCategory::Topic);
                ctx.request(Network::Irc, ControlRequest::Topic(link.irc.clone()))
                    .await;
            }
        }
        Command::Speak => speak(ctx, &inv),
        Command::Btc => market::announce(ctx, "BTC-USD", &link),
        Command::Mstr => market::announce(ctx, "MSTR", &link),
        Command::Stock => match inv.arg(0) {
            Some(symbol) => market::announce(ctx, &symbol.to_uppercase(), &link),
            None => {
                if let Some(text) = ctx.help(Command::Stock.canonical()) {
                    ctx.say(&inv.origin, &text);
                }
            }
        },
        Command::Shutdown => {
            let reason = if inv.args.is_empty() {
                format!("{} @ {}", inv.sender, inv.origin.network())
            } else {
                inv.args.join(" ")
            };
            lifecycle::begin_shutdown(ctx, &reason);
        }
        Command::Nick => match inv.arg(0) {
            Some(nick) => {
                ctx.request(Network::Irc, ControlRequest::Nick(nick.to_string()))
                    .await
            }
            None => warn!(sender = %inv.sender, "!nick without a nick"),
        },
        Command::IgnoreQuits => {
            if let Some(nick) = inv.arg(0) {
                ctx.ignore(nick);
                ctx.say(
                    &inv.origin,
                    &format!("{} {nick}", ctx.word(Word::IgnoringQuits)),
                );
            }
        }
    }
}

fn speak(ctx: &Arc<BridgeContext>, inv: &Invocation) {
    let current = ctx.language();
    let Some(wanted) = inv.arg(0).map(str::to_lowercase) else {
        let text = format!(
            "{} {}. {}",
            ctx.word(Word::LangInUse),
            current,
            ctx.help(Command::Speak.canonical()).unwrap_or_default()
        );
        ctx.say(&inv.origin, &text);
        return;
    };

    if wanted == current {
        ctx.say(
            &inv.origin,
            &format!("{} {current}", ctx.word(Word::LangAlreadyInUse)),
        );
    } else if ctx.locale.has_language(&wanted) {
        ctx.set_language(&wanted);
        info!(language = %wanted, "bridge language changed");
        let announce = ctx.word(Word::NewLanguageAnnounce);
        ctx.broadcast(Network::Irc, &announce);
        ctx.broadcast(Network::Discord, &announce);
    } else {
        let available = ctx
            .locale
            .languages()
            .iter()
            .map(|l| format!("'{l}'"))
            .collect::<Vec<_>>()
            .join(" ");
        ctx.say(
            &inv.origin,
            &format!(
                "{} {current}, {} {available}",
                ctx.word(Word::LangInUse),
                ctx.word(Word::AvailableLanguages)
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_resolve_to_canonical() {
        assert_eq!(Command::lookup("!apua", false), Some(Command::Help));
        assert_eq!(Command::lookup("!kuka", false), Some(Command::Who));
        assert_eq!(Command::lookup("!ketä", false), Some(Command::Who));
        assert_eq!(Command::lookup("!puhu", false), Some(Command::Speak));
        assert_eq!(Command::lookup("!kurssi", false), Some(Command::Stock));
        assert_eq!(Command::Who.canonical(), "!who");
    }

    #[test]
    fn operator_commands_hidden_from_others() {
        assert_eq!(Command::lookup("!shutdown", false), None);
        assert_eq!(Command::lookup("!shutdown", true), Some(Command::Shutdown));
        assert_eq!(Command::lookup("!nick", true), Some(Command::Nick));
        assert_eq!(Command::lookup("!status", true), Some(Command::Status));
    }

    #[test]
    fn help_topics_resolve_to_canonical_keys() {
        assert_eq!(help_key("apua"), "!help");
        assert_eq!(help_key("!KURSSI"), "!stock");
        assert_eq!(help_key("shutdown"), "!shutdown");
        assert_eq!(help_key("Nonsense"), "nonsense");
    }

    #[test]
    fn invocation_parses_first_word_case_insensitively() {
        let inv = Invocation::parse("!STOCK aapl now", ChannelRef::Irc("#a".into()), "bob", false)
            .unwrap();
        assert_eq!(inv.command, Command::Stock);
        assert_eq!(inv.args, vec!["aapl", "now"]);
        assert!(Invocation::parse("hello !help", ChannelRef::Irc("#a".into()), "bob", false).is_none());
        assert!(Invocation::parse("", ChannelRef::Irc("#a".into()), "bob", false).is_none());
    }
}
