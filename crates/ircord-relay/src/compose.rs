//! Building the text of relayed lines and notices.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use ircord_channels::{OutboundMessage, QuotedMessage};
use ircord_core::{ChannelLink, ChannelRef, Presence, UserRecord, Word};
use ircord_format::{local_hhmm, rewrite_custom_emoji, shorten, tidy_tags};
use regex::Regex;

use crate::context::BridgeContext;

/// Prefix marking bot-identity posts that carry IRC content.
pub const IRC_TAG: &str = "**[IRC]**";
/// Webhook username for IRC notices without a speaker.
pub const IRC_SYSTEM_NAME: &str = "[IRC]";

static URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://[^\s<>]+").expect("valid url regex"));

/// URLs in `text`, in order of appearance.
pub fn find_urls(text: &str) -> Vec<String> {
    URL.find_iter(text).map(|m| m.as_str().to_string()).collect()
}

/// Collapse line breaks into single spaces and trim.
pub fn normalize(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Name an IRC speaker appears under on Discord.
pub fn irc_display_name(prefix: &str, status: &str, nick: &str, postfix: &str) -> String {
    format!("{prefix}{status}{nick}{postfix}")
}

/// `(Re: HH:MM <author> excerpt)` for a reply.
pub fn reply_suffix(quoted: &QuotedMessage, shift_hours: i64, max_chars: usize) -> String {
    format!(
        "(Re: {} {})",
        local_hhmm(quoted.created_at, shift_hours),
        quote_excerpt(&quoted.author, &quoted.content, &quoted.attachments, max_chars)
    )
}

/// `<author> text...` of a quoted message, with attachments and custom emoji flattened.
pub fn quote_excerpt(author: &str, content: &str, attachments: &[String], max_chars: usize) -> String {
    let mut body = rewrite_custom_emoji(&normalize(content));
    for url in attachments {
        if !body.is_empty() {
            body.push(' ');
        }
        body.push_str(url);
    }
    tidy_tags(&format!("<{author}> {}", shorten(&body, max_chars)))
}

/// `(@ HH:MM <author> excerpt)` used by edit and reaction notices.
pub fn at_suffix(author: &str, content: &str, created_at: DateTime<Utc>, shift_hours: i64, max_chars: usize) -> String {
    format!(
        "(@ {} {})",
        local_hhmm(created_at, shift_hours),
        quote_excerpt(author, content, &[], max_chars)
    )
}

/// Replace `@everyone`/`@here` (optionally followed by one punctuation
/// character) with harmless text.
pub fn neutralize_broadcasts(text: &str, everyone: &str, here: &str) -> String {
    text.split(' ')
        .map(|token| {
            for (needle, replacement) in [("@everyone", everyone), ("@here", here)] {
                if token == needle {
                    return replacement.to_string();
                }
                let mut chars = token.chars();
                if let Some(last) = chars.next_back() {
                    if chars.as_str() == needle {
                        return format!("{replacement}{last}");
                    }
                }
            }
            token.to_string()
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Rewrite `@name` tokens that `resolve` knows into Discord mentions,
/// keeping a trailing punctuation character.
pub fn rewrite_mentions(text: &str, resolve: impl Fn(&str) -> Option<UserRecord>) -> String {
    text.split(' ')
        .map(|token| {
            let Some(bare) = token.strip_prefix('@').filter(|b| !b.is_empty()) else {
                return token.to_string();
            };
            match resolve(token) {
                Some(user) if user.display_name == bare || user.name == bare => user.mention(),
                Some(user) => {
                    let last = bare.chars().next_back().map(String::from).unwrap_or_default();
                    format!("{}{last}", user.mention())
                }
                None => token.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// First word of `raw` that looks like a channel name (`#x`, not `##x`).
///
/// Best effort only; used when a topic reply carries no usable channel.
pub fn extract_first_channel(raw: &str) -> Option<String> {
    raw.split_whitespace()
        .map(|w| w.trim_start_matches(':'))
        .find(|w| w.len() > 1 && w.starts_with('#') && !w[1..].starts_with('#'))
        .map(String::from)
}

/// `[Discord] - online: a, b | away: c | offline: d` for one Discord channel.
pub fn presence_listing(users: &[UserRecord], channel_id: u64, words: [&str; 3]) -> String {
    let [online_w, away_w, offline_w] = words;
    let visible = users
        .iter()
        .filter(|u| u.channels.is_empty() || u.channels.contains(&channel_id));
    let (mut online, mut away, mut offline) = (Vec::new(), Vec::new(), Vec::new());
    for user in visible {
        let name = user.display_name.as_str();
        match user.presence {
            Presence::Online => online.push(name),
            Presence::Away => away.push(name),
            Presence::Offline | Presence::Unknown => offline.push(name),
        }
    }
    format!(
        "[Discord] - {online_w}: {} | {away_w}: {} | {offline_w}: {}",
        online.join(", "),
        away.join(", "),
        offline.join(", ")
    )
}

impl BridgeContext {
    /// Relay an IRC speaker's line to the linked Discord channel.
    pub fn relay_to_discord(&self, link: &ChannelLink, nick: &str, text: &str) {
        let display = irc_display_name(
            &self.config.irc.nick_prefix,
            &self.state.status_prefix(nick),
            nick,
            &self.config.irc.nick_postfix,
        );
        let target = ChannelRef::Discord(link.discord);
        match &link.webhook {
            Some(url) => {
                let msg = OutboundMessage::text(target.clone(), text).via_webhook(url, &display);
                let fallback = OutboundMessage::text(
                    target,
                    format!("```{}```\n{IRC_TAG} {display} {text}", self.word(Word::WebhookProblem)),
                );
                self.post_with_fallback(msg, Some(fallback));
            }
            None => self.post(OutboundMessage::text(target, format!("{IRC_TAG} {display} {text}"))),
        }
    }

    /// Post an IRC-side notice (join, part, topic...) to the linked Discord channel.
    pub fn notice_to_discord(&self, link: &ChannelLink, text: &str) {
        let target = ChannelRef::Discord(link.discord);
        let plain = OutboundMessage::text(target.clone(), format!("{IRC_TAG} {text}"));
        match &link.webhook {
            Some(url) => {
                let msg = OutboundMessage::text(target, text).via_webhook(url, IRC_SYSTEM_NAME);
                self.post_with_fallback(msg, Some(plain));
            }
            None => self.post(plain),
        }
    }

    /// Post plain text to an IRC channel.
    pub fn say_on_irc(&self, channel: &str, text: &str) {
        self.post(OutboundMessage::text(ChannelRef::Irc(channel.to_string()), text));
    }

    /// Post plain text to a Discord channel as the bot.
    pub fn say_on_discord(&self, channel_id: u64, text: &str) {
        self.post(OutboundMessage::text(ChannelRef::Discord(channel_id), text));
    }

    /// Post to whichever channel `target` names, as the bot.
    pub fn say(&self, target: &ChannelRef, text: &str) {
        self.post(OutboundMessage::text(target.clone(), text));
    }

    /// Discord presence listing for the channel linked to `link`.
    pub fn discord_presence_line(&self, link: &ChannelLink) -> String {
        let words = [
            self.word(Word::Online),
            self.word(Word::Away),
            self.word(Word::Offline),
        ];
        presence_listing(
            &self.state.users(),
            link.discord,
            [words[0].as_str(), words[1].as_str(), words[2].as_str()],
        )
    }

    /// `[Discord] #name - topic is: ...` for the channel linked to `link`.
    pub fn discord_topic_line(&self, link: &ChannelLink) -> String {
        let topic = self
            .state
            .discord_topic(link.discord)
            .unwrap_or_else(|| self.word(Word::NoTopic));
        format!(
            "[Discord] #{} - {}: {topic}",
            link.discord_label(),
            self.word(Word::TopicIs)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn alice() -> UserRecord {
        UserRecord::new("123", "alice", "alice")
    }

    #[test]
    fn mentions_resolve_with_trailing_punctuation() {
        let resolve = |tok: &str| {
            let bare = tok.trim_start_matches('@');
            (bare == "alice" || bare == "alice:").then(alice)
        };
        assert_eq!(rewrite_mentions("@alice: hi", resolve), "<@123>: hi");
        assert_eq!(rewrite_mentions("hey @alice", resolve), "hey <@123>");
        assert_eq!(rewrite_mentions("@bob hi", resolve), "@bob hi");
        assert_eq!(rewrite_mentions("mail me @ home", resolve), "mail me @ home");
    }

    #[test]
    fn broadcast_mentions_are_defused() {
        assert_eq!(
            neutralize_broadcasts("@everyone look @here!", "@ everyone", "@ here"),
            "@ everyone look @ here!"
        );
        assert_eq!(neutralize_broadcasts("@everyones", "X", "Y"), "Xs");
        assert_eq!(neutralize_broadcasts("everyone here", "X", "Y"), "everyone here");
    }

    #[test]
    fn reply_suffix_quotes_author_and_excerpt() {
        let quoted = QuotedMessage {
            author: "bob".into(),
            content: format!("line one\n{}", "x".repeat(100)),
            attachments: vec![],
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 10, 5, 0).unwrap(),
        };
        let suffix = reply_suffix(&quoted, 2, 70);
        assert!(suffix.starts_with("(Re: 12:05 <bob> line one xxx"));
        assert!(suffix.ends_with("...)"));
    }

    #[test]
    fn quote_excerpt_tidies_nested_wrappers() {
        assert_eq!(quote_excerpt("<nick>", "hi <:wave:1>", &[], 70), "<nick> hi :wave:");
        assert_eq!(
            quote_excerpt("bob", "", &["https://cdn/x.png".into()], 70),
            "<bob> https://cdn/x.png"
        );
    }

    #[test]
    fn first_channel_is_extracted_from_raw_reply() {
        assert_eq!(
            extract_first_channel(":irc.example 332 ircord #rust :Welcome #all"),
            Some("#rust".into())
        );
        assert_eq!(extract_first_channel("##meta #real"), Some("#real".into()));
        assert_eq!(extract_first_channel("no channel # here"), None);
    }

    #[test]
    fn urls_are_found() {
        assert_eq!(
            find_urls("see https://a.com/x_y and <http://b.org>"),
            vec!["https://a.com/x_y", "http://b.org"]
        );
    }

    #[test]
    fn normalize_joins_lines() {
        assert_eq!(normalize("  a\n\nb  \n c "), "a b c");
    }

    #[test]
    fn presence_listing_groups_users() {
        let mut a = UserRecord::new("1", "a", "Ann");
        a.presence = Presence::Online;
        let mut b = UserRecord::new("2", "b", "Ben");
        b.presence = Presence::Away;
        let c = UserRecord::new("3", "c", "Cid");
        let mut hidden = UserRecord::new("4", "d", "Dee");
        hidden.channels.insert(99);
        let line = presence_listing(&[a, b, c, hidden], 5, ["online", "away", "offline"]);
        assert_eq!(line, "[Discord] - online: Ann | away: Ben | offline: Cid");
    }
}
