//! Text shaping between IRC control-code formatting and Discord markdown,
//! plus the small helpers used when composing relay lines.

pub mod excerpt;
pub mod split;
pub mod transcode;

pub use excerpt::{format_uptime, local_hhmm, rewrite_custom_emoji, shorten, tidy_tags, UptimeUnits};
pub use split::{chunk_discord, split_irc_line, DISCORD_CHUNK_MAX, IRC_LINE_MAX};
pub use transcode::{irc_to_markdown, markdown_to_irc, strip_irc_formatting};
