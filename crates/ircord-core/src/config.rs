use std::collections::HashSet;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{IrcordError, Result};
use crate::types::ChannelLink;

pub const DEFAULT_IRC_PORT: u16 = 6667;
pub const DEFAULT_MAX_RECONNECTS: u32 = 10;
pub const DEFAULT_RECONNECT_DELAY_SECS: u64 = 5;
pub const DEFAULT_CONFIG_FILE: &str = "ircord.toml";

/// Top-level config (ircord.toml + IRCORD_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IrcordConfig {
    pub irc: IrcConfig,
    pub discord: DiscordConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub preview: PreviewConfig,
    #[serde(default)]
    pub market: MarketConfig,
    #[serde(default)]
    pub channels: Vec<ChannelLink>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IrcConfig {
    pub server: String,
    #[serde(default = "default_irc_port")]
    pub port: u16,
    #[serde(default = "default_nickname")]
    pub nickname: String,
    #[serde(default = "default_nickname")]
    pub username: String,
    #[serde(default = "default_realname")]
    pub realname: String,
    /// Nicks allowed to run operator commands.
    #[serde(default)]
    pub operators: Vec<String>,
    /// Wraps relayed IRC nicks on the Discord side.
    #[serde(default = "default_nick_prefix")]
    pub nick_prefix: String,
    #[serde(default = "default_nick_postfix")]
    pub nick_postfix: String,
    #[serde(default = "default_max_reconnects")]
    pub max_reconnects: u32,
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    pub token: String,
    /// Guild the bridge operates in.
    #[serde(default)]
    pub guild_id: u64,
    /// Discord user ids allowed to run operator commands.
    #[serde(default)]
    pub operators: Vec<String>,
    /// Prepended to every line relayed into IRC.
    #[serde(default)]
    pub relay_tag: String,
    #[serde(default = "default_nick_prefix")]
    pub nick_prefix: String,
    #[serde(default = "default_nick_postfix")]
    pub nick_postfix: String,
    /// Rotated as the bot's "Listening to" activity.
    #[serde(default)]
    pub status_messages: Vec<String>,
    #[serde(default = "default_status_interval")]
    pub status_interval_secs: u64,
    #[serde(default = "default_max_reconnects")]
    pub max_reconnects: u32,
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Minimum spacing between two posts to the same network.
    #[serde(default = "default_min_post_interval")]
    pub min_post_interval_secs: f64,
    /// How long an unchanged topic/names announcement stays suppressed.
    #[serde(default = "default_spam_window")]
    pub spam_window_secs: u64,
    /// Discord messages arriving this soon after start are ignored.
    #[serde(default = "default_startup_grace")]
    pub startup_grace_secs: u64,
    /// Hour offset applied to the HH:MM stamps in reply/edit/reaction excerpts.
    #[serde(default = "default_time_shift")]
    pub local_time_shift_hours: i64,
    #[serde(default = "default_excerpt_chars")]
    pub excerpt_chars: usize,
    #[serde(default = "default_language")]
    pub default_language: String,
    #[serde(default = "default_state_path")]
    pub state_path: String,
    /// Extra localization TOML merged over the built-in tables.
    #[serde(default)]
    pub locale_path: Option<String>,
    /// Nicks whose join/part/quit notices are not relayed.
    #[serde(default)]
    pub ignore_quits: Vec<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            min_post_interval_secs: default_min_post_interval(),
            spam_window_secs: default_spam_window(),
            startup_grace_secs: default_startup_grace(),
            local_time_shift_hours: default_time_shift(),
            excerpt_chars: default_excerpt_chars(),
            default_language: default_language(),
            state_path: default_state_path(),
            locale_path: None,
            ignore_quits: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_urls")]
    pub max_urls: usize,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: default_http_timeout(),
            max_urls: default_max_urls(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    #[serde(default = "default_quote_url")]
    pub quote_url: String,
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            quote_url: default_quote_url(),
            timeout_secs: default_http_timeout(),
        }
    }
}

fn default_irc_port() -> u16 {
    DEFAULT_IRC_PORT
}
fn default_nickname() -> String {
    "ircord".to_string()
}
fn default_realname() -> String {
    "IRC <-> Discord bridge".to_string()
}
fn default_nick_prefix() -> String {
    "<".to_string()
}
fn default_nick_postfix() -> String {
    ">".to_string()
}
fn default_max_reconnects() -> u32 {
    DEFAULT_MAX_RECONNECTS
}
fn default_reconnect_delay() -> u64 {
    DEFAULT_RECONNECT_DELAY_SECS
}
fn default_status_interval() -> u64 {
    300
}
fn default_min_post_interval() -> f64 {
    2.0
}
fn default_spam_window() -> u64 {
    600
}
fn default_startup_grace() -> u64 {
    20
}
fn default_time_shift() -> i64 {
    2
}
fn default_excerpt_chars() -> usize {
    70
}
fn default_language() -> String {
    "en".to_string()
}
fn default_state_path() -> String {
    "ircord-state.json".to_string()
}
fn default_http_timeout() -> u64 {
    10
}
fn default_max_urls() -> usize {
    3
}
fn default_quote_url() -> String {
    "https://query1.finance.yahoo.com/v8/finance/chart/".to_string()
}
fn bool_true() -> bool {
    true
}

impl IrcordConfig {
    /// Load config: explicit path > IRCORD_CONFIG env > ./ircord.toml,
    /// then apply `IRCORD_SECTION__KEY` env overrides.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path
            .map(String::from)
            .or_else(|| std::env::var("IRCORD_CONFIG").ok())
            .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());

        let config: IrcordConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("IRCORD_").ignore(&["CONFIG"]).split("__"))
            .extract()
            .map_err(|e| IrcordError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Parse a config from a TOML string (no env overlay).
    pub fn from_toml(toml: &str) -> Result<Self> {
        let config: IrcordConfig = Figment::from(Toml::string(toml))
            .extract()
            .map_err(|e| IrcordError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the bridge cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.irc.server.trim().is_empty() {
            return Err(IrcordError::Config("irc.server is empty".into()));
        }
        if self.irc.nickname.trim().is_empty() {
            return Err(IrcordError::Config("irc.nickname is empty".into()));
        }
        if self.discord.token.trim().is_empty() {
            return Err(IrcordError::Config("discord.token is empty".into()));
        }
        if self.channels.is_empty() {
            return Err(IrcordError::Config(
                "no [[channels]] links configured".into(),
            ));
        }
        if !self.bridge.min_post_interval_secs.is_finite()
            || self.bridge.min_post_interval_secs < 0.0
        {
            return Err(IrcordError::Config(format!(
                "bridge.min_post_interval_secs must be a non-negative number, got {}",
                self.bridge.min_post_interval_secs
            )));
        }

        let mut irc_seen = HashSet::new();
        let mut discord_seen = HashSet::new();
        for link in &self.channels {
            if !(link.irc.starts_with('#') || link.irc.starts_with('&')) || link.irc.len() < 2 {
                return Err(IrcordError::Config(format!(
                    "'{}' is not an IRC channel name",
                    link.irc
                )));
            }
            if !irc_seen.insert(link.irc.to_lowercase()) {
                return Err(IrcordError::Config(format!(
                    "IRC channel {} is linked more than once",
                    link.irc
                )));
            }
            if !discord_seen.insert(link.discord) {
                return Err(IrcordError::Config(format!(
                    "Discord channel {} is linked more than once",
                    link.discord
                )));
            }
        }
        Ok(())
    }

    pub fn is_irc_operator(&self, nick: &str) -> bool {
        self.irc.operators.iter().any(|op| op.eq_ignore_ascii_case(nick))
    }

    pub fn is_discord_operator(&self, user_id: &str) -> bool {
        self.discord.operators.iter().any(|op| op == user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r##"
        [irc]
        server = "irc.example.net"
        operators = ["Boss"]

        [discord]
        token = "abc"
        guild_id = 42
        operators = ["1001"]

        [[channels]]
        irc = "#rust"
        discord = 111
        webhook = "https://discord.com/api/webhooks/9/tok"
    "##;

    #[test]
    fn minimal_config_gets_defaults() {
        let cfg = IrcordConfig::from_toml(MINIMAL).unwrap();
        assert_eq!(cfg.irc.port, DEFAULT_IRC_PORT);
        assert_eq!(cfg.irc.nickname, "ircord");
        assert_eq!(cfg.irc.max_reconnects, 10);
        assert_eq!(cfg.bridge.min_post_interval_secs, 2.0);
        assert_eq!(cfg.bridge.excerpt_chars, 70);
        assert_eq!(cfg.channels.len(), 1);
        assert_eq!(cfg.channels[0].webhook_id(), Some(9));
        assert!(cfg.preview.enabled);
    }

    #[test]
    fn operators_are_checked_per_network() {
        let cfg = IrcordConfig::from_toml(MINIMAL).unwrap();
        assert!(cfg.is_irc_operator("boss"));
        assert!(!cfg.is_irc_operator("someone"));
        assert!(cfg.is_discord_operator("1001"));
        assert!(!cfg.is_discord_operator("1002"));
    }

    #[test]
    fn duplicate_links_are_rejected() {
        let toml = format!("{MINIMAL}\n[[channels]]\nirc = \"#RUST\"\ndiscord = 222\n");
        let err = IrcordConfig::from_toml(&toml).unwrap_err();
        assert!(err.to_string().contains("linked more than once"));

        let toml = format!("{MINIMAL}\n[[channels]]\nirc = \"#other\"\ndiscord = 111\n");
        assert!(IrcordConfig::from_toml(&toml).is_err());
    }

    #[test]
    fn missing_channels_or_bad_names_are_rejected() {
        let no_links = r##"
            [irc]
            server = "irc.example.net"
            [discord]
            token = "abc"
        "##;
        assert!(IrcordConfig::from_toml(no_links).is_err());

        let bad_name = MINIMAL.replace("\"#rust\"", "\"rust\"");
        assert!(IrcordConfig::from_toml(&bad_name).is_err());
    }

    #[test]
    fn missing_file_reports_config_error() {
        let err = IrcordConfig::load(Some("/nonexistent/ircord.toml")).unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
    }
}
