use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use figment::{
    providers::{Format, Toml},
    Figment,
};
use serde::Deserialize;

use crate::error::{IrcordError, Result};

/// Returned for a word that no table defines.
pub const MISSING_WORD: &str = "<missingword>";

/// Help topic holding the command overview.
pub const HELP_OVERVIEW: &str = "listcommands";

const BUILTIN_LOCALES: &str = include_str!("../locales/default.toml");

macro_rules! words {
    ($($variant:ident => $key:literal),* $(,)?) => {
        /// Every phrase the bridge emits into chat.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Word {
            $($variant),*
        }

        impl Word {
            pub const ALL: &'static [Word] = &[$(Word::$variant),*];

            /// Key of this word inside a `[<lang>.words]` table.
            pub fn key(self) -> &'static str {
                match self {
                    $(Word::$variant => $key),*
                }
            }
        }
    };
}

words! {
    QuitMessage => "quit_message",
    ShutdownMessage => "shutdown_message",
    BridgeUptime => "bridge_uptime",
    WebhookProblem => "webhook_problem",
    PinnedMessage => "pinned_message",
    TopicWord => "topic_word",
    TopicChanged => "topic_changed",
    TopicIs => "topic_is",
    NoTopic => "no_topic",
    OnTheChannel => "on_the_channel",
    Joined => "joined",
    LeftChannel => "left_channel",
    Reason => "reason",
    QuitIrc => "quit_irc",
    KickedUser => "kicked_user",
    NewNickIs => "new_nick_is",
    Connected => "connected",
    Bridge => "bridge",
    RelayingNotice => "relaying_notice",
    Online => "online",
    Away => "away",
    Offline => "offline",
    Reconnecting => "reconnecting",
    Retried => "retried",
    TimesNoSuccess => "times_no_success",
    FixEveryone => "fix_everyone",
    FixHere => "fix_here",
    LangAlreadyInUse => "lang_already_in_use",
    LangInUse => "lang_in_use",
    AvailableLanguages => "available_languages",
    NewLanguageAnnounce => "new_language_announce",
    InvalidCommandParam => "invalid_command_param",
    IgnoringQuits => "ignoring_quits",
    DayShort => "day_short",
    HourShort => "hour_short",
    MinuteShort => "minute_short",
    SecondShort => "second_short",
}

/// Phrases and help texts of one language.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WordTable {
    #[serde(default)]
    pub words: HashMap<String, String>,
    #[serde(default)]
    pub help: HashMap<String, String>,
}

/// All loaded languages plus the fallback language.
#[derive(Debug, Clone)]
pub struct Localization {
    default_language: String,
    tables: BTreeMap<String, WordTable>,
}

impl Localization {
    /// Built-in tables only.
    pub fn builtin(default_language: &str) -> Result<Self> {
        Self::load(default_language, None)
    }

    /// Built-in tables with an optional TOML file merged on top.
    ///
    /// Fails when the default language does not define every [`Word`].
    pub fn load(default_language: &str, extra: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Toml::string(BUILTIN_LOCALES));
        if let Some(path) = extra {
            if !path.exists() {
                return Err(IrcordError::Locale(format!(
                    "localization file {} not found",
                    path.display()
                )));
            }
            figment = figment.merge(Toml::file(path));
        }
        let tables: BTreeMap<String, WordTable> = figment
            .extract()
            .map_err(|e| IrcordError::Locale(e.to_string()))?;

        let locale = Self {
            default_language: default_language.to_string(),
            tables,
        };
        locale.validate()?;
        Ok(locale)
    }

    fn validate(&self) -> Result<()> {
        let table = self.tables.get(&self.default_language).ok_or_else(|| {
            IrcordError::Locale(format!(
                "default language '{}' has no table",
                self.default_language
            ))
        })?;
        let missing: Vec<&str> = Word::ALL
            .iter()
            .map(|w| w.key())
            .filter(|k| !table.words.contains_key(*k))
            .collect();
        if !missing.is_empty() {
            return Err(IrcordError::Locale(format!(
                "default language '{}' lacks: {}",
                self.default_language,
                missing.join(", ")
            )));
        }
        if !table.help.contains_key(HELP_OVERVIEW) {
            return Err(IrcordError::Locale(format!(
                "default language '{}' lacks help topic '{HELP_OVERVIEW}'",
                self.default_language
            )));
        }
        Ok(())
    }

    pub fn default_language(&self) -> &str {
        &self.default_language
    }

    pub fn has_language(&self, language: &str) -> bool {
        self.tables.contains_key(language)
    }

    /// Known language codes, sorted.
    pub fn languages(&self) -> Vec<&str> {
        self.tables.keys().map(String::as_str).collect()
    }

    /// Look up a word: `language`, then the default language, then [`MISSING_WORD`].
    pub fn word(&self, language: &str, word: Word) -> &str {
        self.lookup(language, |t| t.words.get(word.key()))
            .unwrap_or(MISSING_WORD)
    }

    /// Help text for a topic with the same fallback chain as [`Self::word`].
    pub fn help(&self, language: &str, topic: &str) -> Option<&str> {
        self.lookup(language, |t| t.help.get(topic))
    }

    fn lookup<'a>(
        &'a self,
        language: &str,
        get: impl Fn(&'a WordTable) -> Option<&'a String>,
    ) -> Option<&'a str> {
        self.tables
            .get(language)
            .and_then(&get)
            .or_else(|| self.tables.get(&self.default_language).and_then(&get))
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn builtin_tables_validate() {
        let locale = Localization::builtin("en").unwrap();
        assert_eq!(locale.languages(), vec!["en", "fi"]);
        assert_eq!(locale.word("en", Word::Joined), "joined");
        assert_eq!(locale.word("fi", Word::Joined), "liittyi kanavalle");
    }

    #[test]
    fn unknown_language_falls_back_to_default() {
        let locale = Localization::builtin("en").unwrap();
        assert_eq!(locale.word("sv", Word::Online), "online");
        assert!(locale.help("sv", "!who").is_some());
    }

    #[test]
    fn partial_language_falls_back_per_entry() {
        let locale = Localization::builtin("en").unwrap();
        // The Finnish table has no !btc help text.
        assert_eq!(
            locale.help("fi", "!btc"),
            locale.help("en", "!btc"),
        );
        assert!(locale.help("fi", "!nosuch").is_none());
    }

    #[test]
    fn missing_default_language_is_rejected() {
        let err = Localization::builtin("xx").unwrap_err();
        assert!(err.to_string().contains("no table"));
    }

    #[test]
    fn extra_file_merges_and_must_keep_default_complete() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[sv.words]\njoined = \"gick med i\"\n[en.words]\nonline = \"here\"").unwrap();
        let locale = Localization::load("en", Some(file.path())).unwrap();
        assert!(locale.has_language("sv"));
        assert_eq!(locale.word("sv", Word::Joined), "gick med i");
        assert_eq!(locale.word("sv", Word::Away), "away");
        assert_eq!(locale.word("en", Word::Online), "here");

        // A language with only a partial table cannot be the default.
        assert!(Localization::load("sv", Some(file.path())).is_err());
    }
}
