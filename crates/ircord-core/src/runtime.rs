use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Settings changed by chat commands that survive a restart.
///
/// Stored as pretty JSON at `bridge.state_path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeState {
    /// Active bridge language.
    pub language: String,
    /// Nicks whose join/part/quit notices are suppressed.
    #[serde(default)]
    pub ignore_quits: Vec<String>,
}

impl RuntimeState {
    pub fn new(language: impl Into<String>, ignore_quits: Vec<String>) -> Self {
        Self {
            language: language.into(),
            ignore_quits,
        }
    }

    /// Load state from `path`, or `None` if it is missing or unreadable.
    pub fn load(path: &Path) -> Option<Self> {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
    }

    /// Persist state to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn is_ignored(&self, nick: &str) -> bool {
        self.ignore_quits.iter().any(|n| n.eq_ignore_ascii_case(nick))
    }

    /// Add a nick to the ignore list. Returns `false` if it was already there.
    pub fn ignore(&mut self, nick: &str) -> bool {
        if self.is_ignored(nick) {
            return false;
        }
        self.ignore_quits.push(nick.to_string());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_load_restores_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let mut state = RuntimeState::new("fi", vec![]);
        assert!(state.ignore("Spammer"));
        state.save(&path).unwrap();

        let loaded = RuntimeState::load(&path).unwrap();
        assert_eq!(loaded, state);
        assert!(loaded.is_ignored("spammer"));
    }

    #[test]
    fn missing_or_corrupt_file_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(RuntimeState::load(&dir.path().join("absent.json")).is_none());

        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(RuntimeState::load(&path).is_none());
    }

    #[test]
    fn ignore_is_idempotent() {
        let mut state = RuntimeState::new("en", vec!["bot".into()]);
        assert!(!state.ignore("BOT"));
        assert_eq!(state.ignore_quits.len(), 1);
    }
}
