use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use ircord_core::{ChannelLink, ChannelRef, Presence, UserRecord};
use tracing::debug;

use crate::guard::{GuardCategory, SpamGuard};
use crate::links::LinkTable;

/// Channel-status prefixes an IRC server may put in front of a nick.
const STATUS_PREFIXES: &[char] = &['~', '&', '@', '%', '+'];

/// Host recorded for nicks seen only through NAMES.
pub const UNKNOWN_HOST: &str = "?";

/// Split a NAMES reply into `(status prefix, nick)` pairs.
///
/// Only the highest prefix is kept (`@+nick` -> `("@", "nick")`).
pub fn parse_names(raw: &str) -> Vec<(String, String)> {
    raw.split_whitespace()
        .filter_map(|entry| {
            let nick = entry.trim_start_matches(STATUS_PREFIXES);
            if nick.is_empty() {
                return None;
            }
            let status = entry
                .chars()
                .next()
                .filter(|c| STATUS_PREFIXES.contains(c))
                .map(String::from)
                .unwrap_or_default();
            Some((status, nick.to_string()))
        })
        .collect()
}

struct Inner {
    links: LinkTable,
    /// lowercased IRC channel -> nick -> host
    irc_channels: HashMap<String, BTreeMap<String, String>>,
    irc_status: HashMap<String, String>,
    /// Discord user id -> record
    discord_users: BTreeMap<String, UserRecord>,
    discord_topics: HashMap<u64, String>,
    guard: SpamGuard,
    network_name: Option<String>,
}

/// Shared view of both networks.
///
/// Every method takes `&self` and holds the internal lock only for the
/// duration of the call, so adapters and the orchestrator can share one
/// instance.
pub struct StateCache {
    inner: Mutex<Inner>,
}

impl StateCache {
    pub fn new(links: Vec<ChannelLink>, spam_window: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                links: LinkTable::new(links),
                irc_channels: HashMap::new(),
                irc_status: HashMap::new(),
                discord_users: BTreeMap::new(),
                discord_topics: HashMap::new(),
                guard: SpamGuard::new(spam_window),
                network_name: None,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("state cache poisoned")
    }

    // ---------------------------------------------------------------------
    // Links
    // ---------------------------------------------------------------------

    /// Replace the whole link set.
    pub fn link_channels(&self, links: Vec<ChannelLink>) {
        self.lock().links.replace(links);
    }

    pub fn links(&self) -> Vec<ChannelLink> {
        self.lock().links.all().to_vec()
    }

    pub fn link_for(&self, channel: &ChannelRef) -> Option<ChannelLink> {
        self.lock().links.by_ref(channel).cloned()
    }

    pub fn resolve_peer_channel(&self, channel: &ChannelRef) -> Option<ChannelRef> {
        self.lock().links.peer_of(channel)
    }

    pub fn set_discord_channel_name(&self, channel_id: u64, name: &str) -> bool {
        self.lock().links.set_discord_name(channel_id, name)
    }

    // ---------------------------------------------------------------------
    // IRC membership
    // ---------------------------------------------------------------------

    /// Merge a NAMES reply into the channel's member list.
    pub fn update_membership(&self, channel: &str, raw_names: &str) {
        let mut inner = self.lock();
        let parsed = parse_names(raw_names);
        for (status, nick) in &parsed {
            inner.irc_status.insert(nick.clone(), status.clone());
        }
        let members = inner.irc_channels.entry(channel.to_lowercase()).or_default();
        for (_, nick) in parsed {
            members.entry(nick).or_insert_with(|| UNKNOWN_HOST.to_string());
        }
    }

    /// Record a nick on a channel together with its host.
    pub fn record_join(&self, channel: &str, nick: &str, host: &str) {
        self.lock()
            .irc_channels
            .entry(channel.to_lowercase())
            .or_default()
            .insert(nick.to_string(), host.to_string());
    }

    /// Remove a nick from one channel. Returns whether it was present.
    pub fn record_part(&self, channel: &str, nick: &str) -> bool {
        self.lock()
            .irc_channels
            .get_mut(&channel.to_lowercase())
            .is_some_and(|m| m.remove(nick).is_some())
    }

    /// Drop everything known about a channel (the bridge left it).
    pub fn forget_channel(&self, channel: &str) {
        self.lock().irc_channels.remove(&channel.to_lowercase());
    }

    /// Remove a nick from every channel. Returns the channels it was on.
    pub fn record_quit(&self, nick: &str) -> Vec<String> {
        let mut inner = self.lock();
        inner.irc_status.remove(nick);
        let mut left: Vec<String> = inner
            .irc_channels
            .iter_mut()
            .filter_map(|(chan, members)| members.remove(nick).map(|_| chan.clone()))
            .collect();
        left.sort();
        left
    }

    /// Rename a nick everywhere, keeping host and status. Returns the channels touched.
    pub fn record_rename(&self, old: &str, new: &str) -> Vec<String> {
        let mut inner = self.lock();
        if let Some(status) = inner.irc_status.remove(old) {
            inner.irc_status.insert(new.to_string(), status);
        }
        let mut touched: Vec<String> = inner
            .irc_channels
            .iter_mut()
            .filter_map(|(chan, members)| {
                members.remove(old).map(|host| {
                    members.insert(new.to_string(), host);
                    chan.clone()
                })
            })
            .collect();
        touched.sort();
        debug!(%old, %new, channels = touched.len(), "nick renamed in cache");
        touched
    }

    pub fn is_member(&self, channel: &str, nick: &str) -> bool {
        self.lock()
            .irc_channels
            .get(&channel.to_lowercase())
            .is_some_and(|m| m.contains_key(nick))
    }

    /// Sorted nicks on a channel.
    pub fn channel_members(&self, channel: &str) -> Vec<String> {
        self.lock()
            .irc_channels
            .get(&channel.to_lowercase())
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn host_of(&self, channel: &str, nick: &str) -> Option<String> {
        self.lock()
            .irc_channels
            .get(&channel.to_lowercase())
            .and_then(|m| m.get(nick).cloned())
    }

    /// `@`, `+` or empty.
    pub fn status_prefix(&self, nick: &str) -> String {
        self.lock().irc_status.get(nick).cloned().unwrap_or_default()
    }

    pub fn set_network_name(&self, name: &str) {
        self.lock().network_name = Some(name.to_string());
    }

    pub fn network_name(&self) -> Option<String> {
        self.lock().network_name.clone()
    }

    // ---------------------------------------------------------------------
    // Discord users
    // ---------------------------------------------------------------------

    pub fn upsert_user(&self, user: UserRecord) {
        self.lock().discord_users.insert(user.user_id.clone(), user);
    }

    /// Replace the known Discord users with a fresh snapshot.
    pub fn replace_users(&self, users: Vec<UserRecord>) {
        let mut inner = self.lock();
        inner.discord_users = users
            .into_iter()
            .map(|u| (u.user_id.clone(), u))
            .collect();
    }

    /// Update a user's presence. Returns `false` for unknown users.
    pub fn record_presence(&self, user_id: &str, presence: Presence) -> bool {
        match self.lock().discord_users.get_mut(user_id) {
            Some(user) => {
                user.presence = presence;
                true
            }
            None => false,
        }
    }

    /// Known users ordered by display name.
    pub fn users(&self) -> Vec<UserRecord> {
        let mut users: Vec<UserRecord> = self.lock().discord_users.values().cloned().collect();
        users.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        users
    }

    /// Find the Discord user a chat token refers to.
    ///
    /// A leading `@` is ignored. The token is tried verbatim, then with its
    /// last character removed (`@nick:` or `@nick,`). Display names are
    /// matched before account names.
    pub fn resolve_user_by_token(&self, token: &str) -> Option<UserRecord> {
        let token = token.strip_prefix('@').unwrap_or(token);
        if token.is_empty() {
            return None;
        }
        let inner = self.lock();
        let find = |candidate: &str| {
            inner
                .discord_users
                .values()
                .find(|u| u.display_name == candidate)
                .or_else(|| inner.discord_users.values().find(|u| u.name == candidate))
                .cloned()
        };
        find(token).or_else(|| {
            let mut chars = token.chars();
            chars.next_back();
            let trimmed = chars.as_str();
            (!trimmed.is_empty()).then(|| find(trimmed)).flatten()
        })
    }

    pub fn set_discord_topic(&self, channel_id: u64, topic: Option<String>) {
        let mut inner = self.lock();
        match topic.filter(|t| !t.is_empty()) {
            Some(t) => {
                inner.discord_topics.insert(channel_id, t);
            }
            None => {
                inner.discord_topics.remove(&channel_id);
            }
        }
    }

    pub fn discord_topic(&self, channel_id: u64) -> Option<String> {
        self.lock().discord_topics.get(&channel_id).cloned()
    }

    // ---------------------------------------------------------------------
    // Spam guard
    // ---------------------------------------------------------------------

    pub fn guard_allows(&self, channel: &str, category: GuardCategory, value: &str) -> bool {
        self.guard_allows_at(channel, category, value, Instant::now())
    }

    pub fn guard_allows_at(
        &self,
        channel: &str,
        category: GuardCategory,
        value: &str,
        now: Instant,
    ) -> bool {
        self.lock().guard.allows(channel, category, value, now)
    }

    pub fn guard_record(&self, channel: &str, category: GuardCategory, value: &str) {
        self.lock()
            .guard
            .record(channel, category, value, Instant::now());
    }
}
