use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Kind of repeated announcement the guard throttles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GuardCategory {
    Topic,
    Names,
}

#[derive(Debug, Clone)]
struct Seen {
    value: String,
    at: Instant,
}

/// Suppresses repeats of the same announcement per (channel, category).
///
/// An announcement passes when nothing was announced before, when the value
/// differs from the last one, or when the last one is older than the window.
#[derive(Debug, Clone)]
pub struct SpamGuard {
    window: Duration,
    seen: HashMap<(String, GuardCategory), Seen>,
}

impl SpamGuard {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            seen: HashMap::new(),
        }
    }

    /// Check and record an announcement.
    pub fn allows(
        &mut self,
        channel: &str,
        category: GuardCategory,
        value: &str,
        now: Instant,
    ) -> bool {
        let key = (channel.to_lowercase(), category);
        let pass = match self.seen.get(&key) {
            None => true,
            Some(prev) => prev.value != value || now.duration_since(prev.at) >= self.window,
        };
        if pass {
            self.seen.insert(
                key,
                Seen {
                    value: value.to_string(),
                    at: now,
                },
            );
        }
        pass
    }

    /// Record an announcement that bypassed the check (an explicit query).
    pub fn record(&mut self, channel: &str, category: GuardCategory, value: &str, now: Instant) {
        self.seen.insert(
            (channel.to_lowercase(), category),
            Seen {
                value: value.to_string(),
                at: now,
            },
        );
    }
}
