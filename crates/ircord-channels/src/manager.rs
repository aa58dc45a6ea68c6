use std::sync::Arc;
use std::time::Duration;

use ircord_core::Network;
use tracing::{info, warn};

use crate::{channel::Channel, types::ChannelStatus, types::ControlRequest};

/// The two adapters the bridge relays between.
#[derive(Clone)]
pub struct Peers {
    irc: Arc<dyn Channel>,
    discord: Arc<dyn Channel>,
}

impl Peers {
    pub fn new(irc: Arc<dyn Channel>, discord: Arc<dyn Channel>) -> Self {
        Self { irc, discord }
    }

    pub fn get(&self, network: Network) -> Arc<dyn Channel> {
        match network {
            Network::Irc => Arc::clone(&self.irc),
            Network::Discord => Arc::clone(&self.discord),
        }
    }

    pub fn irc(&self) -> &Arc<dyn Channel> {
        &self.irc
    }

    pub fn discord(&self) -> &Arc<dyn Channel> {
        &self.discord
    }

    /// Current status of both adapters, IRC first.
    pub fn statuses(&self) -> Vec<(Network, ChannelStatus)> {
        vec![
            (Network::Irc, self.irc.status()),
            (Network::Discord, self.discord.status()),
        ]
    }

    /// Send `Quit` to both adapters. Errors are logged and do not stop the other.
    pub async fn quit_all(&self, message: &str) {
        for (network, channel) in [(Network::Irc, &self.irc), (Network::Discord, &self.discord)] {
            info!(%network, "disconnecting adapter");
            if let Err(e) = channel.request(ControlRequest::Quit(message.to_string())).await {
                warn!(%network, error = %e, "error while disconnecting adapter");
            }
        }
    }
}

/// What to do after a connection loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry { attempt: u32, delay: Duration },
    GiveUp { attempts: u32 },
}

/// Counts consecutive failed connections of one adapter.
///
/// Fixed delay between attempts; the counter resets on a successful connect.
#[derive(Debug, Clone)]
pub struct ReconnectTracker {
    attempts: u32,
    max_attempts: u32,
    delay: Duration,
}

impl ReconnectTracker {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: 0,
            max_attempts,
            delay,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Register a failure and decide whether to try again.
    pub fn record_failure(&mut self) -> RetryDecision {
        self.attempts += 1;
        if self.attempts >= self.max_attempts {
            RetryDecision::GiveUp {
                attempts: self.attempts,
            }
        } else {
            RetryDecision::Retry {
                attempt: self.attempts,
                delay: self.delay,
            }
        }
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gives_up_at_max_attempts() {
        let mut t = ReconnectTracker::new(3, Duration::from_secs(5));
        assert_eq!(
            t.record_failure(),
            RetryDecision::Retry {
                attempt: 1,
                delay: Duration::from_secs(5)
            }
        );
        assert!(matches!(t.record_failure(), RetryDecision::Retry { attempt: 2, .. }));
        assert_eq!(t.record_failure(), RetryDecision::GiveUp { attempts: 3 });
    }

    #[test]
    fn reset_restarts_the_count() {
        let mut t = ReconnectTracker::new(2, Duration::from_secs(5));
        t.record_failure();
        t.reset();
        assert_eq!(t.attempts(), 0);
        assert!(matches!(t.record_failure(), RetryDecision::Retry { attempt: 1, .. }));
    }
}
