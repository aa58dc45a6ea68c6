use std::time::{Duration, Instant};

/// Per-network post pacing.
///
/// Each post is assigned the earliest slot that is at least `min_interval`
/// after the previous post's slot. A post after a quiet period goes out
/// immediately; a burst turns into a queue spaced `min_interval` apart, in
/// submission order.
#[derive(Debug, Clone)]
pub struct Outbox {
    min_interval: Duration,
    next_free: Option<Instant>,
}

impl Outbox {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_free: None,
        }
    }

    /// Reserve a slot for a post submitted at `now`; returns how long to wait.
    pub fn plan(&mut self, now: Instant) -> Duration {
        let slot = match self.next_free {
            Some(free) if free > now => free,
            _ => now,
        };
        self.next_free = Some(slot + self.min_interval);
        slot - now
    }

    /// How long until the last reserved post goes out.
    pub fn backlog(&self, now: Instant) -> Duration {
        self.next_free
            .map(|free| free.saturating_duration_since(now).saturating_sub(self.min_interval))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_post_goes_out_immediately() {
        let mut o = Outbox::new(Duration::from_secs(2));
        let t0 = Instant::now();
        assert_eq!(o.plan(t0), Duration::ZERO);
        assert_eq!(o.plan(t0 + Duration::from_secs(5)), Duration::ZERO);
    }

    #[test]
    fn burst_is_spaced_cumulatively() {
        let mut o = Outbox::new(Duration::from_secs(2));
        let t0 = Instant::now();
        assert_eq!(o.plan(t0), Duration::ZERO);
        assert_eq!(o.plan(t0 + Duration::from_millis(100)), Duration::from_millis(1900));
        assert_eq!(o.plan(t0 + Duration::from_millis(200)), Duration::from_millis(3800));
        // Still behind the queue: waits for the slot after the last one.
        assert_eq!(o.plan(t0 + Duration::from_millis(2500)), Duration::from_millis(3500));
    }

    #[test]
    fn backlog_reports_last_slot() {
        let mut o = Outbox::new(Duration::from_secs(2));
        let t0 = Instant::now();
        assert_eq!(o.backlog(t0), Duration::ZERO);
        o.plan(t0);
        o.plan(t0);
        o.plan(t0);
        assert_eq!(o.backlog(t0), Duration::from_secs(4));
    }
}
