use std::sync::Arc;

use ircord_channels::BridgeEvent;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use crate::context::BridgeContext;
use crate::{discord_events, irc_events, lifecycle};

/// The relay orchestrator.
///
/// Owns no protocol state itself: every event is applied to the shared
/// [`BridgeContext`] in arrival order, one at a time.
pub struct Bridge {
    ctx: Arc<BridgeContext>,
}

impl Bridge {
    pub fn new(ctx: Arc<BridgeContext>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &Arc<BridgeContext> {
        &self.ctx
    }

    /// Apply one adapter event.
    pub async fn handle(&self, event: BridgeEvent) {
        match event {
            BridgeEvent::Irc(ev) => irc_events::handle(&self.ctx, ev).await,
            BridgeEvent::Discord(ev) => discord_events::handle(&self.ctx, ev).await,
            BridgeEvent::Shutdown { reason } => lifecycle::begin_shutdown(&self.ctx, &reason),
        }
    }

    /// Drain `events` until shutdown is signalled or every sender is gone.
    pub async fn run(self, mut events: mpsc::Receiver<BridgeEvent>, mut shutdown: watch::Receiver<bool>) {
        info!(links = self.ctx.state.links().len(), "bridge running");
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => {
                        debug!(?event, "bridge event");
                        self.handle(event).await;
                    }
                    None => {
                        info!("event channel closed");
                        break;
                    }
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("bridge stopped");
    }
}
