use async_trait::async_trait;
use ircord_core::Network;

use crate::{
    error::ChannelError,
    types::{ChannelStatus, ControlRequest, OutboundMessage},
};

/// Common interface implemented by both network adapters.
///
/// The orchestrator only ever talks to a network through this trait; the
/// adapter owns its connection and reports inbound traffic as
/// [`BridgeEvent`](crate::events::BridgeEvent)s on a channel.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Which network this adapter speaks to.
    fn network(&self) -> Network;

    /// Deliver a single outbound message.
    ///
    /// Long content is split by the adapter to fit the network's limits.
    async fn send(&self, msg: &OutboundMessage) -> Result<(), ChannelError>;

    /// Ask the adapter to perform a protocol action (join, query, presence, ...).
    async fn request(&self, req: ControlRequest) -> Result<(), ChannelError>;

    /// Return the current runtime status without blocking.
    fn status(&self) -> ChannelStatus;

    fn is_connected(&self) -> bool {
        matches!(self.status(), ChannelStatus::Connected)
    }
}
