pub mod channel;
pub mod error;
pub mod events;
pub mod manager;
pub mod types;

pub use channel::Channel;
pub use error::ChannelError;
pub use events::{
    BridgeEvent, DiscordChannelInfo, DiscordEvent, DiscordMessage, IrcEvent, QuotedMessage,
};
pub use manager::{Peers, ReconnectTracker, RetryDecision};
pub use types::{ChannelStatus, ControlRequest, MessageKind, OutboundMessage, PostIdentity};
