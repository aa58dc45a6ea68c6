//! `ircord-relay`: the orchestrator that ties both adapters together.
//!
//! Adapters push [`BridgeEvent`](ircord_channels::BridgeEvent)s into one
//! channel; [`Bridge::run`] drains it, keeps the [`StateCache`](ircord_state::StateCache)
//! current, relays messages to the peer network, dispatches chat commands and
//! drives reconnects and shutdown. Every outbound post goes through the
//! per-network [`Outbox`] and the shared scheduler.

pub mod bridge;
pub mod commands;
pub mod compose;
pub mod context;
pub mod error;
pub mod market;
pub mod outbox;
pub mod preview;

mod discord_events;
mod irc_events;
mod lifecycle;

pub use bridge::Bridge;
pub use commands::Command;
pub use context::BridgeContext;
pub use error::{RelayError, Result};
pub use outbox::Outbox;
