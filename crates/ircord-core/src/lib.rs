//! Shared building blocks for the ircord bridge: configuration, the common
//! error type, cross-network domain types, localization tables and the small
//! amount of runtime state that survives a restart.

pub mod config;
pub mod error;
pub mod locale;
pub mod runtime;
pub mod types;

pub use config::IrcordConfig;
pub use error::{IrcordError, Result};
pub use locale::{Localization, Word};
pub use runtime::RuntimeState;
pub use types::{ChannelLink, ChannelRef, Network, Presence, UserRecord};
