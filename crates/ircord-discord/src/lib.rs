//! `ircord-discord`: Discord gateway adapter built on serenity.

pub mod adapter;
pub mod convert;
pub mod error;
pub mod handler;
pub mod send;

pub use adapter::{DiscordAdapter, DiscordHandle};
pub use error::DiscordError;
