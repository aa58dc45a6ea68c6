//! `ircord-irc`: IRC client adapter.
//!
//! | Module      | Role |
//! |-------------|------|
//! | `codec`     | CRLF line framing over the TCP stream |
//! | `message`   | Line parsing and command rendering |
//! | `session`   | Per-connection protocol state: registration, own nick, replies |
//! | `adapter`   | Connection loop and the [`IrcHandle`] the bridge talks to |

pub mod adapter;
pub mod codec;
pub mod error;
pub mod message;
pub mod session;

pub use adapter::{IrcAdapter, IrcHandle};
pub use codec::IrcLineCodec;
pub use error::{IrcError, Result};
pub use message::{IrcMessage, Prefix};
pub use session::{alternate_nick, Session};
