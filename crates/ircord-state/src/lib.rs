//! In-memory view of both networks: who is on which IRC channel, which
//! Discord users exist and their presence, the configured channel links and
//! the spam guard that throttles repeated topic/names announcements.

pub mod cache;
pub mod guard;
pub mod links;

pub use cache::{parse_names, StateCache};
pub use guard::{GuardCategory, SpamGuard};
pub use links::LinkTable;
