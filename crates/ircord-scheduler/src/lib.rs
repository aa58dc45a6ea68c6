//! `ircord-scheduler`: named one-shot timers driven by a polling loop.
//!
//! # Overview
//!
//! Every deferred action in the bridge (rate-limited posts, staggered joins,
//! reconnect attempts, link previews, presence rotation) is a future stored
//! under a unique name in the [`Scheduler`]. The [`Scheduler::run`] loop wakes
//! every 100 ms, removes each timer whose deadline has passed and awaits its
//! job. Jobs run one after another on the scheduler task, in deadline order,
//! ties broken by insertion order.
//!
//! | Operation  | Behaviour                                                   |
//! |------------|-------------------------------------------------------------|
//! | `schedule` | Add a timer; empty name gets a generated `ID#n` name        |
//! | `cancel`   | Remove a pending timer by name                              |
//! | `exists`   | Whether a timer with that name is still pending             |
//! | `run_due`  | Fire every timer due at a given instant (used by tests too) |

pub mod engine;
pub mod error;

pub use engine::{Job, Scheduler};
pub use error::{Result, SchedulerError};
