use thiserror::Error;

/// Errors that can occur within the scheduler.
#[derive(Debug, Error, PartialEq)]
pub enum SchedulerError {
    /// A pending timer already uses this name.
    #[error("Timer already exists: {name}")]
    DuplicateTimer { name: String },

    /// The delay is negative, NaN or too large to represent.
    #[error("Invalid delay: {0}")]
    InvalidDelay(f64),

    /// No pending timer has this name.
    #[error("Timer not found: {name}")]
    UnknownTimer { name: String },
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
