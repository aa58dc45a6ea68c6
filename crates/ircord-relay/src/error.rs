use thiserror::Error;

/// Errors raised by the orchestrator's side services.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected response: {0}")]
    Parse(String),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] ircord_scheduler::SchedulerError),

    #[error("Core error: {0}")]
    Core(#[from] ircord_core::IrcordError),
}

pub type Result<T> = std::result::Result<T, RelayError>;
