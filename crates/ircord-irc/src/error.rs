use thiserror::Error;

/// Errors raised by the IRC connection.
#[derive(Debug, Error)]
pub enum IrcError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("line of {actual} bytes exceeds the {limit} byte limit")]
    LineTooLong { actual: usize, limit: usize },

    #[error("malformed line: {0}")]
    Malformed(String),
}

pub type Result<T> = std::result::Result<T, IrcError>;
