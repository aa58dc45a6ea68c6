use thiserror::Error;

#[derive(Debug, Error)]
pub enum IrcordError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Localization error: {0}")]
    Locale(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl IrcordError {
    /// Short error code used in log lines.
    pub fn code(&self) -> &'static str {
        match self {
            IrcordError::Config(_) => "CONFIG_ERROR",
            IrcordError::Locale(_) => "LOCALE_ERROR",
            IrcordError::Serialization(_) => "SERIALIZATION_ERROR",
            IrcordError::Io(_) => "IO_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, IrcordError>;
