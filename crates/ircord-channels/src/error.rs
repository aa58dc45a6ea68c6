use thiserror::Error;

/// Errors that can occur within either network adapter.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The underlying transport could not be established.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A message could not be delivered to the remote endpoint.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// The adapter is not connected right now.
    #[error("Not connected: {0}")]
    NotConnected(String),

    /// The request does not apply to this network.
    #[error("Unsupported request: {0}")]
    Unsupported(String),

    /// An operation exceeded its allowed time budget.
    #[error("Operation timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// The adapter configuration is invalid or missing.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}
