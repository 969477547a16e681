//! Error types for the IDE messaging link

use thiserror::Error;

/// Result type for link operations
pub type Result<T> = std::result::Result<T, LinkError>;

/// Link error taxonomy
///
/// None of these are fatal to a session: decode and unmatched-response errors
/// are logged and the connection continues; handshake and transport errors
/// abort the current connection attempt only.
#[derive(Debug, Error)]
pub enum LinkError {
    /// Malformed kind/status/body-count line in the framed stream
    #[error("Decode error: {0}")]
    Decode(String),

    /// Timeout, malformed peer handshake, or incompatible protocol version
    #[error("Handshake error: {0}")]
    Handshake(String),

    /// Connect failure, write failure, or unexpected stream closure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Discovery file missing lines or carrying a bad port
    #[error("Metadata error: {0}")]
    Metadata(String),

    /// File watcher setup or delivery failure
    #[error("Watch error: {0}")]
    Watch(String),

    /// Response arrived with no pending request for its id
    #[error("Unmatched response: {0}")]
    UnmatchedResponse(String),
}

impl From<std::io::Error> for LinkError {
    fn from(err: std::io::Error) -> Self {
        LinkError::Transport(err.to_string())
    }
}
