//! Error types for the Drinkingames client.

use thiserror::Error;

/// Errors that can occur when using the Drinkingames client.
#[derive(Debug, Error)]
pub enum PartyError {
    /// Failed to send a frame through the transport.
    #[error("transport send error: {0}")]
    TransportSend(String),

    /// Failed to receive a frame from the transport.
    #[error("transport receive error: {0}")]
    TransportReceive(String),

    /// The transport connection was closed unexpectedly.
    #[error("transport connection closed")]
    TransportClosed,

    /// Failed to serialize or deserialize a protocol frame.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Attempted an action that requires a live connection, but none exists.
    #[error("not connected to server")]
    NotConnected,

    /// The server acknowledged an action with an error.
    #[error("{message}")]
    Action {
        /// Error message carried in the acknowledgment.
        message: String,
    },

    /// An operation timed out.
    #[error("operation timed out")]
    Timeout,

    /// The connect retry budget was exhausted without reaching the server.
    #[error("failed to connect to server after {attempts} attempt(s)")]
    ConnectFailed {
        /// Number of attempts made before giving up.
        attempts: u32,
    },

    /// Input was rejected locally before anything was transmitted.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The session store could not read or write the session record.
    #[error("session storage error: {0}")]
    Storage(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PartyError {
    /// Returns the server-supplied message when this is an action rejection.
    pub fn action_message(&self) -> Option<&str> {
        match self {
            Self::Action { message } => Some(message),
            _ => None,
        }
    }
}

/// A specialized [`Result`] type for Drinkingames client operations.
pub type Result<T> = std::result::Result<T, PartyError>;
