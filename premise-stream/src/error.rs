//! Error types for the premise-stream crate.

use premise_socket::SocketError;

/// Errors that can occur in the subscription engine and one-shot calls.
///
/// Values that fail to coerce, duplicate subscriptions and pushes for
/// unknown ids are not errors and never appear here.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The subscription socket failed to connect, read or write
    #[error("Transport error: {0}")]
    Transport(#[from] SocketError),

    /// The server answered with a non-2xx status or a malformed frame
    #[error("Protocol error ({status}): {message}")]
    Protocol {
        /// Three digit status code, empty for framing errors
        status: String,
        /// Server supplied reason or a description of the framing problem
        message: String,
    },

    /// A one-shot HTTP get, set or invoke failed
    #[error("Communication error: {0}")]
    Communication(#[from] reqwest::Error),

    /// A location or command could not be turned into a request URL
    #[error("Invalid location: {0}")]
    InvalidLocation(String),

    /// The operation needs a live subscription socket
    #[error("Not connected to the server")]
    NotConnected,

    /// Invalid configuration provided
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ServerError {
    /// True for failures that tear the connection down
    ///
    /// Callers recover from these by starting the server again.
    pub fn requires_reconnect(&self) -> bool {
        matches!(self, ServerError::Transport(_) | ServerError::Protocol { .. })
    }

    pub(crate) fn protocol(status: impl Into<String>, message: impl Into<String>) -> Self {
        ServerError::Protocol {
            status: status.into(),
            message: message.into(),
        }
    }
}

/// Convenience type alias for Results using ServerError.
pub type Result<T> = std::result::Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_error_display() {
        let error = ServerError::protocol("401", "Unauthorized");
        assert_eq!(error.to_string(), "Protocol error (401): Unauthorized");

        let error = ServerError::Transport(SocketError::NotConnected);
        assert_eq!(error.to_string(), "Transport error: Socket is not connected");

        let error = ServerError::InvalidLocation("sys://".to_string());
        assert_eq!(error.to_string(), "Invalid location: sys://");

        let error = ServerError::Configuration("Port must be greater than 0".to_string());
        assert_eq!(
            error.to_string(),
            "Configuration error: Port must be greater than 0"
        );
    }

    #[test]
    fn test_requires_reconnect() {
        assert!(ServerError::Transport(SocketError::NotConnected).requires_reconnect());
        assert!(ServerError::protocol("500", "Internal Server Error").requires_reconnect());
        assert!(!ServerError::NotConnected.requires_reconnect());
        assert!(!ServerError::InvalidLocation(String::new()).requires_reconnect());
        assert!(!ServerError::Configuration(String::new()).requires_reconnect());
    }
}
