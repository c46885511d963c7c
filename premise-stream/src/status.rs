//! Observable connection status
//!
//! The engine publishes a fresh [`ServerStatus`] snapshot through a
//! `tokio::sync::watch` channel whenever any field changes. UI layers watch
//! it instead of polling individual flags.

/// Lifecycle of the subscription socket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    /// Opening the socket
    Connecting,
    /// Socket open, waiting for the canary answer
    AwaitingCanary,
    /// Canary answered; subscriptions are live
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::AwaitingCanary => "awaiting canary",
            ConnectionState::Connected => "connected",
        };
        f.write_str(name)
    }
}

/// Snapshot of connection state and last-error diagnostics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerStatus {
    pub state: ConnectionState,

    /// True only after the canary has been answered
    pub connected: bool,

    /// Set when the last connection ended on a transport or protocol failure
    pub error: bool,

    /// Fast framing is in use on the current connection
    pub fast_mode: bool,

    /// Three digit code from the last status line
    pub last_status_code: String,

    /// Reason phrase from the last status line
    pub last_response_phrase: String,

    /// Last error description (server `Error:` header or local failure)
    pub last_error: String,

    /// `Connection:` header of the last error response
    pub last_connection: String,

    /// `Content-Type:` header of the last error response
    pub last_error_content_type: String,

    /// Body of the last error response, or the local failure message
    pub last_error_content: String,
}

impl ServerStatus {
    pub(crate) fn set_state(&mut self, state: ConnectionState) {
        self.state = state;
        self.connected = state == ConnectionState::Connected;
    }

    pub(crate) fn clear_errors(&mut self) {
        self.error = false;
        self.last_error.clear();
        self.last_error_content.clear();
    }

    pub(crate) fn record_failure(&mut self, kind: &str, message: &str) {
        self.error = true;
        self.last_error = kind.to_string();
        self.last_error_content = message.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connected_follows_state() {
        let mut status = ServerStatus::default();
        assert!(!status.connected);

        status.set_state(ConnectionState::AwaitingCanary);
        assert!(!status.connected);

        status.set_state(ConnectionState::Connected);
        assert!(status.connected);

        status.set_state(ConnectionState::Disconnected);
        assert!(!status.connected);
    }

    #[test]
    fn test_failure_and_clear() {
        let mut status = ServerStatus::default();
        status.record_failure("Transport", "connection reset");
        assert!(status.error);
        assert_eq!(status.last_error_content, "connection reset");

        status.clear_errors();
        assert!(!status.error);
        assert!(status.last_error.is_empty());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ConnectionState::AwaitingCanary.to_string(), "awaiting canary");
    }
}
