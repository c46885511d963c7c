//! Error types for the Premise socket transport

use thiserror::Error;

/// Errors that can occur on the subscription socket
#[derive(Debug, Error)]
pub enum SocketError {
    /// Could not open the TCP connection
    #[error("Failed to connect to {host}:{port}: {source}")]
    Connect {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    /// Connection attempt did not complete in time
    #[error("Timed out connecting to {host}:{port}")]
    ConnectTimeout { host: String, port: u16 },

    /// TLS handshake or configuration failure
    #[error("TLS error: {0}")]
    Tls(#[from] tokio_native_tls::native_tls::Error),

    /// Read or write failed on an open connection
    #[error("Socket I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Operation attempted before `connect` or after `dispose`
    #[error("Socket is not connected")]
    NotConnected,

    /// The peer closed the stream in the middle of a block read
    #[error("Socket closed by peer after {received} of {expected} bytes")]
    Closed { expected: usize, received: usize },
}

/// Result type for socket operations
pub type Result<T> = std::result::Result<T, SocketError>;
