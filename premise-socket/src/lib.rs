//! Private socket transport for the Premise WebClient protocol
//!
//! The subscription protocol spoken by the Premise SYSConnector runs over one
//! long-lived socket. The engine only needs five primitives from it: connect,
//! read a CRLF-terminated line, read a fixed-size block, write a string, and
//! dispose. Every platform adapter implements [`PremiseSocket`] and nothing
//! else; retries and reconnects are the engine's job.
//!
//! Methods take `&self` so the engine's read loop and its writers can share
//! one `Arc<dyn PremiseSocket>`. Implementations are expected to guard their
//! read side and write side independently, so a read blocked on the network
//! never stalls an outbound request.

mod error;
mod tcp;

pub use error::{Result, SocketError};
pub use tcp::TcpPremiseSocket;

use async_trait::async_trait;

/// A bidirectional byte stream carrying the subscription protocol
///
/// # Example
///
/// ```rust,ignore
/// use premise_socket::{PremiseSocket, TcpPremiseSocket};
///
/// let socket = TcpPremiseSocket::new();
/// socket.connect("home", 86, false, "user", "secret").await?;
/// socket.write_string("POST /sys/Home?f??Name HTTP/1.1\r\n\r\n").await?;
/// while let Some(line) = socket.read_line().await? {
///     println!("{line}");
/// }
/// socket.dispose().await;
/// ```
#[async_trait]
pub trait PremiseSocket: Send + Sync {
    /// Open the transport.
    ///
    /// Credentials are passed through for adapters whose native API performs
    /// authentication itself; the TCP adapter ignores them because the
    /// engine sends HTTP Basic credentials in each request.
    async fn connect(
        &self,
        host: &str,
        port: u16,
        ssl: bool,
        username: &str,
        password: &str,
    ) -> Result<()>;

    /// Read the next line without its CRLF terminator.
    ///
    /// Returns `Ok(None)` once the peer has closed the stream.
    async fn read_line(&self) -> Result<Option<String>>;

    /// Read exactly `len` bytes, buffering across underlying reads.
    async fn read_block(&self, len: usize) -> Result<String>;

    /// Write and flush `data`, returning whether it was sent.
    async fn write_string(&self, data: &str) -> Result<bool>;

    /// Release the underlying transport. Safe to call more than once.
    async fn dispose(&self);
}
