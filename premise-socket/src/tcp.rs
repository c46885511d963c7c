//! tokio TCP (and TLS) adapter for [`PremiseSocket`]

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{
    self, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf,
    WriteHalf,
};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use crate::error::{Result, SocketError};
use crate::PremiseSocket;

/// Any duplex byte stream the adapter can drive
trait Stream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Stream for T {}

type BoxedStream = Box<dyn Stream>;

/// Socket adapter over a tokio `TcpStream`, optionally wrapped in TLS
///
/// The stream is split on connect; the read half sits behind its own lock
/// (buffered for line reads) and the write half behind another, so the
/// engine's read loop and its request writers never wait on each other.
pub struct TcpPremiseSocket {
    reader: Mutex<Option<BufReader<ReadHalf<BoxedStream>>>>,
    writer: Mutex<Option<WriteHalf<BoxedStream>>>,
    connect_timeout: Duration,
}

impl TcpPremiseSocket {
    /// Create an unconnected socket with a 10 second connect timeout
    pub fn new() -> Self {
        Self::with_connect_timeout(Duration::from_secs(10))
    }

    /// Create an unconnected socket with a custom connect timeout
    pub fn with_connect_timeout(connect_timeout: Duration) -> Self {
        Self {
            reader: Mutex::new(None),
            writer: Mutex::new(None),
            connect_timeout,
        }
    }

    /// Wrap an already-open stream.
    ///
    /// `connect` becomes a no-op for sockets built this way. Used for
    /// in-process transports such as `tokio::io::duplex`.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let socket = Self::new();
        let (read_half, write_half) = io::split(Box::new(stream) as BoxedStream);
        socket.attach(read_half, write_half);
        socket
    }

    fn attach(&self, read_half: ReadHalf<BoxedStream>, write_half: WriteHalf<BoxedStream>) {
        // Both locks are uncontended while attaching; try_lock avoids an await.
        if let Ok(mut reader) = self.reader.try_lock() {
            *reader = Some(BufReader::new(read_half));
        }
        if let Ok(mut writer) = self.writer.try_lock() {
            *writer = Some(write_half);
        }
    }

    async fn open(&self, host: &str, port: u16, ssl: bool) -> Result<BoxedStream> {
        let connect = TcpStream::connect((host, port));
        let tcp = tokio::time::timeout(self.connect_timeout, connect)
            .await
            .map_err(|_| SocketError::ConnectTimeout {
                host: host.to_string(),
                port,
            })?
            .map_err(|source| SocketError::Connect {
                host: host.to_string(),
                port,
                source,
            })?;
        tcp.set_nodelay(true)?;

        if !ssl {
            return Ok(Box::new(tcp));
        }

        let connector = tokio_native_tls::native_tls::TlsConnector::new()?;
        let connector = tokio_native_tls::TlsConnector::from(connector);
        let tls = connector.connect(host, tcp).await?;
        Ok(Box::new(tls))
    }
}

impl Default for TcpPremiseSocket {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TcpPremiseSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpPremiseSocket")
            .field("connect_timeout", &self.connect_timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl PremiseSocket for TcpPremiseSocket {
    async fn connect(
        &self,
        host: &str,
        port: u16,
        ssl: bool,
        _username: &str,
        _password: &str,
    ) -> Result<()> {
        if self.writer.lock().await.is_some() {
            tracing::debug!("Socket already attached, skipping connect");
            return Ok(());
        }

        tracing::debug!("Connecting to {}:{} (ssl: {})", host, port, ssl);
        let stream = self.open(host, port, ssl).await?;
        let (read_half, write_half) = io::split(stream);
        *self.reader.lock().await = Some(BufReader::new(read_half));
        *self.writer.lock().await = Some(write_half);
        tracing::debug!("Connected to {}:{}", host, port);
        Ok(())
    }

    async fn read_line(&self) -> Result<Option<String>> {
        let mut guard = self.reader.lock().await;
        let reader = guard.as_mut().ok_or(SocketError::NotConnected)?;

        let mut buf = Vec::new();
        let read = reader.read_until(b'\n', &mut buf).await?;
        if read == 0 {
            return Ok(None);
        }

        if buf.last() == Some(&b'\n') {
            buf.pop();
        }
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
        Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
    }

    async fn read_block(&self, len: usize) -> Result<String> {
        let mut guard = self.reader.lock().await;
        let reader = guard.as_mut().ok_or(SocketError::NotConnected)?;

        // The buffer grows with the bytes that actually arrive
        let mut buf = Vec::new();
        let received = reader.take(len as u64).read_to_end(&mut buf).await?;
        if received < len {
            return Err(SocketError::Closed {
                expected: len,
                received,
            });
        }
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    async fn write_string(&self, data: &str) -> Result<bool> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(SocketError::NotConnected)?;
        writer.write_all(data.as_bytes()).await?;
        writer.flush().await?;
        Ok(true)
    }

    async fn dispose(&self) {
        if let Some(mut writer) = self.writer.lock().await.take() {
            if let Err(e) = writer.shutdown().await {
                tracing::debug!("Socket shutdown failed: {}", e);
            }
        }
        self.reader.lock().await.take();
    }
}
