//! The subscription engine
//!
//! [`PremiseServer`] owns one subscription socket at a time. It sends
//! subscribe and unsubscribe commands on it, runs a read loop that parses
//! pushed frames, and routes each value to its subscribed object through the
//! configured [`Notifier`].
//!
//! ```text
//! Disconnected ──start──▶ Connecting ──socket open──▶ AwaitingCanary
//!       ▲                                                   │
//!       │                                          "Home" on target 0
//!       │                                                   ▼
//!       └──────── stop / read failure / error status ── Connected
//! ```
//!
//! Reconnection is up to the caller: call [`PremiseServer::start`] again.
//! Subscriptions survive in the table across reconnects and are sent again
//! once the new connection answers the canary.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use premise_socket::{PremiseSocket, TcpPremiseSocket};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::codec::{self, CANARY_COMMAND, FAST_MODE_COMMAND, FAST_MODE_VALUE};
use crate::config::ServerConfig;
use crate::error::{Result, ServerError};
use crate::http::{self, HttpClient};
use crate::notify::{DirectNotifier, Notifier, SubscriptionTarget};
use crate::status::{ConnectionState, ServerStatus};
use crate::subscription::{SubscriptionInfo, SubscriptionTable};

/// A live socket and the token that stops its read loop
#[derive(Clone)]
pub(crate) struct Connection {
    pub(crate) socket: Arc<dyn PremiseSocket>,
    pub(crate) cancel: CancellationToken,
    pub(crate) generation: u64,
}

pub(crate) struct Inner {
    pub(crate) config: ServerConfig,
    pub(crate) notifier: Arc<dyn Notifier>,
    http: HttpClient,
    pub(crate) subscriptions: Mutex<SubscriptionTable>,
    connection: Mutex<Option<Connection>>,
    /// Token of the most recent connection, kept to decide on the reconnect grace
    last_cancel: Mutex<Option<CancellationToken>>,
    status_tx: watch::Sender<ServerStatus>,
    /// Enable fast mode on every connect
    pub(crate) fast_mode_requested: AtomicBool,
    /// Fast framing is in use on the current connection
    pub(crate) wire_fast: AtomicBool,
    generation: AtomicU64,
}

/// Handle to the subscription engine
///
/// Cloning is cheap; clones share the same connection and subscription
/// table.
///
/// # Example
///
/// ```rust,ignore
/// use std::time::Duration;
/// use premise_stream::{PremiseServer, ServerConfig};
///
/// let server = PremiseServer::new(ServerConfig::for_host("premise", 86));
/// server.connect().await?;
/// server.wait_for_connection(Duration::from_secs(5)).await?;
///
/// let name = server.get_value("sys://Home", "Name").await?;
/// server.set_value("sys://Home/Kitchen/Overhead", "PowerState", "True").await?;
/// ```
#[derive(Clone)]
pub struct PremiseServer {
    inner: Arc<Inner>,
}

impl PremiseServer {
    /// Create an engine that applies pushes on the read-loop task
    pub fn new(config: ServerConfig) -> Self {
        Self::with_notifier(config, Arc::new(DirectNotifier))
    }

    /// Create an engine with a custom dispatch seam
    pub fn with_notifier(config: ServerConfig, notifier: Arc<dyn Notifier>) -> Self {
        let (status_tx, _) = watch::channel(ServerStatus::default());
        let fast_mode = config.fast_mode;
        Self {
            inner: Arc::new(Inner {
                config,
                notifier,
                http: HttpClient::new(),
                subscriptions: Mutex::new(SubscriptionTable::new()),
                connection: Mutex::new(None),
                last_cancel: Mutex::new(None),
                status_tx,
                fast_mode_requested: AtomicBool::new(fast_mode),
                wire_fast: AtomicBool::new(false),
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    // ========================================================================
    // Connection lifecycle
    // ========================================================================

    /// Open a TCP (or TLS) subscription socket and start the engine
    pub async fn connect(&self) -> Result<()> {
        self.start(Arc::new(TcpPremiseSocket::new())).await
    }

    /// Start the engine on `socket`.
    ///
    /// Stops any previous connection first. Returns once the socket is open,
    /// the read loop is running and the canary request has been sent; the
    /// connection becomes usable when the canary is answered (see
    /// [`wait_for_connection`](Self::wait_for_connection)).
    pub async fn start(&self, socket: Arc<dyn PremiseSocket>) -> Result<()> {
        let inner = &self.inner;
        inner.config.validate()?;

        self.stop().await;

        let previous = inner.last_cancel.lock().take();
        if previous.is_some_and(|token| token.is_cancelled()) {
            // The old socket may still be closing
            tokio::time::sleep(inner.config.reconnect_grace).await;
        }

        let cancel = CancellationToken::new();
        *inner.last_cancel.lock() = Some(cancel.clone());
        inner.update_status(|s| s.set_state(ConnectionState::Connecting));

        let config = &inner.config;
        tracing::info!("Connecting to {}:{} (ssl: {})", config.host, config.port, config.ssl);
        if let Err(e) = socket
            .connect(&config.host, config.port, config.ssl, &config.username, &config.password)
            .await
        {
            tracing::warn!("Failed to connect to {}:{}: {}", config.host, config.port, e);
            cancel.cancel();
            socket.dispose().await;
            let error = ServerError::from(e);
            inner.update_status(|s| {
                s.record_failure("Transport", &error.to_string());
                s.set_state(ConnectionState::Disconnected);
            });
            return Err(error);
        }

        let connection = Connection {
            socket,
            cancel,
            generation: inner.generation.fetch_add(1, Ordering::SeqCst) + 1,
        };
        inner.wire_fast.store(false, Ordering::SeqCst);
        *inner.connection.lock() = Some(connection.clone());
        inner.update_status(|s| {
            s.clear_errors();
            s.fast_mode = false;
            s.set_state(ConnectionState::AwaitingCanary);
        });

        tokio::spawn(Arc::clone(inner).run_read_loop(connection.clone()));

        match inner.send_on(&connection, CANARY_COMMAND, "", false).await {
            Ok(true) => Ok(()),
            Ok(false) => {
                inner.fail(&connection, &ServerError::NotConnected).await;
                Err(ServerError::NotConnected)
            }
            Err(e) => {
                inner.fail(&connection, &e).await;
                Err(e)
            }
        }
    }

    /// Stop the engine.
    ///
    /// Cancels the read loop, disposes the socket and marks every
    /// subscription inactive. Subscriptions stay registered and are sent
    /// again by the next [`start`](Self::start).
    pub async fn stop(&self) {
        let connection = self.inner.connection.lock().take();
        if let Some(connection) = connection {
            tracing::info!("Stopping subscriptions");
            self.inner.disconnect(connection).await;
        } else {
            self.inner.subscriptions.lock().deactivate_all();
        }
    }

    /// Wait until the canary has been answered
    ///
    /// Fails with [`ServerError::NotConnected`] if the connection drops or
    /// `timeout` elapses first.
    pub async fn wait_for_connection(&self, timeout: Duration) -> Result<()> {
        let mut rx = self.inner.status_tx.subscribe();
        let wait = rx.wait_for(|s| s.connected || s.state == ConnectionState::Disconnected);
        let connected = match tokio::time::timeout(timeout, wait).await {
            Ok(Ok(status)) => status.connected,
            _ => false,
        };
        if connected {
            Ok(())
        } else {
            Err(ServerError::NotConnected)
        }
    }

    // ========================================================================
    // Subscriptions
    // ========================================================================

    /// Subscribe `target` to pushes for `property`.
    ///
    /// Subscribing the same `(location, property)` pair again is a no-op.
    /// While the connection is not yet usable the subscription is only
    /// registered; it goes out once the canary is answered.
    pub async fn subscribe(&self, target: Arc<dyn SubscriptionTarget>, property: &str) -> Result<()> {
        let inner = &self.inner;
        let pending = {
            let mut table = inner.subscriptions.lock();
            let Some(id) = table.insert(&target, property) else {
                tracing::trace!("Already subscribed to {} on {}", property, target.location());
                return Ok(());
            };
            tracing::debug!("Subscribed {} on {} as {}", property, target.location(), id);

            if inner.status_tx.borrow().state != ConnectionState::Connected || target.location().is_empty() {
                None
            } else {
                table
                    .get(id)
                    .map(|sub| (id, sub.command()))
                    .zip(inner.connection.lock().clone())
            }
        };

        let Some(((id, command), connection)) = pending else {
            return Ok(());
        };
        let fast = inner.wire_fast.load(Ordering::SeqCst);
        match inner.send_on(&connection, &command, "", fast).await {
            Ok(sent) => {
                inner.subscriptions.lock().set_active(id, sent);
                Ok(())
            }
            Err(e) => {
                inner.fail(&connection, &e).await;
                Err(e)
            }
        }
    }

    /// Remove the subscription for `property` on `target`, if any
    pub async fn unsubscribe(&self, target: &dyn SubscriptionTarget, property: &str) -> Result<()> {
        let inner = &self.inner;
        let pending = {
            let mut table = inner.subscriptions.lock();
            let Some(removed) = table.remove(target.location(), property) else {
                return Ok(());
            };
            tracing::debug!("Unsubscribed {} on {} ({})", property, target.location(), removed.id);

            if inner.status_tx.borrow().state != ConnectionState::Connected {
                None
            } else {
                inner.connection.lock().clone().map(|c| (removed.id, c))
            }
        };

        let Some((id, connection)) = pending else {
            return Ok(());
        };
        let fast = inner.wire_fast.load(Ordering::SeqCst);
        match inner.send_on(&connection, &codec::unsubscribe_command(id), "", fast).await {
            Ok(_) => Ok(()),
            Err(e) => {
                inner.fail(&connection, &e).await;
                Err(e)
            }
        }
    }

    pub fn subscription_count(&self) -> usize {
        self.inner.subscriptions.lock().len()
    }

    /// Snapshot of the subscription table, ordered by id
    pub fn subscriptions(&self) -> Vec<SubscriptionInfo> {
        self.inner.subscriptions.lock().snapshot()
    }

    // ========================================================================
    // Fast mode
    // ========================================================================

    /// Request fast framing.
    ///
    /// Enabling takes effect immediately on a live connection. Disabling
    /// only clears the request for future connections; a connection already
    /// in fast mode stays in fast mode until it is closed.
    pub async fn set_fast_mode(&self, enabled: bool) -> Result<()> {
        let inner = &self.inner;
        inner.fast_mode_requested.store(enabled, Ordering::SeqCst);
        if !enabled {
            tracing::debug!("Fast mode request cleared; current connection keeps its framing");
            return Ok(());
        }

        if !self.is_connected() || inner.wire_fast.load(Ordering::SeqCst) {
            return Ok(());
        }
        let Some(connection) = inner.connection.lock().clone() else {
            return Ok(());
        };
        inner.enable_fast_mode(&connection).await
    }

    /// Fast framing is in use on the current connection
    pub fn fast_mode(&self) -> bool {
        self.inner.wire_fast.load(Ordering::SeqCst)
    }

    // ========================================================================
    // Status
    // ========================================================================

    pub fn is_connected(&self) -> bool {
        self.inner.status_tx.borrow().connected
    }

    pub fn status(&self) -> ServerStatus {
        self.inner.status_tx.borrow().clone()
    }

    /// Receiver that sees every status change
    pub fn watch_status(&self) -> watch::Receiver<ServerStatus> {
        self.inner.status_tx.subscribe()
    }

    // ========================================================================
    // One-shot calls
    // ========================================================================

    /// Fetch the current value of a property
    pub async fn get_value(&self, location: &str, property: &str) -> Result<String> {
        self.inner.http.get_value(&self.inner.config, location, property).await
    }

    /// Write a property value without waiting for a response that never comes
    pub async fn set_value(&self, location: &str, property: &str, value: &str) -> Result<()> {
        self.inner
            .http
            .set_value(&self.inner.config, location, property, value)
            .await
    }

    /// Invoke a method on an object and return its result text
    pub async fn invoke_method(&self, location: &str, method: &str) -> Result<String> {
        self.inner.http.invoke_method(&self.inner.config, location, method).await
    }

    /// `sys://Home/...` as an `http(s)://host:port/sys/Home/...` URL
    pub fn url_from_sys_uri(&self, sys_uri: &str) -> String {
        http::url_from_sys_uri(&self.inner.config, sys_uri)
    }
}

impl std::fmt::Debug for PremiseServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PremiseServer")
            .field("config", &self.inner.config)
            .field("status", &*self.inner.status_tx.borrow())
            .field("subscriptions", &self.subscription_count())
            .finish()
    }
}

impl Inner {
    /// Apply `f` to the status, notifying watchers only on a real change
    pub(crate) fn update_status(&self, f: impl FnOnce(&mut ServerStatus)) {
        self.status_tx.send_if_modified(|status| {
            let before = status.clone();
            f(status);
            *status != before
        });
    }

    pub(crate) fn state(&self) -> ConnectionState {
        self.status_tx.borrow().state
    }

    /// Encode and write one request on `connection`
    pub(crate) async fn send_on(
        &self,
        connection: &Connection,
        command: &str,
        content: &str,
        fast: bool,
    ) -> Result<bool> {
        let frame = if fast {
            codec::encode_fast(command, content)
        } else {
            codec::encode_request(&self.config, command, content)?
        };
        if tracing::enabled!(tracing::Level::TRACE) {
            tracing::trace!(">> {:?}", codec::redact(&frame));
        }

        let sent = connection.socket.write_string(&frame).await?;
        if !sent {
            tracing::warn!("Socket refused request: {}", command);
        }
        Ok(sent)
    }

    /// Send the fast mode enable command in normal framing, then switch
    pub(crate) async fn enable_fast_mode(&self, connection: &Connection) -> Result<()> {
        tracing::debug!("Enabling fast mode");
        match self.send_on(connection, FAST_MODE_COMMAND, FAST_MODE_VALUE, false).await {
            Ok(_) => {
                self.wire_fast.store(true, Ordering::SeqCst);
                self.update_status(|s| s.fast_mode = true);
                Ok(())
            }
            Err(e) => {
                self.fail(connection, &e).await;
                Err(e)
            }
        }
    }

    /// Send every registered subscription, active or not
    pub(crate) async fn resubmit_all(&self, connection: &Connection) {
        let commands = self.subscriptions.lock().commands();
        self.submit(connection, commands).await;
    }

    pub(crate) async fn submit(&self, connection: &Connection, commands: Vec<(u32, String)>) {
        tracing::debug!("Submitting {} subscriptions", commands.len());

        for (id, command) in commands {
            let fast = self.wire_fast.load(Ordering::SeqCst);
            match self.send_on(connection, &command, "", fast).await {
                Ok(sent) => self.subscriptions.lock().set_active(id, sent),
                Err(e) => {
                    tracing::warn!("Failed to submit subscription {}: {}", id, e);
                    self.fail(connection, &e).await;
                    return;
                }
            }
        }
    }

    /// Record a failure and tear the connection down
    pub(crate) async fn fail(&self, connection: &Connection, error: &ServerError) {
        if connection.cancel.is_cancelled() {
            return;
        }
        // Error responses have already filled in the status diagnostics
        if !matches!(error, ServerError::Protocol { status, .. } if !status.is_empty()) {
            let kind = match error {
                ServerError::Transport(_) => "Transport",
                ServerError::NotConnected => "NotConnected",
                ServerError::Protocol { .. } => "Protocol",
                _ => "Request",
            };
            self.update_status(|s| s.record_failure(kind, &error.to_string()));
        }
        self.teardown(connection.generation).await;
    }

    /// Tear down the connection with this generation if it is still current
    pub(crate) async fn teardown(&self, generation: u64) {
        let connection = {
            let mut current = self.connection.lock();
            match current.as_ref() {
                Some(c) if c.generation == generation => current.take(),
                _ => None,
            }
        };
        if let Some(connection) = connection {
            self.disconnect(connection).await;
        }
    }

    async fn disconnect(&self, connection: Connection) {
        connection.cancel.cancel();
        connection.socket.dispose().await;
        self.wire_fast.store(false, Ordering::SeqCst);
        self.subscriptions.lock().deactivate_all();
        self.update_status(|s| {
            s.fast_mode = false;
            s.set_state(ConnectionState::Disconnected);
        });
        tracing::info!("Disconnected from {}:{}", self.config.host, self.config.port);
    }
}
