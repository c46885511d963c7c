//! Read loop for the subscription socket
//!
//! One task per connection. Each frame is a status line, optional headers
//! and, after `Content-Length:` and a blank line, a fixed-size payload.
//! The payload is either a protocol signal or a value for the subscription
//! named by the last `Target-Element:`.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::codec::{self, ErrorResponse, FrameLine, Payload};
use crate::error::{Result, ServerError};
use crate::server::{Connection, Inner};
use crate::status::ConnectionState;

impl Inner {
    pub(crate) async fn run_read_loop(self: Arc<Self>, connection: Connection) {
        tracing::debug!("Read loop started (connection {})", connection.generation);

        let result = tokio::select! {
            biased;
            _ = connection.cancel.cancelled() => Ok(()),
            result = self.read_frames(&connection) => result,
        };

        match result {
            Ok(()) if connection.cancel.is_cancelled() => {
                tracing::debug!("Read loop cancelled");
            }
            Ok(()) => {
                tracing::info!("Subscription socket closed by server");
                self.teardown(connection.generation).await;
            }
            Err(e) => {
                tracing::warn!("Subscription read loop failed: {}", e);
                self.fail(&connection, &e).await;
            }
        }
    }

    async fn read_frames(&self, connection: &Connection) -> Result<()> {
        let socket = &connection.socket;
        let mut target = 0u32;

        loop {
            let Some(line) = socket.read_line().await? else {
                return Ok(());
            };
            tracing::trace!("<< {}", line);

            match FrameLine::parse(&line) {
                FrameLine::Status { code, phrase } => {
                    self.update_status(|s| {
                        s.last_status_code = code.clone();
                        s.last_response_phrase = phrase.clone();
                    });
                    if !codec::is_success(&code) {
                        return Err(self.read_error_response(connection, code, phrase).await);
                    }
                }
                FrameLine::TargetElement(id) => target = id,
                FrameLine::OversizedContent(len) => {
                    return Err(ServerError::protocol(
                        "",
                        format!("Content-Length {} exceeds {} bytes", len, codec::MAX_CONTENT_LENGTH),
                    ));
                }
                FrameLine::ContentLength(len) => {
                    let Some(separator) = socket.read_line().await? else {
                        return Ok(());
                    };
                    if !separator.is_empty() {
                        return Err(ServerError::protocol(
                            "",
                            format!("expected blank line after Content-Length, got {:?}", separator),
                        ));
                    }

                    let payload = socket.read_block(len).await?;
                    tracing::trace!("<< payload {:?} (target {})", payload, target);
                    self.handle_payload(connection, target, &payload).await;
                    target = 0;
                }
                FrameLine::Other => {}
            }
        }
    }

    /// Collect the diagnostic headers and body of a non-2xx response
    async fn read_error_response(&self, connection: &Connection, code: String, phrase: String) -> ServerError {
        let socket = &connection.socket;
        let mut response = ErrorResponse::default();
        let mut content = String::new();

        loop {
            match socket.read_line().await {
                Ok(Some(line)) => {
                    tracing::trace!("<< {}", line);
                    if response.apply(&line) {
                        if response.oversized {
                            tracing::debug!("Error body over {} bytes, not read", codec::MAX_CONTENT_LENGTH);
                        } else if response.content_length > 0 {
                            match socket.read_block(response.content_length).await {
                                Ok(body) => content = body,
                                Err(e) => tracing::debug!("Error body unreadable: {}", e),
                            }
                        }
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!("Error response truncated: {}", e);
                    break;
                }
            }
        }

        let message = response.error.clone().unwrap_or_else(|| phrase.clone());
        tracing::warn!("Server returned {} {}: {}", code, phrase, message);
        self.update_status(|s| {
            s.error = true;
            s.last_error = message.clone();
            s.last_connection = response.connection.clone().unwrap_or_default();
            s.last_error_content_type = response.content_type.clone().unwrap_or_default();
            s.last_error_content = content.clone();
        });
        ServerError::Protocol { status: code, message }
    }

    async fn handle_payload(&self, connection: &Connection, target: u32, payload: &str) {
        match Payload::classify(target, payload) {
            Payload::Canary => self.on_canary(connection).await,
            Payload::Pause => {
                tracing::info!("Server paused the connection");
                self.subscriptions.lock().deactivate_all();
            }
            Payload::Resume => {
                tracing::info!("Server resumed the connection");
                self.resubmit_all(connection).await;
            }
            Payload::FastMode => {
                tracing::debug!("Server switched to fast mode");
                self.fast_mode_requested.store(true, Ordering::SeqCst);
                self.wire_fast.store(true, Ordering::SeqCst);
                self.update_status(|s| s.fast_mode = true);
            }
            Payload::Value { target, value } => self.dispatch(target, value),
        }
    }

    async fn on_canary(&self, connection: &Connection) {
        // subscribe() reads the state under the same lock, so each entry is
        // sent either there or in this batch.
        let commands = {
            let table = self.subscriptions.lock();
            if self.state() != ConnectionState::AwaitingCanary {
                return;
            }
            self.update_status(|s| s.set_state(ConnectionState::Connected));
            table.commands()
        };
        tracing::info!("Connected to {}:{}", self.config.host, self.config.port);

        if self.fast_mode_requested.load(Ordering::SeqCst) && self.enable_fast_mode(connection).await.is_err() {
            return;
        }
        self.submit(connection, commands).await;
    }

    fn dispatch(&self, target: u32, value: &str) {
        let entry = self
            .subscriptions
            .lock()
            .get(target)
            .map(|sub| (sub.target(), sub.property.clone()));

        match entry {
            Some((Some(object), property)) => {
                tracing::debug!("{} on {} = {:?}", property, object.location(), value);
                self.notifier.dispatch_set_member(object, &property, value);
            }
            Some((None, property)) => {
                tracing::debug!("Discarding {} for dropped object (target {})", property, target);
            }
            None => {
                tracing::debug!("Discarding push for unknown target {}", target);
            }
        }
    }
}
