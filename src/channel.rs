//! Caller-side channel: connect handshake and correlated calls.
//!
//! This module implements the request/response abstraction over a
//! [`Port`], hiding handshake timing and response correlation from
//! callers.
//!
//! # Event Loop
//!
//! The channel spawns a tokio task that handles:
//!
//! - The one-shot connect handshake (readiness)
//! - Outgoing requests from the Rust API
//! - Incoming responses, routed to pending calls by [`CallId`]
//! - Destroy/teardown, failing all in-flight calls

// ============================================================================
// Imports
// ============================================================================

use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::timeout;
use tracing::{debug, error, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::CallId;
use crate::protocol::{Message, ResultPayload};
use crate::transport::{Port, PortListener, PortSender};

// ============================================================================
// Constants
// ============================================================================

/// Maximum in-flight calls before rejecting new ones.
const MAX_PENDING_CALLS: usize = 100;

// ============================================================================
// Types
// ============================================================================

/// Map of call IDs to response channels.
type PendingMap = FxHashMap<CallId, oneshot::Sender<Result<Value>>>;

/// Internal commands for the event loop.
enum ChannelCommand {
    /// Send a request; the response settles `response_tx`.
    Post {
        message: Message,
        response_tx: oneshot::Sender<Result<Value>>,
    },
    /// Remove a timed-out pending entry.
    RemovePending(CallId),
    /// Tear down the channel.
    Destroy,
}

// ============================================================================
// Channel
// ============================================================================

/// Caller-side endpoint of the port protocol.
///
/// Issues correlated requests and settles each pending call when its
/// matching response arrives, regardless of arrival order. Requests hit
/// the wire in `post_message` call order.
///
/// # Thread Safety
///
/// `Channel` is `Send + Sync` and cheap to clone; clones share the same
/// underlying port and pending map. All operations are non-blocking.
#[derive(Clone)]
pub struct Channel {
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<ChannelCommand>,
    /// Pending-call map (shared with event loop).
    pending: Arc<Mutex<PendingMap>>,
    /// Readiness signal, flipped once when the port is established.
    ready: watch::Receiver<bool>,
    /// Monotonic correlation counter. Never reset, so an ID can never
    /// collide with a stale or duplicate response for an earlier call.
    next_id: Arc<AtomicU64>,
}

impl Channel {
    /// Creates a channel that waits for the peer to connect.
    ///
    /// Spawns the event loop task internally. The channel is not usable
    /// for calls until [`connect`](Self::connect) resolves.
    #[must_use]
    pub fn new(listener: PortListener) -> Self {
        Self::spawn(PortSource::Listener(listener))
    }

    /// Creates a channel over an already-established port.
    ///
    /// [`connect`](Self::connect) resolves immediately. Used with
    /// transports that perform their own handshake, e.g. the WebSocket
    /// bridge.
    #[must_use]
    pub fn from_port(port: Port) -> Self {
        Self::spawn(PortSource::Established(port))
    }

    fn spawn(source: PortSource) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready) = watch::channel(false);
        let pending = Arc::new(Mutex::new(PendingMap::default()));

        tokio::spawn(Self::run_event_loop(
            source,
            command_rx,
            Arc::clone(&pending),
            ready_tx,
        ));

        Self {
            command_tx,
            pending,
            ready,
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Waits for the port handshake to complete.
    ///
    /// Settles once the peer end connects. Idempotent: every call (and
    /// every clone) observes the same single handshake; no new handshake
    /// is performed. If the peer never connects, this waits forever —
    /// callers needing a bound should wrap it in their own timeout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChannelDestroyed`] if the channel was destroyed
    /// before the handshake completed.
    pub async fn connect(&self) -> Result<()> {
        let mut ready = self.ready.clone();
        ready
            .wait_for(|connected| *connected)
            .await
            .map_err(|_| Error::ChannelDestroyed)?;
        Ok(())
    }

    /// Sends a request and waits for the correlated response.
    ///
    /// Allocates a fresh [`CallId`], registers the pending call, and
    /// transmits `{type, id, value}`. Concurrent calls are supported;
    /// responses may arrive in any order and are routed by ID. No
    /// timeout is imposed — see
    /// [`post_message_with_timeout`](Self::post_message_with_timeout).
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] if the handshake has not completed
    ///   (usage error, nothing is sent)
    /// - [`Error::Protocol`] if too many calls are pending
    /// - [`Error::Handler`] if the remote handler reported a failure
    /// - [`Error::ChannelDestroyed`] if the channel is torn down while
    ///   the call is in flight
    pub async fn post_message(&self, kind: &str, value: impl Serialize) -> Result<Value> {
        let (_, response_rx) = self.begin_call(kind, value)?;

        match response_rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(Error::ChannelDestroyed),
        }
    }

    /// Sends a request and waits for the response with a deadline.
    ///
    /// On expiry the pending entry is evicted, so the call's ID can no
    /// longer match a late response and the map cannot leak.
    ///
    /// # Errors
    ///
    /// Same as [`post_message`](Self::post_message), plus
    /// [`Error::RequestTimeout`] if no response arrives in time.
    pub async fn post_message_with_timeout(
        &self,
        kind: &str,
        value: impl Serialize,
        call_timeout: Duration,
    ) -> Result<Value> {
        let (call_id, response_rx) = self.begin_call(kind, value)?;

        match timeout(call_timeout, response_rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(Error::ChannelDestroyed),
            Err(_) => {
                // Timeout - evict the pending entry
                let _ = self
                    .command_tx
                    .send(ChannelCommand::RemovePending(call_id));

                Err(Error::request_timeout(
                    call_id,
                    call_timeout.as_millis() as u64,
                ))
            }
        }
    }

    /// Allocates an ID, registers the call, and hands it to the event loop.
    fn begin_call(
        &self,
        kind: &str,
        value: impl Serialize,
    ) -> Result<(CallId, oneshot::Receiver<Result<Value>>)> {
        if !*self.ready.borrow() {
            return Err(Error::NotConnected);
        }

        // Check pending call limit
        {
            let pending = self.pending.lock();
            if pending.len() >= MAX_PENDING_CALLS {
                warn!(
                    pending = pending.len(),
                    max = MAX_PENDING_CALLS,
                    "Too many pending calls"
                );
                return Err(Error::protocol(format!(
                    "Too many pending calls: {}/{}",
                    pending.len(),
                    MAX_PENDING_CALLS
                )));
            }
        }

        let value = serde_json::to_value(value)?;
        let call_id = CallId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let message = Message::request(kind, call_id, value);

        let (response_tx, response_rx) = oneshot::channel();

        self.command_tx
            .send(ChannelCommand::Post {
                message,
                response_tx,
            })
            .map_err(|_| Error::ChannelDestroyed)?;

        Ok((call_id, response_rx))
    }

    /// Returns the number of in-flight calls.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Returns `true` if the port handshake has completed.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        *self.ready.borrow()
    }

    /// Tears down the channel and releases the port.
    ///
    /// All in-flight calls settle with [`Error::ChannelDestroyed`];
    /// subsequent calls fail fast. Safe to call more than once.
    pub fn destroy(&self) {
        let _ = self.command_tx.send(ChannelCommand::Destroy);
    }

    /// Event loop that owns the port.
    async fn run_event_loop(
        source: PortSource,
        mut command_rx: mpsc::UnboundedReceiver<ChannelCommand>,
        pending: Arc<Mutex<PendingMap>>,
        ready_tx: watch::Sender<bool>,
    ) {
        // Phase 1: obtain the port. Posts cannot arrive before readiness
        // flips, but a destroy can.
        let mut port = match source {
            PortSource::Established(port) => port,
            PortSource::Listener(listener) => {
                let mut accept = pin!(listener.accept());
                loop {
                    tokio::select! {
                        accepted = &mut accept => {
                            match accepted {
                                Ok(port) => break port,
                                Err(_) => {
                                    debug!("Connector dropped before handshake");
                                    return;
                                }
                            }
                        }

                        command = command_rx.recv() => {
                            match command {
                                Some(ChannelCommand::Post { response_tx, .. }) => {
                                    let _ = response_tx.send(Err(Error::NotConnected));
                                }
                                Some(ChannelCommand::RemovePending(call_id)) => {
                                    pending.lock().remove(&call_id);
                                }
                                Some(ChannelCommand::Destroy) | None => {
                                    debug!("Channel destroyed before handshake");
                                    return;
                                }
                            }
                        }
                    }
                }
            }
        };

        let _ = ready_tx.send(true);
        debug!("Port established, channel ready");

        let sender = port.sender();

        // Phase 2: correlate traffic until teardown.
        let destroyed = loop {
            tokio::select! {
                // Incoming responses from the peer
                message = port.recv() => {
                    match message {
                        Some(message) => Self::handle_response(message, &pending),
                        None => {
                            debug!("Port closed by peer");
                            break false;
                        }
                    }
                }

                // Commands from the Rust API
                command = command_rx.recv() => {
                    match command {
                        Some(ChannelCommand::Post { message, response_tx }) => {
                            Self::handle_post(message, response_tx, &sender, &pending);
                        }

                        Some(ChannelCommand::RemovePending(call_id)) => {
                            pending.lock().remove(&call_id);
                            debug!(%call_id, "Removed timed-out call");
                        }

                        Some(ChannelCommand::Destroy) => {
                            debug!("Destroy command received");
                            break true;
                        }

                        None => {
                            debug!("Command channel closed");
                            break true;
                        }
                    }
                }
            }
        };

        let reason: fn() -> Error = if destroyed {
            || Error::ChannelDestroyed
        } else {
            || Error::PortClosed
        };
        Self::fail_pending_calls(&pending, reason);

        debug!("Channel event loop terminated");
    }

    /// Registers the pending call and sends the request on the port.
    fn handle_post(
        message: Message,
        response_tx: oneshot::Sender<Result<Value>>,
        sender: &PortSender,
        pending: &Arc<Mutex<PendingMap>>,
    ) {
        let call_id = message.id;

        // Register before sending so the response can never race the entry
        pending.lock().insert(call_id, response_tx);

        if let Err(e) = sender.send(message) {
            if let Some(tx) = pending.lock().remove(&call_id) {
                let _ = tx.send(Err(e));
            }
            return;
        }

        trace!(%call_id, "Request sent");
    }

    /// Routes a response to its pending call by ID.
    fn handle_response(message: Message, pending: &Arc<Mutex<PendingMap>>) {
        if !message.is_result() {
            warn!(kind = %message.kind, id = %message.id, "Ignoring non-result message");
            return;
        }

        let tx = pending.lock().remove(&message.id);
        let Some(tx) = tx else {
            // Protocol violation: with two endpoints and no retry layer,
            // a stale or duplicate response means a bug somewhere.
            error!(
                error = %Error::unexpected_response(message.id),
                kind = %message.kind,
                "Response for unknown call"
            );
            return;
        };

        let outcome = match serde_json::from_value::<ResultPayload>(message.value) {
            Ok(payload) => payload.into_result(),
            Err(e) => Err(Error::protocol(format!("malformed result payload: {e}"))),
        };

        let _ = tx.send(outcome);
    }

    /// Fails all pending calls on teardown.
    fn fail_pending_calls(pending: &Arc<Mutex<PendingMap>>, reason: fn() -> Error) {
        let drained: Vec<_> = pending.lock().drain().collect();
        let count = drained.len();

        for (_, tx) in drained {
            let _ = tx.send(Err(reason()));
        }

        if count > 0 {
            debug!(count, "Failed pending calls on teardown");
        }
    }
}

// ============================================================================
// PortSource
// ============================================================================

/// How the event loop obtains its port.
enum PortSource {
    /// Wait for the peer to connect.
    Listener(PortListener),
    /// Port already established by the transport.
    Established(Port),
}

// ============================================================================
// Tests
// ============================================================================
