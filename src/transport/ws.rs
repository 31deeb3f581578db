//! WebSocket bridge.
//!
//! Carries the port protocol over a localhost WebSocket, for endpoint
//! pairs living in separate processes (e.g. privileged code in one,
//! the background script's host in another). Each JSON-encoded
//! [`Message`] travels as one text frame.
//!
//! # Connection Flow
//!
//! 1. Caller process binds a [`WsServer`] to `localhost:0` (random port)
//! 2. Callee process is launched with the server's `ws_url`
//! 3. Callee calls [`connect`]; server's `accept` resolves
//! 4. Both sides hold an ordinary [`Port`]

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{from_str, to_string};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::protocol::Message;

use super::Port;

// ============================================================================
// Constants
// ============================================================================

/// Timeout for waiting for the peer process to connect.
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// WsServer
// ============================================================================

/// A WebSocket server that is bound but not yet connected.
///
/// Represents the state between binding to a port and accepting the peer
/// process's connection.
///
/// # Example
///
/// ```ignore
/// use std::net::{IpAddr, Ipv4Addr};
/// use webext_channel::transport::WsServer;
///
/// let server = WsServer::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0).await?;
/// let ws_url = server.ws_url();
///
/// // Launch the peer process with ws_url...
///
/// let port = server.accept().await?;
/// ```
pub struct WsServer {
    /// TCP listener for the incoming connection.
    listener: TcpListener,
    /// Address the server is actually bound to.
    addr: SocketAddr,
}

impl WsServer {
    /// Binds a WebSocket server to the specified address and port.
    ///
    /// Use port 0 to let the OS assign a random available port.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if binding fails.
    pub async fn bind(ip: IpAddr, port: u16) -> Result<Self> {
        let listener = TcpListener::bind(SocketAddr::new(ip, port)).await?;
        let addr = listener.local_addr()?;

        debug!(%addr, "WebSocket server bound");

        Ok(Self { listener, addr })
    }

    /// Returns the port the server is bound to.
    #[inline]
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Returns the WebSocket URL for this server.
    ///
    /// Format: `ws://{addr}` with the bound address, e.g.
    /// `ws://127.0.0.1:{port}` or `ws://[::1]:{port}`.
    #[inline]
    #[must_use]
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Returns the local socket address.
    #[inline]
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Accepts the peer's connection and returns the bridged port.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionTimeout`] if the peer doesn't connect in time
    /// - [`Error::Connection`] if the WebSocket upgrade fails
    pub async fn accept(self) -> Result<Port> {
        let accept_result = timeout(CONNECTION_TIMEOUT, self.listener.accept()).await;

        let (stream, addr) = accept_result
            .map_err(|_| Error::connection_timeout(CONNECTION_TIMEOUT.as_millis() as u64))??;

        debug!(?addr, "TCP connection accepted");

        let ws_stream = tokio_tungstenite::accept_async(stream)
            .await
            .map_err(|e| Error::connection(format!("WebSocket upgrade failed: {e}")))?;

        info!(addr = %self.addr, "WebSocket connection established");

        Ok(bridge(ws_stream))
    }
}

// ============================================================================
// Client Side
// ============================================================================

/// Connects to a [`WsServer`] and returns the bridged port.
///
/// This is the callee-process counterpart of [`WsServer::accept`].
///
/// # Errors
///
/// Returns [`Error::Connection`] if the connection or upgrade fails.
pub async fn connect(url: &str) -> Result<Port> {
    let (ws_stream, _) = tokio_tungstenite::connect_async(url)
        .await
        .map_err(|e| Error::connection(format!("WebSocket connect failed: {e}")))?;

    debug!(url, "WebSocket client connected");

    Ok(bridge(ws_stream))
}

// ============================================================================
// Bridge
// ============================================================================

/// Wraps a WebSocket stream in a pump task and returns the local [`Port`].
///
/// The pump serializes outgoing messages to text frames and parses
/// incoming text frames back into messages. It terminates when either
/// the socket closes or the local port is dropped.
fn bridge<S>(ws_stream: WebSocketStream<S>) -> Port
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();
    let (in_tx, in_rx) = mpsc::unbounded_channel::<Message>();

    tokio::spawn(async move {
        let (mut ws_write, mut ws_read) = ws_stream.split();

        loop {
            tokio::select! {
                // Outgoing messages from the local port
                outgoing = out_rx.recv() => {
                    match outgoing {
                        Some(message) => {
                            let json = match to_string(&message) {
                                Ok(json) => json,
                                Err(e) => {
                                    warn!(error = %e, "Failed to serialize outgoing message");
                                    continue;
                                }
                            };

                            if let Err(e) = ws_write.send(WsMessage::Text(json.into())).await {
                                error!(error = %e, "WebSocket send failed");
                                break;
                            }
                        }

                        None => {
                            debug!("Local port dropped, closing WebSocket");
                            let _ = ws_write.close().await;
                            break;
                        }
                    }
                }

                // Incoming frames from the socket
                incoming = ws_read.next() => {
                    match incoming {
                        Some(Ok(WsMessage::Text(text))) => {
                            match from_str::<Message>(&text) {
                                Ok(message) => {
                                    if in_tx.send(message).is_err() {
                                        break;
                                    }
                                }
                                Err(e) => {
                                    warn!(error = %e, text = %text, "Failed to parse incoming message");
                                }
                            }
                        }

                        Some(Ok(WsMessage::Close(_))) => {
                            debug!("WebSocket closed by remote");
                            break;
                        }

                        Some(Err(e)) => {
                            error!(error = %e, "WebSocket error");
                            break;
                        }

                        None => {
                            debug!("WebSocket stream ended");
                            break;
                        }

                        // Ignore Binary, Ping, Pong
                        _ => {}
                    }
                }
            }
        }

        debug!("WebSocket pump terminated");
    });

    Port::from_halves(out_tx, in_rx)
}

// ============================================================================
// Tests
// ============================================================================
