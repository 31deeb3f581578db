//! In-memory duplex port and connect handshake.
//!
//! A [`Port`] is one end of a bidirectional message link: discrete
//! [`Message`] send plus awaitable receive. [`listen`] models the
//! one-shot connect event of the hosting environment: the listener side
//! is not usable until the connector side has connected, exactly once.

// ============================================================================
// Imports
// ============================================================================

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::error::{Error, Result};
use crate::protocol::Message;

// ============================================================================
// Port
// ============================================================================

/// One end of an established duplex message link.
///
/// Sending is non-blocking and never reorders: messages are delivered to
/// the peer in send order. Receiving yields `None` once the peer end is
/// dropped.
#[derive(Debug)]
pub struct Port {
    tx: mpsc::UnboundedSender<Message>,
    rx: mpsc::UnboundedReceiver<Message>,
}

impl Port {
    /// Creates a connected pair of ports.
    ///
    /// Messages sent on one end are received on the other.
    #[must_use]
    pub fn pair() -> (Self, Self) {
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();

        (Self::from_halves(a_tx, b_rx), Self::from_halves(b_tx, a_rx))
    }

    /// Assembles a port from raw halves.
    ///
    /// Used by transport adapters that pump the halves themselves.
    pub(crate) fn from_halves(
        tx: mpsc::UnboundedSender<Message>,
        rx: mpsc::UnboundedReceiver<Message>,
    ) -> Self {
        Self { tx, rx }
    }

    /// Sends a message to the peer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PortClosed`] if the peer end is gone.
    pub fn send(&self, message: Message) -> Result<()> {
        self.tx.send(message).map_err(|_| Error::PortClosed)
    }

    /// Receives the next message from the peer.
    ///
    /// Returns `None` once the peer end is dropped and all buffered
    /// messages have been drained.
    pub async fn recv(&mut self) -> Option<Message> {
        self.rx.recv().await
    }

    /// Returns a cloneable send-only handle to this port.
    #[inline]
    #[must_use]
    pub fn sender(&self) -> PortSender {
        PortSender {
            tx: self.tx.clone(),
        }
    }
}

// ============================================================================
// PortSender
// ============================================================================

/// Cloneable send-only handle to a [`Port`].
#[derive(Debug, Clone)]
pub struct PortSender {
    tx: mpsc::UnboundedSender<Message>,
}

impl PortSender {
    /// Sends a message to the peer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PortClosed`] if the peer end is gone.
    pub fn send(&self, message: Message) -> Result<()> {
        self.tx.send(message).map_err(|_| Error::PortClosed)
    }
}

// ============================================================================
// Connect Handshake
// ============================================================================

/// Creates a listener/connector pair for the one-shot connect handshake.
///
/// The listener side accepts exactly one connection; the connector side
/// establishes it. This mirrors a `runtime.onConnect` / `runtime.connect`
/// pairing: the caller endpoint listens, the background endpoint connects.
#[must_use]
pub fn listen() -> (PortListener, PortConnector) {
    let (tx, rx) = oneshot::channel();
    (PortListener { rx }, PortConnector { tx })
}

/// Accepting side of the connect handshake.
///
/// Held by the caller endpoint; resolves once the peer connects.
#[derive(Debug)]
pub struct PortListener {
    rx: oneshot::Receiver<Port>,
}

impl PortListener {
    /// Waits for the peer to connect and returns the established port.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PortClosed`] if the connector was dropped without
    /// ever connecting.
    pub async fn accept(self) -> Result<Port> {
        let port = self.rx.await.map_err(|_| Error::PortClosed)?;
        debug!("Port connection accepted");
        Ok(port)
    }
}

/// Connecting side of the connect handshake.
///
/// Held by the callee endpoint; consumed by the single [`connect`] call.
///
/// [`connect`]: PortConnector::connect
#[derive(Debug)]
pub struct PortConnector {
    tx: oneshot::Sender<Port>,
}

impl PortConnector {
    /// Establishes the connection and returns the callee's end of the port.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PortClosed`] if the listener was dropped before
    /// the connection was made.
    pub fn connect(self) -> Result<Port> {
        let (listener_end, connector_end) = Port::pair();
        self.tx.send(listener_end).map_err(|_| Error::PortClosed)?;
        debug!("Port connection established");
        Ok(connector_end)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::identifiers::CallId;

    #[tokio::test]
    async fn test_pair_delivers_in_order() {
        let (a, mut b) = Port::pair();

        a.send(Message::request("first", CallId::new(0), json!(1)))
            .expect("send");
        a.send(Message::request("second", CallId::new(1), json!(2)))
            .expect("send");

        assert_eq!(b.recv().await.expect("first").kind, "first");
        assert_eq!(b.recv().await.expect("second").kind, "second");
    }

    #[tokio::test]
    async fn test_recv_ends_when_peer_dropped() {
        let (a, mut b) = Port::pair();
        drop(a);
        assert!(b.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_send_fails_when_peer_dropped() {
        let (a, b) = Port::pair();
        drop(b);

        let result = a.send(Message::request("ping", CallId::new(0), json!(null)));
        assert!(matches!(result, Err(Error::PortClosed)));
    }

    #[tokio::test]
    async fn test_listen_handshake() {
        let (listener, connector) = listen();

        let peer = connector.connect().expect("connect");
        let mut port = listener.accept().await.expect("accept");

        peer.send(Message::request("hello", CallId::new(0), json!(null)))
            .expect("send");
        assert_eq!(port.recv().await.expect("message").kind, "hello");
    }

    #[tokio::test]
    async fn test_accept_fails_when_connector_dropped() {
        let (listener, connector) = listen();
        drop(connector);

        assert!(matches!(listener.accept().await, Err(Error::PortClosed)));
    }

    #[tokio::test]
    async fn test_connect_fails_when_listener_dropped() {
        let (listener, connector) = listen();
        drop(listener);

        assert!(matches!(connector.connect(), Err(Error::PortClosed)));
    }
}
