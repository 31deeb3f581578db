//! Callee-side responder: request dispatch and reply emission.
//!
//! The responder receives tagged requests from a [`Port`], dispatches by
//! `type` to a registered handler, and always emits exactly one
//! correlated response — including for unknown request types and for
//! handler failures, so the caller's future can never be stranded.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::CallId;
use crate::protocol::{Message, ResultPayload};
use crate::transport::{Port, PortSender};

// ============================================================================
// Types
// ============================================================================

/// Future returned by a request handler.
pub type HandlerFuture = BoxFuture<'static, Result<Value>>;

/// A registered request handler.
///
/// Invoked with the request's `value`; its outcome becomes the response
/// payload. Failures are captured and delivered as `{ok: false, error}`,
/// never re-thrown on the responder side.
pub type Handler = Arc<dyn Fn(Value) -> HandlerFuture + Send + Sync>;

// ============================================================================
// Responder
// ============================================================================

/// Callee-side endpoint of the port protocol.
///
/// Register handlers by request type, then [`serve`](Self::serve) a port.
/// Each request runs in its own task, so a slow handler never blocks later
/// requests and responses may complete out of order — the caller's
/// correlation map tolerates this by design.
#[derive(Default)]
pub struct Responder {
    /// Handler registry keyed by request type.
    handlers: FxHashMap<String, Handler>,
}

impl Responder {
    /// Creates an empty responder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for a request type.
    ///
    /// Replaces any previously registered handler for the same type.
    pub fn register<F, Fut>(&mut self, kind: impl Into<String>, handler: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        self.handlers
            .insert(kind.into(), Arc::new(move |value| handler(value).boxed()));
    }

    /// Returns `true` if a handler is registered for `kind`.
    #[inline]
    #[must_use]
    pub fn has_handler(&self, kind: &str) -> bool {
        self.handlers.contains_key(kind)
    }

    /// Returns the number of registered handlers.
    #[inline]
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Serves requests from the port until the peer hangs up.
    ///
    /// Consumes the responder and spawns its serve loop; the returned
    /// handle resolves when the port closes.
    pub fn serve(self, port: Port) -> JoinHandle<()> {
        let handlers = Arc::new(self.handlers);
        tokio::spawn(Self::run(handlers, port))
    }

    /// Serve loop: one dispatch per incoming request.
    async fn run(handlers: Arc<FxHashMap<String, Handler>>, mut port: Port) {
        let sender = port.sender();

        while let Some(message) = port.recv().await {
            Self::dispatch(&handlers, message, sender.clone());
        }

        debug!("Responder port closed");
    }

    /// Dispatches one request to its handler.
    ///
    /// Every path emits exactly one response.
    fn dispatch(handlers: &Arc<FxHashMap<String, Handler>>, message: Message, sender: PortSender) {
        let Message { kind, id, value } = message;

        let Some(handler) = handlers.get(&kind).cloned() else {
            // Answering (rather than staying silent) keeps the caller's
            // pending future from hanging forever.
            warn!(%kind, %id, "No handler for request type");
            let payload = ResultPayload::failure(Error::unknown_request(&kind).to_string());
            Self::reply(&sender, &kind, id, &payload);
            return;
        };

        trace!(%kind, %id, "Dispatching request");

        tokio::spawn(async move {
            let payload = match handler(value).await {
                Ok(result) => ResultPayload::success(result),
                Err(e) => ResultPayload::failure(e.to_string()),
            };
            Self::reply(&sender, &kind, id, &payload);
        });
    }

    /// Emits the correlated response for a request.
    fn reply(sender: &PortSender, request_kind: &str, id: CallId, payload: &ResultPayload) {
        let message = match Message::response(request_kind, id, payload) {
            Ok(message) => message,
            Err(e) => {
                error!(error = %e, %id, "Failed to build response");
                return;
            }
        };

        if sender.send(message).is_err() {
            debug!(%id, "Peer hung up before response delivery");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
