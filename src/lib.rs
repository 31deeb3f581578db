//! Correlated request/response channel between privileged browser code
//! and a WebExtension background script.
//!
//! Privileged code cannot call the WebExtension tab-creation API directly,
//! so it asks the sandboxed background script over a duplex message port.
//! This crate implements both endpoints of that port protocol.
//!
//! # Architecture
//!
//! Two cooperating endpoints over one duplex [`Port`]:
//!
//! - **[`Channel`] (caller side)**: waits for the connect handshake, then
//!   issues `{type, id, value}` requests and settles each pending call when
//!   its correlated response arrives
//! - **[`Responder`] (callee side)**: dispatches requests by `type` to
//!   registered handlers and always emits exactly one
//!   `{ok, result, error}` response, even on failure
//!
//! Key design principles:
//!
//! - Correlation IDs are strictly monotonic per channel, so a stale or
//!   duplicate response can never match a newer call
//! - Responses may arrive in any order; routing is by ID, not position
//! - Handler failures travel as data (`ok: false`), never as transport
//!   faults, keeping the wire protocol symmetric
//! - Teardown settles every in-flight call instead of leaving it hanging
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use webext_channel::{Channel, Responder, TabId, TabHost, Where, tabs, transport};
//!
//! struct Browser;
//!
//! #[async_trait::async_trait]
//! impl TabHost for Browser {
//!     async fn create_tab(&self, url: &str, active: bool) -> webext_channel::Result<TabId> {
//!         // Call into the hosting environment here.
//!         let _ = (url, active);
//!         Ok(TabId::new(42))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> webext_channel::Result<()> {
//!     // Privileged side listens; background side connects.
//!     let (listener, connector) = transport::listen();
//!     let channel = Channel::new(listener);
//!
//!     let mut responder = Responder::new();
//!     tabs::register_open_tab(&mut responder, Arc::new(Browser));
//!     responder.serve(connector.connect()?);
//!
//!     channel.connect().await?;
//!     let tab_id = tabs::open_tab(&channel, "https://example.com", Where::Tab).await?;
//!     println!("opened tab {tab_id}");
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`channel`] | Caller side: [`Channel`] |
//! | [`responder`] | Callee side: [`Responder`] |
//! | [`tabs`] | `open-tab` request domain and [`TabHost`] seam |
//! | [`protocol`] | Wire message types |
//! | [`transport`] | Duplex port, connect handshake, WebSocket bridge |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |

// ============================================================================
// Modules
// ============================================================================

/// Caller side: connect handshake and correlated calls.
pub mod channel;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// Wire protocol message types.
pub mod protocol;

/// Callee side: request dispatch and reply emission.
pub mod responder;

/// Tab-opening request domain.
pub mod tabs;

/// Duplex transport layer.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Endpoint types
pub use channel::Channel;
pub use responder::{Handler, HandlerFuture, Responder};

// Tab domain
pub use tabs::{OPEN_TAB, OpenTabParams, TabHost, Where};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{CallId, TabId};

// Protocol types
pub use protocol::{Message, ResultPayload};

// Transport types
pub use transport::{Port, PortConnector, PortListener, PortSender, WsServer};
