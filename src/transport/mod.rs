//! Duplex transport layer.
//!
//! This module provides the port primitive connecting the caller side
//! (privileged code) to the callee side (background script).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  Channel        │                              │  Responder      │
//! │  (privileged)   │          Port pair           │  (background)   │
//! │                 │◄────────────────────────────►│                 │
//! │  PortListener   │   in-memory or WebSocket     │  PortConnector  │
//! │  → Port         │                              │  → Port         │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. [`listen`] — create a listener/connector pair
//! 2. Hand the connector to the callee endpoint
//! 3. `PortListener::accept` — resolves once the callee connects
//! 4. [`Port`] — discrete message send, awaitable receive
//!
//! The WebSocket adapter in [`ws`] produces the same [`Port`] over a
//! localhost socket, for endpoints living in separate processes.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `port` | In-memory duplex port and connect handshake |
//! | `ws` | WebSocket bridge producing a [`Port`] |

// ============================================================================
// Submodules
// ============================================================================

/// In-memory duplex port and connect handshake.
pub mod port;

/// WebSocket bridge.
pub mod ws;

// ============================================================================
// Re-exports
// ============================================================================

pub use port::{Port, PortConnector, PortListener, PortSender, listen};
pub use ws::WsServer;
