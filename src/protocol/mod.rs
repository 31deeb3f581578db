//! Wire protocol message types.
//!
//! This module defines the message format exchanged between the caller side
//! ([`Channel`](crate::Channel)) and the callee side
//! ([`Responder`](crate::Responder)) of a port.
//!
//! # Protocol Overview
//!
//! | Message | Direction | Shape |
//! |---------|-----------|-------|
//! | Request | Caller → Responder | `{"type", "id", "value"}` |
//! | Response | Responder → Caller | `{"type", "id", "value": {"ok", "result", "error"}}` |
//!
//! A response's `type` is the request's `type` suffixed with `-result`
//! (e.g. `open-tab` → `open-tab-result`), so a response can never be
//! mistaken for a new request.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `message` | [`Message`] envelope and [`ResultPayload`] |

// ============================================================================
// Submodules
// ============================================================================

/// Message envelope and result payload types.
pub mod message;

// ============================================================================
// Re-exports
// ============================================================================

pub use message::{Message, RESULT_SUFFIX, ResultPayload};
