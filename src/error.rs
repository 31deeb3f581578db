//! Error types for the channel crate.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use webext_channel::{Channel, Result};
//!
//! async fn example(channel: &Channel) -> Result<()> {
//!     channel.connect().await?;
//!     channel.post_message("ping", serde_json::Value::Null).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Usage | [`Error::NotConnected`] |
//! | Lifecycle | [`Error::ChannelDestroyed`], [`Error::PortClosed`] |
//! | Connection | [`Error::Connection`], [`Error::ConnectionTimeout`] |
//! | Protocol | [`Error::Protocol`], [`Error::UnexpectedResponse`], [`Error::UnknownRequest`] |
//! | Remote | [`Error::Handler`], [`Error::InvalidArgument`] |
//! | Execution | [`Error::RequestTimeout`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::CallId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Usage Errors
    // ========================================================================
    /// `post_message` called before the port handshake completed.
    ///
    /// This is a programmer-usage error: callers must await `connect()`
    /// before posting. It fails fast and nothing is sent on the wire.
    #[error("Channel has no established port (await `connect()` first)")]
    NotConnected,

    // ========================================================================
    // Lifecycle Errors
    // ========================================================================
    /// The channel was destroyed while a call was in flight.
    ///
    /// All pending calls settle with this error when `destroy()` is called.
    #[error("Channel destroyed")]
    ChannelDestroyed,

    /// The underlying port closed unexpectedly.
    ///
    /// Returned when the peer endpoint hangs up during operation.
    #[error("Port closed")]
    PortClosed,

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Transport connection failed.
    ///
    /// Returned when a WebSocket link cannot be established.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Timeout waiting for the peer to connect.
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Protocol violation or malformed message.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    /// A response arrived whose ID matches no pending call.
    ///
    /// Indicates a bug in the channel or a stale/duplicate message; it is
    /// signaled rather than silently dropped.
    #[error("Unexpected response identifier: {call_id}")]
    UnexpectedResponse {
        /// The unmatched correlation ID.
        call_id: CallId,
    },

    /// The responder has no handler registered for a request type.
    #[error("Unknown request type: {kind}")]
    UnknownRequest {
        /// The unrecognized request type tag.
        kind: String,
    },

    // ========================================================================
    // Remote Errors
    // ========================================================================
    /// The remote handler reported a failure.
    ///
    /// Carries the handler's failure message verbatim, as delivered in the
    /// `{ok: false, error}` result payload.
    #[error("{message}")]
    Handler {
        /// Failure message from the remote handler.
        message: String,
    },

    /// Invalid argument in a request payload.
    ///
    /// Returned by handlers when request parameters fail validation, e.g.
    /// an unexpected `where` discriminator or an unparseable URL.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    // ========================================================================
    // Execution Errors
    // ========================================================================
    /// A call did not receive its response within the deadline.
    ///
    /// The pending entry is evicted, so the ID can no longer match a
    /// late response.
    #[error("Call {call_id} timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// The call ID that timed out.
        call_id: CallId,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        Self::ConnectionTimeout { timeout_ms }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates an unexpected-response error.
    #[inline]
    pub fn unexpected_response(call_id: CallId) -> Self {
        Self::UnexpectedResponse { call_id }
    }

    /// Creates an unknown-request error.
    #[inline]
    pub fn unknown_request(kind: impl Into<String>) -> Self {
        Self::UnknownRequest { kind: kind.into() }
    }

    /// Creates a remote handler error.
    #[inline]
    pub fn handler(message: impl Into<String>) -> Self {
        Self::Handler {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    #[inline]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a request timeout error.
    #[inline]
    pub fn request_timeout(call_id: CallId, timeout_ms: u64) -> Self {
        Self::RequestTimeout {
            call_id,
            timeout_ms,
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::ConnectionTimeout { .. } | Self::RequestTimeout { .. }
        )
    }

    /// Returns `true` if this is a connection/lifecycle error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionTimeout { .. }
                | Self::ChannelDestroyed
                | Self::PortClosed
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if the failure originated in the remote handler
    /// rather than in the channel machinery.
    #[inline]
    #[must_use]
    pub fn is_handler_error(&self) -> bool {
        matches!(self, Self::Handler { .. })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::ErrorKind;

    #[test]
    fn test_error_display() {
        let err = Error::connection("refused");
        assert_eq!(err.to_string(), "Connection failed: refused");
    }

    #[test]
    fn test_handler_error_preserves_message() {
        // The caller-visible message must be the handler's failure string
        // verbatim.
        let err = Error::handler("bad url");
        assert_eq!(err.to_string(), "bad url");
        assert!(err.is_handler_error());
    }

    #[test]
    fn test_unexpected_response_display() {
        let err = Error::unexpected_response(CallId::new(9));
        assert_eq!(err.to_string(), "Unexpected response identifier: 9");
    }

    #[test]
    fn test_is_timeout() {
        let timeout_err = Error::request_timeout(CallId::new(0), 5000);
        let other_err = Error::protocol("test");

        assert!(timeout_err.is_timeout());
        assert!(!other_err.is_timeout());
    }

    #[test]
    fn test_is_connection_error() {
        assert!(Error::ChannelDestroyed.is_connection_error());
        assert!(Error::PortClosed.is_connection_error());
        assert!(Error::connection_timeout(1000).is_connection_error());
        assert!(!Error::NotConnected.is_connection_error());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = IoError::new(ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }
}
