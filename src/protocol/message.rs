//! Message envelope and result payload types.
//!
//! Every unit on the wire is a tagged envelope `{type, id, value}`. For
//! requests `value` is an arbitrary JSON payload; for responses it is a
//! [`ResultPayload`] carrying success or failure.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::CallId;

// ============================================================================
// Constants
// ============================================================================

/// Suffix appended to a request's `type` to form its response `type`.
pub const RESULT_SUFFIX: &str = "-result";

// ============================================================================
// Message
// ============================================================================

/// A tagged envelope sent over the port, in either direction.
///
/// # Format
///
/// Request:
/// ```json
/// {"type": "open-tab", "id": 0, "value": {"url": "https://example.com", "where": "tab"}}
/// ```
///
/// Response:
/// ```json
/// {"type": "open-tab-result", "id": 0, "value": {"ok": true, "result": 42, "error": null}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Request type tag, or `<type>-result` for responses.
    #[serde(rename = "type")]
    pub kind: String,

    /// Correlation identifier, echoed verbatim in the response.
    pub id: CallId,

    /// Request payload, or serialized [`ResultPayload`] for responses.
    pub value: Value,
}

impl Message {
    /// Creates a request message.
    #[inline]
    #[must_use]
    pub fn request(kind: impl Into<String>, id: CallId, value: Value) -> Self {
        Self {
            kind: kind.into(),
            id,
            value,
        }
    }

    /// Creates the response message for a request of type `request_kind`.
    ///
    /// The response carries the `-result`-suffixed type tag and echoes the
    /// request's `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the payload fails to serialize.
    pub fn response(request_kind: &str, id: CallId, payload: &ResultPayload) -> Result<Self> {
        Ok(Self {
            kind: Self::result_kind(request_kind),
            id,
            value: serde_json::to_value(payload)?,
        })
    }

    /// Returns the response type tag for a request type.
    #[inline]
    #[must_use]
    pub fn result_kind(request_kind: &str) -> String {
        format!("{request_kind}{RESULT_SUFFIX}")
    }

    /// Returns `true` if this message carries a result payload.
    #[inline]
    #[must_use]
    pub fn is_result(&self) -> bool {
        self.kind.ends_with(RESULT_SUFFIX)
    }
}

// ============================================================================
// ResultPayload
// ============================================================================

/// Success/failure payload delivered in a response's `value` field.
///
/// Handler failures travel as data (`ok: false` with a message), never as a
/// separate error-message type, keeping the wire protocol symmetric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultPayload {
    /// Whether the handler completed successfully.
    pub ok: bool,

    /// Handler output on success, `null` otherwise.
    #[serde(default)]
    pub result: Option<Value>,

    /// Failure message on error, `null` otherwise.
    #[serde(default)]
    pub error: Option<String>,
}

impl ResultPayload {
    /// Creates a success payload.
    #[inline]
    #[must_use]
    pub fn success(result: Value) -> Self {
        Self {
            ok: true,
            result: Some(result),
            error: None,
        }
    }

    /// Creates a failure payload.
    #[inline]
    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            result: None,
            error: Some(error.into()),
        }
    }

    /// Converts the payload into the caller-visible outcome.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Handler`] carrying the remote failure message if
    /// `ok` is `false`.
    pub fn into_result(self) -> Result<Value> {
        if self.ok {
            Ok(self.result.unwrap_or(Value::Null))
        } else {
            let message = self
                .error
                .unwrap_or_else(|| "unknown handler error".to_string());
            Err(Error::handler(message))
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
