//! Type-safe identifiers for channel entities.
//!
//! Newtype wrappers prevent mixing incompatible IDs at compile time.
//! All IDs serialize transparently as their inner integer, matching the
//! wire format (`"id": 3`, `"result": 42`).

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// CallId
// ============================================================================

/// Correlation identifier attached to a request and echoed in its response.
///
/// Allocated by the caller-side channel from a strictly monotonic counter,
/// so an ID is never reused for the lifetime of a channel. This makes stale
/// or duplicate responses unambiguous: they can never match a newer call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(u64);

impl CallId {
    /// Creates a call ID from a raw value.
    #[inline]
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// TabId
// ============================================================================

/// Identifier of a browser tab, as reported by the tab-opening host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(u32);

impl TabId {
    /// Creates a tab ID from a raw value.
    #[inline]
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_id_ordering() {
        assert!(CallId::new(0) < CallId::new(1));
        assert_eq!(CallId::new(7).value(), 7);
    }

    #[test]
    fn test_call_id_serializes_as_integer() {
        let json = serde_json::to_string(&CallId::new(3)).expect("serialize");
        assert_eq!(json, "3");

        let id: CallId = serde_json::from_str("3").expect("parse");
        assert_eq!(id, CallId::new(3));
    }

    #[test]
    fn test_tab_id_display() {
        assert_eq!(TabId::new(42).to_string(), "42");
    }
}
