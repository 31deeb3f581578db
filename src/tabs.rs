//! Tab-opening request domain.
//!
//! The one side effect this protocol was built for: privileged code asks
//! the background endpoint to open a browser tab. This module defines the
//! `open-tab` request, the `where` placement discriminator, and the
//! [`TabHost`] seam over the host's tab-creation API.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::channel::Channel;
use crate::error::{Error, Result};
use crate::identifiers::TabId;
use crate::responder::Responder;

// ============================================================================
// Constants
// ============================================================================

/// Request type tag for tab opening.
pub const OPEN_TAB: &str = "open-tab";

// ============================================================================
// Where
// ============================================================================

/// Placement discriminator for a new tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Where {
    /// Open focused in the foreground.
    Tab,
    /// Open in the background.
    TabShifted,
}

impl Where {
    /// Returns `true` if the new tab should be focused.
    #[inline]
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Tab)
    }

    /// Maps the browser's load-in-background preference to a placement.
    #[inline]
    #[must_use]
    pub const fn from_load_in_background(load_in_background: bool) -> Self {
        if load_in_background {
            Self::TabShifted
        } else {
            Self::Tab
        }
    }

    /// Returns the wire representation.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tab => "tab",
            Self::TabShifted => "tabshifted",
        }
    }
}

impl FromStr for Where {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "tab" => Ok(Self::Tab),
            "tabshifted" => Ok(Self::TabShifted),
            other => Err(Error::invalid_argument(format!(
                "unexpected where type: {other}"
            ))),
        }
    }
}

impl fmt::Display for Where {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// OpenTabParams
// ============================================================================

/// Payload of an `open-tab` request.
///
/// `target` is kept as a raw string so that an out-of-range value fails
/// validation in the handler with a descriptive error, rather than as an
/// opaque deserialization failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenTabParams {
    /// URL to load in the new tab.
    pub url: String,

    /// Placement discriminator, one of `tab` or `tabshifted`.
    #[serde(rename = "where")]
    pub target: String,
}

impl OpenTabParams {
    /// Creates params for a known placement.
    #[must_use]
    pub fn new(url: impl Into<String>, target: Where) -> Self {
        Self {
            url: url.into(),
            target: target.as_str().to_string(),
        }
    }
}

// ============================================================================
// TabHost
// ============================================================================

/// The host's tab-creation API, as seen by the `open-tab` handler.
///
/// Implemented over whatever the hosting environment provides; the
/// handler only needs this one operation.
#[async_trait]
pub trait TabHost: Send + Sync {
    /// Creates a tab loading `url`, focused if `active`.
    ///
    /// Returns the new tab's identifier.
    async fn create_tab(&self, url: &str, active: bool) -> Result<TabId>;
}

// ============================================================================
// Handler Registration
// ============================================================================

/// Registers the `open-tab` handler on a responder.
///
/// The handler validates the placement and the URL before touching the
/// host; on success the response result is the new tab's id.
pub fn register_open_tab(responder: &mut Responder, host: Arc<dyn TabHost>) {
    responder.register(OPEN_TAB, move |value| {
        let host = Arc::clone(&host);
        async move { open_tab_request(host.as_ref(), value).await }
    });
}

/// Handles one `open-tab` request.
async fn open_tab_request(host: &dyn TabHost, value: Value) -> Result<Value> {
    let params: OpenTabParams = serde_json::from_value(value)
        .map_err(|e| Error::invalid_argument(format!("malformed open-tab params: {e}")))?;

    let target = Where::from_str(&params.target)?;
    let url = Url::parse(&params.url)
        .map_err(|e| Error::invalid_argument(format!("invalid url `{}`: {e}", params.url)))?;

    let tab_id = host.create_tab(url.as_str(), target.is_active()).await?;

    debug!(%tab_id, url = %url, target = %target, "Tab created");

    Ok(Value::from(u64::from(tab_id.value())))
}

// ============================================================================
// Caller Convenience
// ============================================================================

/// Asks the peer to open a tab and returns the new tab's id.
///
/// Caller-side counterpart of [`register_open_tab`].
///
/// # Errors
///
/// - [`Error::Handler`] with the remote failure message if the peer's
///   handler rejected the request
/// - [`Error::Protocol`] if the result payload is not a tab id
/// - Any channel error from [`Channel::post_message`]
pub async fn open_tab(channel: &Channel, url: &str, target: Where) -> Result<TabId> {
    let value = channel
        .post_message(OPEN_TAB, OpenTabParams::new(url, target))
        .await?;

    let raw = value
        .as_u64()
        .and_then(|raw| u32::try_from(raw).ok())
        .ok_or_else(|| Error::protocol(format!("open-tab result is not a tab id: {value}")))?;

    Ok(TabId::new(raw))
}

// ============================================================================
// Tests
// ============================================================================
