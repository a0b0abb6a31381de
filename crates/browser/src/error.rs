//! Browser error types.

use thiserror::Error;

/// Errors that can occur during browser operations.
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("browser not available: {0}")]
    BrowserNotAvailable(String),

    #[error("browser launch failed: {0}")]
    LaunchFailed(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("domain not in allowed list: {0}")]
    DomainNotAllowed(String),

    #[error("navigation timed out after {0}ms")]
    NavigationTimeout(u64),

    #[error("navigation failed: {0}")]
    NavigationError(String),

    #[error("JavaScript evaluation failed: {0}")]
    JsEvalFailed(String),

    #[error("unexpected script result: {0}")]
    Decode(String),

    #[error("browser closed unexpectedly")]
    BrowserClosed,

    #[error("CDP error: {0}")]
    Cdp(String),
}

impl BrowserError {
    /// Whether a retry within the same page could plausibly succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::NavigationTimeout(_) | Self::JsEvalFailed(_))
    }
}

impl From<chromiumoxide::error::CdpError> for BrowserError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        BrowserError::Cdp(err.to_string())
    }
}
