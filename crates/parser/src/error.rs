//! Parser error types.

use thiserror::Error;

/// Errors raised while compiling [`crate::ParseRules`].
///
/// Parsing itself never fails; a snapshot with no recognizable products
/// yields an empty list.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid base URL '{0}'")]
    InvalidBaseUrl(String),
}
