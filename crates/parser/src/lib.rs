//! Product record extraction from a saved listing-page snapshot.
//!
//! Parsing is a pure function of the HTML text and the [`ParseRules`]: no I/O,
//! same input, same output, same order.
//!
//! Three strategies run in order, each only when the previous one produced
//! nothing:
//!
//! - **containers**: one record per product tile, fields resolved through
//!   ordered fallback selectors
//! - **links**: product-path hyperlinks, fields taken from the nearest
//!   ancestor that looks like a product card
//! - **pattern**: regex over the raw markup, bounded to the first N matches
//!
//! # Example
//!
//! ```ignore
//! use shelfscan_parser::{ParseRules, parse};
//!
//! let rules = ParseRules::from_config(&shelfscan_config::ParserConfig::default())?;
//! let records = parse(&html, &rules);
//! ```

pub mod error;
pub mod extract;
pub mod record;
pub mod rules;

pub use {
    error::ParseError,
    extract::{ParseOutcome, Strategy, parse, parse_detailed},
    record::ProductRecord,
    rules::ParseRules,
};
