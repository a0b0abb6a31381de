//! Headless Chromium sessions for listing-page harvesting.
//!
//! The harvester only sees three traits:
//!
//! - [`SessionLauncher`] starts a browser process
//! - [`BrowserSession`] navigates pages and tears the process down
//! - [`PageDriver`] runs the typed DOM queries (item links, load-more control,
//!   scroll, document serialization)
//!
//! The chromiumoxide implementations are [`ChromeLauncher`], [`ChromeSession`]
//! and [`CdpPage`].
//!
//! # Example
//!
//! ```ignore
//! use shelfscan_browser::{ChromeLauncher, SessionLauncher};
//!
//! let launcher = ChromeLauncher::new(config.browser.clone());
//! let mut session = launcher.launch().await?;
//! let opened = session.open_page(url, Duration::from_secs(45)).await?;
//! let html = opened.page.serialize_document().await?;
//! session.close().await;
//! ```

pub mod detect;
pub mod error;
pub mod page;
pub mod session;
pub mod types;

pub use {
    error::BrowserError,
    page::{CdpPage, PageDriver},
    session::{BrowserSession, ChromeLauncher, ChromeSession, OpenedPage, SessionLauncher},
    types::{ControlState, ScrollPosition, is_domain_allowed, validate_url},
};
