//! Scripted browser doubles shared by the engine tests.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use {
    async_trait::async_trait,
    shelfscan_browser::{
        BrowserError, BrowserSession, ControlState, OpenedPage, PageDriver, ScrollPosition,
        SessionLauncher,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Interaction {
    Click,
    Scroll,
}

/// A listing page whose item count follows a fixed progression, advancing
/// one entry per click or scroll.
#[derive(Clone)]
pub(crate) struct MockPage {
    initial: usize,
    progression: Vec<usize>,
    total: Option<usize>,
    load_more: bool,
    container: bool,
    body_text: String,
    fail_after: Option<usize>,
    transient_at: Option<usize>,
    block_after: Option<usize>,
    item_reads_broken: bool,
    page_height: f64,
    padding: usize,
    flaked: Arc<AtomicBool>,
    step: Arc<AtomicUsize>,
    interactions: Arc<Mutex<Vec<Interaction>>>,
    serializations: Arc<AtomicUsize>,
}

impl MockPage {
    pub(crate) fn grid(initial: usize, progression: &[usize]) -> Self {
        Self {
            initial,
            progression: progression.to_vec(),
            total: None,
            load_more: false,
            container: true,
            body_text: String::new(),
            fail_after: None,
            transient_at: None,
            block_after: None,
            item_reads_broken: false,
            page_height: 1e9,
            padding: 0,
            flaked: Arc::new(AtomicBool::new(false)),
            step: Arc::new(AtomicUsize::new(0)),
            interactions: Arc::new(Mutex::new(Vec::new())),
            serializations: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn with_total(mut self, total: usize) -> Self {
        self.total = Some(total);
        self
    }

    pub(crate) fn with_load_more(mut self) -> Self {
        self.load_more = true;
        self
    }

    pub(crate) fn without_container(mut self) -> Self {
        self.container = false;
        self
    }

    pub(crate) fn with_body_text(mut self, text: &str) -> Self {
        self.body_text = text.to_string();
        self
    }

    /// Click and scroll fail once `n` interactions have happened.
    pub(crate) fn failing_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    /// Interaction number `n` fails once with a transient script error.
    pub(crate) fn with_transient_failure(mut self, n: usize) -> Self {
        self.transient_at = Some(n);
        self
    }

    /// The body text only shows up once `n` interactions have happened.
    pub(crate) fn blocking_after(mut self, n: usize) -> Self {
        self.block_after = Some(n);
        self
    }

    /// Reading the item links always fails.
    pub(crate) fn with_failing_item_reads(mut self) -> Self {
        self.item_reads_broken = true;
        self
    }

    /// Document height in pixels, for bottom-of-page detection.
    pub(crate) fn with_page_height(mut self, px: f64) -> Self {
        self.page_height = px;
        self
    }

    /// Pad the serialized document by `bytes`.
    pub(crate) fn with_padding(mut self, bytes: usize) -> Self {
        self.padding = bytes;
        self
    }

    pub(crate) fn interactions(&self) -> Vec<Interaction> {
        self.interactions.lock().unwrap().clone()
    }

    pub(crate) fn serializations(&self) -> usize {
        self.serializations.load(Ordering::SeqCst)
    }

    fn count(&self) -> usize {
        match self.step.load(Ordering::SeqCst) {
            0 => self.initial,
            n => self
                .progression
                .get(n - 1)
                .or(self.progression.last())
                .copied()
                .unwrap_or(self.initial),
        }
    }

    fn shows_body_text(&self) -> bool {
        self.block_after.is_none_or(|n| self.step.load(Ordering::SeqCst) >= n)
    }

    fn url(i: usize) -> String {
        format!("https://shop.test/product/p{i}/")
    }

    fn interact(&self, kind: Interaction) -> Result<(), BrowserError> {
        let mut log = self.interactions.lock().unwrap();
        if self.fail_after.is_some_and(|n| log.len() >= n) {
            return Err(BrowserError::BrowserClosed);
        }
        if self.transient_at == Some(log.len()) && !self.flaked.swap(true, Ordering::SeqCst) {
            return Err(BrowserError::JsEvalFailed("node detached during reflow".into()));
        }
        log.push(kind);
        self.step.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl PageDriver for MockPage {
    async fn current_url(&self) -> Result<String, BrowserError> {
        Ok("https://shop.test/search?s=bag".into())
    }

    async fn selector_exists(&self, selector: &str) -> Result<bool, BrowserError> {
        Ok(self.container && selector == "h-grid-results")
    }

    async fn item_urls(&self, _item: &str, _link: &str) -> Result<Vec<String>, BrowserError> {
        if self.item_reads_broken {
            return Err(BrowserError::BrowserClosed);
        }
        Ok((0..self.count()).map(Self::url).collect())
    }

    async fn text_content(&self, selector: &str) -> Result<Vec<String>, BrowserError> {
        Ok(match (selector, self.total) {
            ("body", _) if !self.body_text.is_empty() && self.shows_body_text() => {
                vec![self.body_text.clone()]
            },
            (s, Some(total)) if s.contains("number-current-result") => vec![format!("({total})")],
            _ => Vec::new(),
        })
    }

    async fn load_more_control(
        &self,
        selectors: &[String],
    ) -> Result<Option<ControlState>, BrowserError> {
        Ok(self
            .load_more
            .then(|| selectors.first().cloned())
            .flatten()
            .map(|selector| ControlState {
                selector,
                visible: true,
                disabled: false,
            }))
    }

    async fn click(&self, _selector: &str) -> Result<bool, BrowserError> {
        self.interact(Interaction::Click)?;
        Ok(true)
    }

    async fn scroll_by(&self, px: u32) -> Result<ScrollPosition, BrowserError> {
        self.interact(Interaction::Scroll)?;
        Ok(ScrollPosition {
            scroll_y: f64::from(px) * self.step.load(Ordering::SeqCst) as f64,
            scroll_height: self.page_height,
            viewport_height: 1080.0,
        })
    }

    async fn serialize_document(&self) -> Result<String, BrowserError> {
        self.serializations.fetch_add(1, Ordering::SeqCst);
        let tiles: String = (0..self.count())
            .map(|i| {
                format!(
                    "<h-grid-result-item><a href=\"{}\"><h3>バッグ {i}</h3></a>\
                     <span class=\"price\">¥{},000</span></h-grid-result-item>",
                    Self::url(i),
                    100 + i
                )
            })
            .collect();
        Ok(format!(
            "<html><body><h-grid-results>{tiles}</h-grid-results><!--{}--></body></html>",
            " ".repeat(self.padding)
        ))
    }
}

/// Session double that counts teardown calls.
pub(crate) struct MockSession {
    page: Option<MockPage>,
    open_delay: Duration,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl BrowserSession for MockSession {
    fn id(&self) -> &str {
        "mock-session"
    }

    async fn open_page(&self, _url: &str, _timeout: Duration) -> Result<OpenedPage, BrowserError> {
        tokio::time::sleep(self.open_delay).await;
        let page = self
            .page
            .clone()
            .ok_or_else(|| BrowserError::NavigationError("connection refused".into()))?;
        Ok(OpenedPage {
            page: Box::new(page),
            load_complete: true,
        })
    }

    async fn close(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

pub(crate) struct MockLauncher {
    page: Option<MockPage>,
    fail_launch: bool,
    open_delay: Duration,
    pub(crate) closes: Arc<AtomicUsize>,
}

impl MockLauncher {
    pub(crate) fn serving(page: MockPage) -> Self {
        Self {
            page: Some(page),
            fail_launch: false,
            open_delay: Duration::ZERO,
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn unreachable_page() -> Self {
        Self {
            page: None,
            ..Self::serving(MockPage::grid(0, &[]))
        }
    }

    pub(crate) fn broken() -> Self {
        Self {
            fail_launch: true,
            ..Self::unreachable_page()
        }
    }

    pub(crate) fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = delay;
        self
    }

    pub(crate) fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionLauncher for MockLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, BrowserError> {
        if self.fail_launch {
            return Err(BrowserError::LaunchFailed("no chrome".into()));
        }
        Ok(Box::new(MockSession {
            page: self.page.clone(),
            open_delay: self.open_delay,
            closes: Arc::clone(&self.closes),
        }))
    }
}
