//! Browser session lifecycle: launch, navigate, close.

use std::time::Duration;

use {
    async_trait::async_trait,
    chromiumoxide::{
        Browser, BrowserConfig as CdpBrowserConfig,
        cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams,
        error::CdpError, handler::viewport::Viewport,
    },
    futures::StreamExt,
    rand::seq::IndexedRandom,
    shelfscan_config::BrowserConfig,
    tokio::{task::JoinHandle, time::Instant},
    tracing::{debug, info, warn},
};

use crate::{
    error::BrowserError,
    page::{CdpPage, PageDriver},
    types::{is_domain_allowed, validate_url},
};

/// Desktop Chrome user agents, one picked per session when none is configured.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
];

/// Flags that hide the most obvious automation fingerprints.
const STEALTH_ARGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--exclude-switches=enable-automation",
    "--disable-extensions",
];

/// Injected before any page script runs.
const STEALTH_SCRIPT: &str = r#"
Object.defineProperty(navigator, 'webdriver', { get: () => undefined, configurable: true });
if (!window.chrome) { window.chrome = {}; }
if (!window.chrome.runtime) { window.chrome.runtime = {}; }
Object.defineProperty(navigator, 'languages', { get: () => ['ja-JP', 'ja', 'en-US', 'en'], configurable: true });
Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3, 4, 5], configurable: true });
"#;

/// Starts browser sessions. One session per harvest task.
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, BrowserError>;
}

/// A live browser process.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    fn id(&self) -> &str;

    /// Open a new page on `url`.
    ///
    /// Fails with [`BrowserError::NavigationTimeout`] only when no page handle
    /// exists within `timeout`. A page whose load is still running at the
    /// deadline is returned with `load_complete = false`.
    async fn open_page(&self, url: &str, timeout: Duration) -> Result<OpenedPage, BrowserError>;

    /// Tear the browser down. Never fails; problems are logged.
    async fn close(&mut self);
}

/// A freshly navigated page.
pub struct OpenedPage {
    pub page: Box<dyn PageDriver>,
    /// Whether the initial load finished before the navigation deadline.
    pub load_complete: bool,
}

/// Launches a local Chromium through chromiumoxide.
#[derive(Debug, Clone)]
pub struct ChromeLauncher {
    config: BrowserConfig,
}

impl ChromeLauncher {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }

    fn user_agent(&self) -> String {
        self.config
            .user_agent
            .clone()
            .or_else(|| USER_AGENTS.choose(&mut rand::rng()).map(|ua| (*ua).to_string()))
            .unwrap_or_default()
    }

    fn cdp_config(&self, user_agent: &str) -> Result<CdpBrowserConfig, BrowserError> {
        let mut builder = CdpBrowserConfig::builder();

        // chromiumoxide defaults to headless
        if !self.config.headless {
            builder = builder.with_head();
        }

        builder = builder
            .viewport(Viewport {
                width: self.config.viewport_width,
                height: self.config.viewport_height,
                device_scale_factor: None,
                emulating_mobile: false,
                is_landscape: true,
                has_touch: false,
            })
            .window_size(self.config.viewport_width, self.config.viewport_height)
            .request_timeout(Duration::from_millis(self.config.navigation_timeout_ms));

        if !user_agent.is_empty() {
            builder = builder.arg(format!("--user-agent={user_agent}"));
        }

        if let Some(ref path) = self.config.chrome_path {
            builder = builder.chrome_executable(path);
        }

        if self.config.stealth {
            for arg in STEALTH_ARGS {
                builder = builder.arg(*arg);
            }
        }

        for arg in &self.config.chrome_args {
            builder = builder.arg(arg);
        }

        builder = builder
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--no-sandbox")
            .arg("--disable-setuid-sandbox");

        builder
            .build()
            .map_err(|e| BrowserError::LaunchFailed(format!("failed to build browser config: {e}")))
    }
}

#[async_trait]
impl SessionLauncher for ChromeLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, BrowserError> {
        let detection = crate::detect::detect_browser(self.config.chrome_path.as_deref());
        if !detection.found {
            return Err(BrowserError::BrowserNotAvailable(detection.install_hint));
        }

        let user_agent = self.user_agent();
        let config = self.cdp_config(&user_agent)?;

        let (browser, mut handler) = Browser::launch(config).await.map_err(|e| {
            let install_hint = crate::detect::install_instructions();
            BrowserError::LaunchFailed(format!("{e}\n\n{install_hint}"))
        })?;

        let session_id = generate_session_id();
        let sid = session_id.clone();
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(session_id = sid, error = %e, "browser handler event error");
                }
            }
            debug!(session_id = sid, "browser event handler exited");
        });

        info!(
            session_id,
            headless = self.config.headless,
            stealth = self.config.stealth,
            user_agent,
            path = ?detection.path,
            "launched browser"
        );

        Ok(Box::new(ChromeSession {
            id: session_id,
            browser: Some(browser),
            handler_task: Some(handler_task),
            allowed_domains: self.config.allowed_domains.clone(),
            stealth: self.config.stealth,
        }))
    }
}

/// A running chromiumoxide browser.
pub struct ChromeSession {
    id: String,
    browser: Option<Browser>,
    handler_task: Option<JoinHandle<()>>,
    allowed_domains: Vec<String>,
    stealth: bool,
}

#[async_trait]
impl BrowserSession for ChromeSession {
    fn id(&self) -> &str {
        &self.id
    }

    async fn open_page(&self, url: &str, timeout: Duration) -> Result<OpenedPage, BrowserError> {
        validate_url(url)?;
        if !is_domain_allowed(url, &self.allowed_domains) {
            return Err(BrowserError::DomainNotAllowed(format!(
                "{url} (allowed: {:?})",
                self.allowed_domains
            )));
        }

        let browser = self.browser.as_ref().ok_or(BrowserError::BrowserClosed)?;
        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        let deadline = Instant::now() + timeout;

        let page = match tokio::time::timeout_at(deadline, browser.new_page("about:blank")).await {
            Ok(Ok(page)) => page,
            Ok(Err(CdpError::Timeout)) | Err(_) => {
                warn!(session_id = self.id, url, timeout_ms, "no page handle before deadline");
                return Err(BrowserError::NavigationTimeout(timeout_ms));
            },
            Ok(Err(e)) => return Err(BrowserError::NavigationError(e.to_string())),
        };

        if self.stealth {
            page.execute(AddScriptToEvaluateOnNewDocumentParams::new(STEALTH_SCRIPT))
                .await
                .map_err(|e| BrowserError::NavigationError(e.to_string()))?;
        }

        let load = async {
            page.goto(url).await?;
            page.wait_for_navigation().await?;
            Ok::<_, CdpError>(())
        };
        let load_complete = match tokio::time::timeout_at(deadline, load).await {
            Ok(Ok(())) => true,
            Ok(Err(CdpError::Timeout)) | Err(_) => {
                warn!(
                    session_id = self.id,
                    url, timeout_ms, "page load still running at deadline, continuing"
                );
                false
            },
            Ok(Err(e)) => return Err(BrowserError::NavigationError(e.to_string())),
        };

        info!(session_id = self.id, url, load_complete, "navigated");
        Ok(OpenedPage {
            page: Box::new(CdpPage::new(page)),
            load_complete,
        })
    }

    async fn close(&mut self) {
        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                warn!(session_id = self.id, error = %e, "failed to close browser");
            }
            if let Err(e) = browser.wait().await {
                warn!(session_id = self.id, error = %e, "failed to reap browser process");
            }
        }
        if let Some(task) = self.handler_task.take() {
            task.abort();
        }
        info!(session_id = self.id, "closed browser session");
    }
}

/// Generate a random session ID.
fn generate_session_id() -> String {
    use rand::Rng;
    let id: u64 = rand::rng().random();
    format!("browser-{id:016x}")
}
