//! The incremental-loading loop.
//!
//! Listing pages render a first batch of tiles and load the rest on demand,
//! either behind a "load more" control or on scroll. The engine drives both
//! mechanisms until the de-duplicated item count reaches the advertised total,
//! stops growing, or the iteration bound is hit.
//!
//! ```text
//! WAITING_FOR_CONTAINER -> DETECTING_TARGET_COUNT -> CONVERGING
//!                                                     |-> CONVERGED
//!                                                     |-> PARTIAL
//!                                                     `-> BLOCKED
//! ```

use std::time::Duration;

use {
    serde::Serialize,
    shelfscan_browser::PageDriver,
    shelfscan_config::ConvergenceConfig,
    tokio::time::{Instant, sleep},
    tracing::{debug, warn},
};

use crate::{
    detect::{TotalPattern, find_block_marker, read_target_count},
    error::{HarvestError, Result},
    report::Trail,
    state::{LoadMode, LoadState},
};

/// Coverage at which the optional midpoint snapshot is taken.
const MIDPOINT_RATIO: f64 = 0.5;

/// How the loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Terminal {
    Converged,
    Partial,
    Blocked,
}

/// Result of one convergence run.
#[derive(Debug, Clone)]
pub struct ConvergenceOutcome {
    pub terminal: Terminal,
    pub container_found: bool,
    /// The candidate container selector that matched first.
    pub container_selector: Option<String>,
    pub target_count: Option<usize>,
    pub observed_count: usize,
    pub coverage: Option<f64>,
    pub iterations: u32,
    /// Document captured when coverage first passed half the target.
    pub midpoint_html: Option<String>,
    /// A load step failed for good; the counts above are what was seen
    /// before it.
    pub interrupted: Option<String>,
}

enum Action {
    Click(String),
    Scroll,
}

#[derive(Default)]
struct Step {
    grew: bool,
    at_bottom: bool,
}

/// Drives a page until its listing is fully loaded.
#[derive(Debug, Clone)]
pub struct ConvergenceEngine {
    config: ConvergenceConfig,
    patterns: Vec<TotalPattern>,
}

impl ConvergenceEngine {
    pub fn new(config: ConvergenceConfig) -> Result<Self> {
        let patterns = config
            .count_patterns
            .iter()
            .map(TotalPattern::compile)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { config, patterns })
    }

    #[must_use]
    pub fn config(&self) -> &ConvergenceConfig {
        &self.config
    }

    /// Run the state machine on `page`. Every wait inside is bounded.
    pub async fn run(&self, page: &dyn PageDriver, trail: &mut Trail) -> Result<ConvergenceOutcome> {
        let cfg = &self.config;
        let mut state = LoadState::default();
        let mut midpoint_html = None;

        let container_selector = self.wait_for_container(page).await?;
        match container_selector {
            Some(ref selector) => trail.note(format!("container found: {selector}")),
            None => trail.note(format!(
                "no container after {} polls, continuing",
                cfg.container_poll_attempts
            )),
        }

        self.observe(page, &mut state).await?;
        state.target_count = read_target_count(page, &self.patterns, state.observed_count).await?;
        match state.target_count {
            Some(target) => trail.note(format!(
                "target count {target}, {} visible",
                state.observed_count
            )),
            None => trail.note(format!(
                "target count unknown, {} visible",
                state.observed_count
            )),
        }

        let finish = |terminal: Terminal, state: &LoadState, midpoint_html: Option<String>| {
            ConvergenceOutcome {
                terminal,
                container_found: container_selector.is_some(),
                container_selector: container_selector.clone(),
                target_count: state.target_count,
                observed_count: state.observed_count,
                coverage: state.coverage(),
                iterations: state.attempt,
                midpoint_html,
                interrupted: None,
            }
        };

        if let Some(marker) = find_block_marker(page, cfg).await? {
            trail.note(format!("bot interstitial detected ({marker})"));
            return Ok(finish(Terminal::Blocked, &state, midpoint_html));
        }

        if state.covers(cfg.success_ratio) {
            trail.note("target already covered on first render");
            return Ok(finish(Terminal::Converged, &state, midpoint_html));
        }

        while state.attempt < cfg.max_iterations {
            state.attempt += 1;

            let step = match self.load_step(page, &mut state, trail).await {
                Ok(step) => step,
                Err(HarvestError::Browser(e)) if e.is_transient() => {
                    warn!(
                        attempt = state.attempt,
                        error = %e,
                        "load step failed, counting as stall"
                    );
                    trail.note(format!("step {}: {e}, counted as stall", state.attempt));
                    Step::default()
                },
                Err(e) => {
                    warn!(
                        attempt = state.attempt,
                        error = %e,
                        "load step failed, keeping items seen so far"
                    );
                    trail.note(format!("step {}: {e}, stopping", state.attempt));
                    let mut out = finish(Terminal::Partial, &state, midpoint_html);
                    out.interrupted = Some(e.to_string());
                    return Ok(out);
                },
            };
            state.record_pass(step.grew);

            // Nothing new at the end of the document: no further scroll can help.
            if !step.grew && step.at_bottom && state.mode == LoadMode::Scroll {
                state.stall_streak = state.stall_streak.max(cfg.scroll_stall_threshold);
            }

            trail.note(format!(
                "step {}: {} -> {} items{}{}",
                state.attempt,
                state.mode,
                state.observed_count,
                state
                    .target_count
                    .map(|t| format!(" of {t}"))
                    .unwrap_or_default(),
                match (step.grew, step.at_bottom) {
                    (true, _) => String::new(),
                    (false, true) => ", page bottom".to_string(),
                    (false, false) => format!(", stall {}", state.stall_streak),
                },
            ));

            if cfg.capture_midpoint
                && !state.midpoint_captured
                && state.covers(MIDPOINT_RATIO)
            {
                state.midpoint_captured = true;
                match page.serialize_document().await {
                    Ok(html) => {
                        trail.note(format!("midpoint snapshot captured ({} bytes)", html.len()));
                        midpoint_html = Some(html);
                    },
                    Err(e) => warn!(error = %e, "midpoint snapshot failed"),
                }
            }

            if state.covers(cfg.success_ratio) {
                trail.note("target coverage reached");
                return Ok(finish(Terminal::Converged, &state, midpoint_html));
            }

            let threshold = match state.mode {
                LoadMode::Click => cfg.click_stall_threshold,
                LoadMode::Scroll => cfg.scroll_stall_threshold,
            };
            if state.stall_streak >= threshold {
                if state.mode == LoadMode::Click && cfg.scroll_after_click {
                    trail.note("load-more control stalled, switching to scroll");
                    state.enter_scroll_phase();
                } else {
                    let terminal = self.verdict(&state);
                    trail.note(format!("count settled, {terminal:?}"));
                    return Ok(finish(terminal, &state, midpoint_html));
                }
            }

            match find_block_marker(page, cfg).await {
                Ok(Some(marker)) => {
                    trail.note(format!("bot interstitial detected ({marker})"));
                    return Ok(finish(Terminal::Blocked, &state, midpoint_html));
                },
                Ok(None) => {},
                Err(e) => warn!(attempt = state.attempt, error = %e, "block marker check failed"),
            }
        }

        trail.note(format!(
            "iteration bound {} reached, coverage {}",
            cfg.max_iterations,
            state
                .coverage()
                .map(|c| format!("{:.1}%", c * 100.0))
                .unwrap_or_else(|| "unknown".into())
        ));
        Ok(finish(Terminal::Partial, &state, midpoint_html))
    }

    /// One click or scroll plus the bounded wait for new items.
    async fn load_step(
        &self,
        page: &dyn PageDriver,
        state: &mut LoadState,
        trail: &mut Trail,
    ) -> Result<Step> {
        let cfg = &self.config;
        match self.next_action(page, state, trail).await? {
            Action::Click(selector) => {
                state.click_attempts += 1;
                let grew = if page.click(&selector).await? {
                    self.wait_for_growth(page, state, cfg.click_wait_ms).await?
                } else {
                    false
                };
                Ok(Step {
                    grew,
                    at_bottom: false,
                })
            },
            Action::Scroll => {
                let pos = page.scroll_by(cfg.scroll_step_px).await?;
                let grew = self.wait_for_growth(page, state, cfg.scroll_wait_ms).await?;
                debug!(at_bottom = pos.at_bottom(), scroll_y = pos.scroll_y, grew, "scrolled");
                Ok(Step {
                    grew,
                    at_bottom: pos.at_bottom(),
                })
            },
        }
    }

    /// Poll for the first candidate container selector.
    async fn wait_for_container(&self, page: &dyn PageDriver) -> Result<Option<String>> {
        let cfg = &self.config;
        let interval = Duration::from_millis(cfg.container_poll_interval_ms);
        for attempt in 0..cfg.container_poll_attempts {
            for selector in &cfg.container_selectors {
                if page.selector_exists(selector).await? {
                    debug!(selector, attempt, "container present");
                    return Ok(Some(selector.clone()));
                }
            }
            sleep(interval).await;
        }
        Ok(None)
    }

    async fn observe(&self, page: &dyn PageDriver, state: &mut LoadState) -> Result<usize> {
        let urls = page
            .item_urls(&self.config.item_selector, &self.config.item_link_selector)
            .await?;
        Ok(state.absorb(urls))
    }

    /// Poll the item count until it rises or `max_wait_ms` elapses.
    async fn wait_for_growth(
        &self,
        page: &dyn PageDriver,
        state: &mut LoadState,
        max_wait_ms: u64,
    ) -> Result<bool> {
        let deadline = Instant::now() + Duration::from_millis(max_wait_ms);
        let interval = Duration::from_millis(self.config.poll_interval_ms.max(1));
        loop {
            sleep(interval).await;
            if self.observe(page, state).await? > 0 {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
        }
    }

    /// Click while the click phase lasts, scroll otherwise.
    async fn next_action(
        &self,
        page: &dyn PageDriver,
        state: &mut LoadState,
        trail: &mut Trail,
    ) -> Result<Action> {
        if state.mode == LoadMode::Scroll {
            return Ok(Action::Scroll);
        }

        if state.click_attempts >= self.config.max_click_attempts {
            trail.note(format!(
                "{} load-more clicks used, switching to scroll",
                state.click_attempts
            ));
            state.enter_scroll_phase();
            return Ok(Action::Scroll);
        }

        match page.load_more_control(&self.config.load_more_selectors).await? {
            Some(control) if control.clickable() => Ok(Action::Click(control.selector)),
            control => {
                if state.click_attempts > 0 {
                    trail.note("load-more control gone, switching to scroll");
                } else if let Some(c) = control {
                    debug!(selector = %c.selector, visible = c.visible, disabled = c.disabled, "load-more control not clickable");
                }
                state.enter_scroll_phase();
                Ok(Action::Scroll)
            },
        }
    }

    /// Terminal state once the count has settled.
    fn verdict(&self, state: &LoadState) -> Terminal {
        match state.target_count {
            None => Terminal::Converged,
            Some(_) if state.covers(self.config.accept_ratio) => Terminal::Converged,
            Some(_) => Terminal::Partial,
        }
    }
}
