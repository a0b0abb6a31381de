//! One harvest task: launch, navigate, converge, snapshot, parse, report.

use std::{sync::Arc, time::Duration};

use {
    shelfscan_browser::{BrowserSession, PageDriver, SessionLauncher},
    shelfscan_config::ShelfscanConfig,
    shelfscan_parser::{ParseRules, parse_detailed},
    tokio::time::{Instant, sleep, timeout},
    tracing::{info, warn},
};

use crate::{
    convergence::ConvergenceEngine,
    error::{HarvestError, Result},
    report::{HarvestReport, ReasonCode, Reporter, Trail},
    snapshot,
};

/// Slack added on top of the summed wait budgets.
const BUDGET_SLACK: Duration = Duration::from_secs(30);

/// Runs harvest tasks. Each task gets its own browser session.
pub struct Harvester {
    launcher: Arc<dyn SessionLauncher>,
    config: ShelfscanConfig,
    engine: ConvergenceEngine,
    rules: ParseRules,
}

impl Harvester {
    pub fn new(launcher: Arc<dyn SessionLauncher>, config: ShelfscanConfig) -> Result<Self> {
        let engine = ConvergenceEngine::new(config.convergence.clone())?;
        let rules = ParseRules::from_config(&config.parser)?;
        Ok(Self {
            launcher,
            config,
            engine,
            rules,
        })
    }

    /// The search URL for `keyword`, form-encoded into the configured template.
    #[must_use]
    pub fn search_url(&self, keyword: &str) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(keyword.as_bytes()).collect();
        self.config
            .target
            .search_url_template
            .replace("{keyword}", &encoded)
    }

    /// Upper bound on one task's wall-clock time.
    #[must_use]
    pub fn task_budget(&self) -> Duration {
        let c = &self.config.convergence;
        let container_wait = c.container_poll_interval_ms * u64::from(c.container_poll_attempts);
        let per_iteration = c.click_wait_ms.max(c.scroll_wait_ms) + c.poll_interval_ms;
        Duration::from_millis(
            self.config.browser.navigation_timeout_ms
                + self.config.target.settle_ms
                + container_wait
                + u64::from(c.max_iterations) * per_iteration,
        ) + BUDGET_SLACK
    }

    pub async fn harvest_keyword(&self, keyword: &str) -> HarvestReport {
        let url = self.search_url(keyword);
        self.harvest(&url, Some(keyword.to_string())).await
    }

    pub async fn harvest_url(&self, url: &str) -> HarvestReport {
        self.harvest(url, None).await
    }

    /// Never fails: every outcome, including launch failure, is a report.
    async fn harvest(&self, url: &str, keyword: Option<String>) -> HarvestReport {
        let started = Instant::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        let mut trail = Trail::default();
        let mut reporter = Reporter::new(run_id.clone(), url, keyword);

        info!(run_id = %run_id, url, "starting harvest");

        match self.launcher.launch().await {
            Ok(mut session) => {
                trail.note(format!("browser session {} launched", session.id()));
                let budget = self.task_budget();
                let outcome = timeout(
                    budget,
                    self.drive(session.as_ref(), url, &mut reporter, &mut trail),
                )
                .await
                .unwrap_or_else(|_| Err(HarvestError::Timeout(budget.as_millis() as u64)));

                if let Err(e) = outcome {
                    let transient = matches!(&e, HarvestError::Browser(b) if b.is_transient())
                        || matches!(e, HarvestError::Timeout(_));
                    warn!(run_id = %run_id, error = %e, transient, "harvest failed");
                    trail.note(format!("failed: {e}"));
                    reporter.fail(e);
                }
                session.close().await;
                trail.note("browser session closed");
            },
            Err(e) => {
                warn!(run_id = %run_id, error = %e, "browser launch failed");
                trail.note(format!("launch failed: {e}"));
                reporter.fail(e);
            },
        }

        let report = reporter.finish(trail, started.elapsed().as_millis() as u64);
        info!(
            run_id = %run_id,
            status = %report.status,
            records = report.records.len(),
            elapsed_ms = report.elapsed_ms,
            "harvest finished"
        );
        report
    }

    async fn drive(
        &self,
        session: &dyn BrowserSession,
        url: &str,
        reporter: &mut Reporter,
        trail: &mut Trail,
    ) -> Result<()> {
        let nav_timeout = Duration::from_millis(self.config.browser.navigation_timeout_ms);
        let opened = session.open_page(url, nav_timeout).await?;
        if opened.load_complete {
            trail.note(format!("navigated to {url}"));
        } else {
            reporter.flag(ReasonCode::SlowNavigation);
            trail.note(format!("navigation to {url} still loading, continuing"));
        }
        let page = opened.page;
        match page.current_url().await {
            Ok(landed) if landed != url => trail.note(format!("redirected to {landed}")),
            Ok(_) => {},
            Err(e) => warn!(error = %e, "could not read page url"),
        }

        sleep(Duration::from_millis(self.config.target.settle_ms)).await;

        let failure = match self.engine.run(page.as_ref(), trail).await {
            Ok(outcome) => {
                let interrupted = outcome.interrupted.clone().map(HarvestError::Interrupted);
                reporter.convergence(outcome);
                interrupted
            },
            Err(e) => {
                warn!(error = %e, "convergence aborted");
                trail.note(format!("convergence aborted: {e}, keeping what is on screen"));
                Some(e)
            },
        };

        // Whatever loaded before a failure is still worth parsing.
        match self.extract(page.as_ref(), reporter, trail).await {
            Ok(()) => {},
            Err(e) if failure.is_some() => {
                warn!(error = %e, "snapshot after failed convergence also failed");
            },
            Err(e) => return Err(e),
        }
        failure.map_or(Ok(()), Err)
    }

    async fn extract(
        &self,
        page: &dyn PageDriver,
        reporter: &mut Reporter,
        trail: &mut Trail,
    ) -> Result<()> {
        let html = match snapshot::capture(page, self.engine.config().min_snapshot_bytes).await {
            Ok(html) => html,
            Err(HarvestError::EmptySnapshot { bytes, min, html }) => {
                warn!(bytes, min, "snapshot smaller than expected");
                reporter.flag(ReasonCode::SmallSnapshot);
                trail.note(format!("snapshot only {bytes} bytes, parsing anyway"));
                html
            },
            Err(e) => return Err(e),
        };

        let parsed = parse_detailed(&html, &self.rules);
        trail.note(format!(
            "parsed {} records via {} strategy",
            parsed.records.len(),
            parsed.strategy
        ));
        reporter.parsed(parsed);
        reporter.snapshot(html);
        Ok(())
    }
}
