//! Run report aggregation.

use {
    serde::Serialize,
    shelfscan_parser::{ParseOutcome, ProductRecord, Strategy},
    tokio::time::Instant,
    tracing::info,
};

use crate::convergence::{ConvergenceOutcome, Terminal};

/// Final status of one harvest task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HarvestStatus {
    Converged,
    Partial,
    Blocked,
    Failed,
}

impl From<Terminal> for HarvestStatus {
    fn from(t: Terminal) -> Self {
        match t {
            Terminal::Converged => Self::Converged,
            Terminal::Partial => Self::Partial,
            Terminal::Blocked => Self::Blocked,
        }
    }
}

impl std::fmt::Display for HarvestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Converged => "CONVERGED",
            Self::Partial => "PARTIAL",
            Self::Blocked => "BLOCKED",
            Self::Failed => "FAILED",
        })
    }
}

/// Non-fatal conditions worth a second look.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    /// No grid container appeared before the poll budget ran out.
    ContainerMissing,
    /// The parser found nothing in the snapshot.
    NoRecords,
    /// The snapshot was under the size floor.
    SmallSnapshot,
    /// The initial page load outlived the navigation timeout.
    SlowNavigation,
}

impl ReasonCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ContainerMissing => "container_missing",
            Self::NoRecords => "no_records",
            Self::SmallSnapshot => "small_snapshot",
            Self::SlowNavigation => "slow_navigation",
        }
    }
}

/// Human-readable log of what a task did, kept next to the tracing events.
#[derive(Debug, Clone)]
pub struct Trail {
    started: Instant,
    lines: Vec<String>,
}

impl Default for Trail {
    fn default() -> Self {
        Self {
            started: Instant::now(),
            lines: Vec::new(),
        }
    }
}

impl Trail {
    pub fn note(&mut self, line: impl Into<String>) {
        let line = line.into();
        let secs = self.started.elapsed().as_secs_f64();
        info!(elapsed_secs = secs, "{line}");
        self.lines.push(format!("[{secs:7.1}s] {line}"));
    }

    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    #[must_use]
    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }
}

/// Everything known about one harvest task.
#[derive(Debug, Clone, Serialize)]
pub struct HarvestReport {
    pub run_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    pub url: String,
    pub status: HarvestStatus,
    pub container_found: bool,
    pub target_count: Option<usize>,
    pub observed_count: usize,
    pub coverage: Option<f64>,
    pub iterations: u32,
    /// Parser strategy that produced the records.
    pub source: Option<Strategy>,
    pub records: Vec<ProductRecord>,
    pub reasons: Vec<ReasonCode>,
    pub trail: Vec<String>,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    pub snapshot: Option<String>,
    #[serde(skip)]
    pub midpoint_snapshot: Option<String>,
}

impl HarvestReport {
    /// One-line summary for terminal output.
    #[must_use]
    pub fn summary(&self) -> String {
        let coverage = match (self.target_count, self.coverage) {
            (Some(target), Some(c)) => format!("{}/{target} ({:.0}%)", self.observed_count, c * 100.0),
            _ => format!("{}/?", self.observed_count),
        };
        format!(
            "{status} {records} records, coverage {coverage}, {iters} iterations, {secs:.1}s",
            status = self.status,
            records = self.records.len(),
            iters = self.iterations,
            secs = self.elapsed_ms as f64 / 1000.0,
        )
    }
}

/// Collects the pieces of a run as they become available.
#[derive(Debug)]
pub struct Reporter {
    run_id: String,
    keyword: Option<String>,
    url: String,
    convergence: Option<ConvergenceOutcome>,
    parsed: Option<ParseOutcome>,
    snapshot: Option<String>,
    reasons: Vec<ReasonCode>,
    error: Option<String>,
}

impl Reporter {
    pub fn new(run_id: impl Into<String>, url: impl Into<String>, keyword: Option<String>) -> Self {
        Self {
            run_id: run_id.into(),
            keyword,
            url: url.into(),
            convergence: None,
            parsed: None,
            snapshot: None,
            reasons: Vec::new(),
            error: None,
        }
    }

    pub fn flag(&mut self, reason: ReasonCode) {
        if !self.reasons.contains(&reason) {
            self.reasons.push(reason);
        }
    }

    pub fn convergence(&mut self, outcome: ConvergenceOutcome) {
        if !outcome.container_found {
            self.flag(ReasonCode::ContainerMissing);
        }
        self.convergence = Some(outcome);
    }

    pub fn snapshot(&mut self, html: String) {
        self.snapshot = Some(html);
    }

    pub fn parsed(&mut self, outcome: ParseOutcome) {
        if outcome.records.is_empty() {
            self.flag(ReasonCode::NoRecords);
        }
        self.parsed = Some(outcome);
    }

    pub fn fail(&mut self, error: impl std::fmt::Display) {
        self.error = Some(error.to_string());
    }

    /// Build the report. A recorded error makes the status `FAILED`,
    /// otherwise the convergence verdict stands.
    pub fn finish(self, trail: Trail, elapsed_ms: u64) -> HarvestReport {
        let conv = self.convergence;
        let status = match (&self.error, &conv) {
            (Some(_), _) | (None, None) => HarvestStatus::Failed,
            (None, Some(c)) => c.terminal.into(),
        };
        let (records, source) = match self.parsed {
            Some(p) => (p.records, Some(p.strategy)),
            None => (Vec::new(), None),
        };

        HarvestReport {
            run_id: self.run_id,
            keyword: self.keyword,
            url: self.url,
            status,
            container_found: conv.as_ref().is_some_and(|c| c.container_found),
            target_count: conv.as_ref().and_then(|c| c.target_count),
            observed_count: conv.as_ref().map_or(0, |c| c.observed_count),
            coverage: conv.as_ref().and_then(|c| c.coverage),
            iterations: conv.as_ref().map_or(0, |c| c.iterations),
            source,
            records,
            reasons: self.reasons,
            trail: trail.into_lines(),
            elapsed_ms,
            error: self.error,
            snapshot: self.snapshot,
            midpoint_snapshot: conv.and_then(|c| c.midpoint_html),
        }
    }
}
