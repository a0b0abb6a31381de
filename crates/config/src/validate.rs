//! Semantic validation of a loaded configuration.
//!
//! Parsing already guarantees the shape; this checks values that parse fine
//! but would make a run meaningless (zero iterations, ratios above 1, regexes
//! that do not compile).

use regex::Regex;

use crate::schema::ShelfscanConfig;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted path, e.g. "convergence.success_ratio"
    pub path: String,
    pub message: String,
}

/// Result of validating a configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    fn error(&mut self, path: &str, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity: Severity::Error,
            path: path.to_string(),
            message: message.into(),
        });
    }

    fn warning(&mut self, path: &str, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            path: path.to_string(),
            message: message.into(),
        });
    }
}

/// Validate a configuration.
#[must_use]
pub fn validate(config: &ShelfscanConfig) -> ValidationResult {
    let mut result = ValidationResult::default();
    let conv = &config.convergence;

    if !config.target.search_url_template.contains("{keyword}") {
        result.warning(
            "target.search_url_template",
            "template has no {keyword} placeholder; every keyword hits the same page",
        );
    }
    if url::Url::parse(&config.target.search_url_template.replace("{keyword}", "x")).is_err() {
        result.error("target.search_url_template", "not a valid URL");
    }

    if conv.max_iterations == 0 {
        result.error("convergence.max_iterations", "must be at least 1");
    }
    if conv.container_poll_attempts == 0 {
        result.error("convergence.container_poll_attempts", "must be at least 1");
    }
    if conv.poll_interval_ms == 0 {
        result.error("convergence.poll_interval_ms", "must be greater than 0");
    }
    for (path, ratio) in [
        ("convergence.success_ratio", conv.success_ratio),
        ("convergence.accept_ratio", conv.accept_ratio),
    ] {
        if ratio <= 0.0 || ratio > 1.0 {
            result.error(path, format!("must be in (0, 1], got {ratio}"));
        }
    }
    if conv.accept_ratio > conv.success_ratio {
        result.warning(
            "convergence.accept_ratio",
            "greater than success_ratio; stalled runs can never count as converged",
        );
    }
    if conv.click_stall_threshold == 0 || conv.scroll_stall_threshold == 0 {
        result.error("convergence", "stall thresholds must be at least 1");
    }
    if conv.container_selectors.is_empty() {
        result.warning(
            "convergence.container_selectors",
            "empty; every run will be flagged container_missing",
        );
    }
    if conv.item_selector.trim().is_empty() {
        result.error("convergence.item_selector", "must not be empty");
    }
    for (i, p) in conv.count_patterns.iter().enumerate() {
        check_regex(
            &mut result,
            &format!("convergence.count_patterns[{i}].pattern"),
            &p.pattern,
        );
    }

    let parser = &config.parser;
    check_regex(
        &mut result,
        "parser.product_path_pattern",
        &parser.product_path_pattern,
    );
    check_regex(&mut result, "parser.price_pattern", &parser.price_pattern);
    if let Some(ref base) = parser.base_url
        && url::Url::parse(base).is_err()
    {
        result.error("parser.base_url", format!("not a valid URL: {base}"));
    }
    if parser.container_selectors.is_empty() {
        result.warning(
            "parser.container_selectors",
            "empty; only the link and pattern fallbacks will run",
        );
    }

    if config.browser.navigation_timeout_ms < 1_000 {
        result.warning(
            "browser.navigation_timeout_ms",
            "below one second; JS-heavy pages will time out",
        );
    }

    result
}

fn check_regex(result: &mut ValidationResult, path: &str, pattern: &str) {
    if let Err(e) = Regex::new(pattern) {
        result.error(path, format!("invalid regex: {e}"));
    }
}
