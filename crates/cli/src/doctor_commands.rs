//! `shelfscan doctor`: config validation, browser detection, output directory
//! health.
//!
//! Prints a structured report with `[ok]`, `[warn]`, `[fail]` or `[info]` per
//! item and exits non-zero when anything failed.

use std::path::{Path, PathBuf};

use {
    anyhow::Result,
    shelfscan_browser::detect::detect_browser,
    shelfscan_config::{Severity, ShelfscanConfig},
};

// ── ANSI helpers ────────────────────────────────────────────────────────────

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Ok,
    Warn,
    Fail,
    Info,
}

impl Status {
    fn label(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Warn => "warn",
            Self::Fail => "fail",
            Self::Info => "info",
        }
    }

    fn color(self) -> &'static str {
        match self {
            Self::Ok => GREEN,
            Self::Warn => YELLOW,
            Self::Fail => RED,
            Self::Info => CYAN,
        }
    }
}

impl From<Severity> for Status {
    fn from(s: Severity) -> Self {
        match s {
            Severity::Error => Self::Fail,
            Severity::Warning => Self::Warn,
        }
    }
}

struct CheckItem {
    status: Status,
    message: String,
}

struct Section {
    title: String,
    items: Vec<CheckItem>,
}

impl Section {
    fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            items: Vec::new(),
        }
    }

    fn push(&mut self, status: Status, message: impl Into<String>) {
        self.items.push(CheckItem {
            status,
            message: message.into(),
        });
    }
}

fn print_report(sections: &[Section]) -> (usize, usize) {
    let mut errors = 0usize;
    let mut warnings = 0usize;

    for section in sections {
        eprintln!("{BOLD}{}{RESET}", section.title);
        for item in &section.items {
            let color = item.status.color();
            let label = item.status.label();
            eprintln!("  [{color}{label}{RESET}]  {}", item.message);
            match item.status {
                Status::Fail => errors += 1,
                Status::Warn => warnings += 1,
                _ => {},
            }
        }
        eprintln!();
    }

    (errors, warnings)
}

// ── Entry point ─────────────────────────────────────────────────────────────

pub fn handle_doctor(config_path: Option<PathBuf>, output_dir: Option<PathBuf>) -> Result<()> {
    eprintln!("{BOLD}shelfscan doctor{RESET}");
    eprintln!("{BOLD}================{RESET}\n");

    let path = config_path.or_else(shelfscan_config::find_config_file);
    let (config_section, config) = check_config(path.as_deref());
    let out = output_dir.unwrap_or_else(|| config.output.dir.clone());

    let sections = vec![config_section, check_browser(&config), check_output_dir(&out)];
    let (errors, warnings) = print_report(&sections);

    eprintln!("{BOLD}Summary:{RESET} {errors} error(s), {warnings} warning(s)");

    if errors > 0 {
        std::process::exit(1);
    }
    Ok(())
}

// ── Checks ──────────────────────────────────────────────────────────────────

/// Load and validate the config. Falls back to defaults so later checks can
/// still run.
fn check_config(path: Option<&Path>) -> (Section, ShelfscanConfig) {
    let label = path
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "defaults".into());
    let mut section = Section::new(format!("Config ({label})"));

    let config = match path {
        Some(p) => match shelfscan_config::load_config(p) {
            Ok(cfg) => {
                section.push(Status::Ok, "Config file parsed");
                cfg
            },
            Err(e) => {
                section.push(Status::Fail, format!("{e:#}"));
                return (section, ShelfscanConfig::default());
            },
        },
        None => {
            section.push(Status::Info, "No config file found (using defaults)");
            ShelfscanConfig::default()
        },
    };

    let result = shelfscan_config::validate(&config);
    if result.diagnostics.is_empty() {
        section.push(Status::Ok, "All values valid");
    }
    for d in &result.diagnostics {
        section.push(d.severity.into(), format!("{}: {}", d.path, d.message));
    }

    (section, config)
}

fn check_browser(config: &ShelfscanConfig) -> Section {
    let mut section = Section::new("Browser");
    let detection = detect_browser(config.browser.chrome_path.as_deref());

    match (detection.path, detection.source) {
        (Some(path), Some(source)) if detection.found => {
            section.push(
                Status::Ok,
                format!("Chromium found: {} ({source})", path.display()),
            );
        },
        _ => {
            section.push(Status::Fail, "No Chromium-based browser found");
            for line in detection.install_hint.lines().filter(|l| !l.trim().is_empty()) {
                section.push(Status::Info, line.trim().to_string());
            }
        },
    }

    section.push(
        Status::Info,
        format!(
            "headless={} stealth={} viewport={}x{}",
            config.browser.headless,
            config.browser.stealth,
            config.browser.viewport_width,
            config.browser.viewport_height
        ),
    );
    section
}

fn check_output_dir(dir: &Path) -> Section {
    let mut section = Section::new("Output");

    if !dir.exists() {
        section.push(
            Status::Info,
            format!("{} not found (created on first scrape)", dir.display()),
        );
        return section;
    }
    if !dir.is_dir() {
        section.push(Status::Fail, format!("{} is not a directory", dir.display()));
        return section;
    }

    let marker = dir.join(".shelfscan-doctor-write-check");
    match std::fs::write(&marker, b"ok") {
        Ok(()) => {
            let _ = std::fs::remove_file(&marker);
            section.push(Status::Ok, format!("{} is writable", dir.display()));
        },
        Err(e) => {
            section.push(Status::Fail, format!("{} is not writable: {e}", dir.display()));
        },
    }
    section
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_maps_to_status() {
        assert_eq!(Status::from(Severity::Error), Status::Fail);
        assert_eq!(Status::from(Severity::Warning), Status::Warn);
    }

    #[test]
    fn print_report_counts_errors_and_warnings() {
        let mut section = Section::new("test");
        section.push(Status::Ok, "fine");
        section.push(Status::Warn, "caution");
        section.push(Status::Warn, "caution2");
        section.push(Status::Fail, "broken");
        section.push(Status::Info, "note");

        let (errors, warnings) = print_report(&[section]);
        assert_eq!(errors, 1);
        assert_eq!(warnings, 2);
    }

    #[test]
    fn defaults_validate_cleanly() {
        let (section, _) = check_config(None);
        assert!(section.items.iter().all(|i| i.status != Status::Fail));
    }

    #[test]
    fn broken_config_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shelfscan.toml");
        std::fs::write(&path, "[convergence\nmax_iterations = ").unwrap();

        let (section, config) = check_config(Some(&path));
        assert!(section.items.iter().any(|i| i.status == Status::Fail));
        assert_eq!(config.convergence.max_iterations, 15);
    }

    #[test]
    fn invalid_values_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shelfscan.toml");
        std::fs::write(&path, "[convergence]\nsuccess_ratio = 1.5\n").unwrap();

        let (section, _) = check_config(Some(&path));
        assert!(
            section
                .items
                .iter()
                .any(|i| i.status == Status::Fail && i.message.contains("convergence.success_ratio"))
        );
    }

    #[test]
    fn writable_output_dir_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let section = check_output_dir(dir.path());
        assert_eq!(section.items.len(), 1);
        assert_eq!(section.items[0].status, Status::Ok);
        assert!(!dir.path().join(".shelfscan-doctor-write-check").exists());
    }

    #[test]
    fn missing_output_dir_is_informational() {
        let dir = tempfile::tempdir().unwrap();
        let section = check_output_dir(&dir.path().join("out"));
        assert_eq!(section.items[0].status, Status::Info);
    }
}
