//! Browser detection and install guidance.

use std::path::{Path, PathBuf};

/// Chromium-based executable names searched on `PATH`. All speak CDP.
const CHROMIUM_EXECUTABLES: &[&str] = &[
    "chrome",
    "chrome-browser",
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
    "msedge",
    "microsoft-edge",
    "microsoft-edge-stable",
    "brave",
    "brave-browser",
];

#[cfg(target_os = "macos")]
const PLATFORM_PATHS: &[&str] = &[
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
    "/Applications/Brave Browser.app/Contents/MacOS/Brave Browser",
];

#[cfg(target_os = "windows")]
const PLATFORM_PATHS: &[&str] = &[
    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
];

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
const PLATFORM_PATHS: &[&str] = &[];

/// Where a browser executable was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionSource {
    /// `browser.chrome_path` in the config.
    Configured,
    /// The `CHROME` environment variable.
    Environment,
    /// A well-known install location.
    Platform,
    /// An executable name on `PATH`.
    SearchPath,
}

impl std::fmt::Display for DetectionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Configured => "config",
            Self::Environment => "CHROME env",
            Self::Platform => "install path",
            Self::SearchPath => "PATH",
        })
    }
}

/// Result of browser detection.
#[derive(Debug, Clone)]
pub struct DetectionResult {
    pub found: bool,
    pub path: Option<PathBuf>,
    pub source: Option<DetectionSource>,
    /// Platform-specific install instructions, empty when found.
    pub install_hint: String,
}

impl DetectionResult {
    fn found(path: PathBuf, source: DetectionSource) -> Self {
        Self {
            found: true,
            path: Some(path),
            source: Some(source),
            install_hint: String::new(),
        }
    }
}

/// Locate a Chromium-based browser.
///
/// Checks, in order: the configured path, the `CHROME` environment variable,
/// platform install locations, then known executable names on `PATH`.
/// Install locations come before `PATH` because `PATH` may hold stale
/// wrapper scripts.
pub fn detect_browser(custom_path: Option<&str>) -> DetectionResult {
    if let Some(p) = custom_path.map(PathBuf::from).filter(|p| p.exists()) {
        return DetectionResult::found(p, DetectionSource::Configured);
    }

    if let Some(p) = std::env::var_os("CHROME")
        .map(PathBuf::from)
        .filter(|p| p.exists())
    {
        return DetectionResult::found(p, DetectionSource::Environment);
    }

    if let Some(p) = PLATFORM_PATHS.iter().map(Path::new).find(|p| p.exists()) {
        return DetectionResult::found(p.to_path_buf(), DetectionSource::Platform);
    }

    if let Some(p) = CHROMIUM_EXECUTABLES
        .iter()
        .find_map(|name| which::which(name).ok())
    {
        return DetectionResult::found(p, DetectionSource::SearchPath);
    }

    DetectionResult {
        found: false,
        path: None,
        source: None,
        install_hint: install_instructions(),
    }
}

/// Platform-specific install instructions.
pub fn install_instructions() -> String {
    let instructions = if cfg!(target_os = "macos") {
        "  brew install --cask google-chrome"
    } else if cfg!(target_os = "linux") {
        "  Debian/Ubuntu: sudo apt install chromium\n  \
         Fedora:        sudo dnf install chromium\n  \
         Arch:          sudo pacman -S chromium"
    } else if cfg!(target_os = "windows") {
        "  winget install Google.Chrome"
    } else {
        "  Download from https://www.google.com/chrome/"
    };

    format!(
        "No Chromium-based browser found. Install one:\n\n\
         {instructions}\n\n\
         Or point shelfscan at an existing binary:\n  \
         [browser]\n  \
         chrome_path = \"/path/to/chrome\"\n\n\
         Or set the CHROME environment variable."
    )
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_instructions_mention_config_key() {
        let hint = install_instructions();
        assert!(hint.contains("chrome_path"));

        #[cfg(target_os = "linux")]
        assert!(hint.contains("apt") || hint.contains("dnf") || hint.contains("pacman"));
    }

    #[test]
    fn configured_path_takes_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("fake-chrome");
        std::fs::write(&fake, "").unwrap();

        let result = detect_browser(Some(fake.to_str().unwrap()));
        assert!(result.found);
        assert_eq!(result.source, Some(DetectionSource::Configured));
        assert_eq!(result.path.as_deref(), Some(fake.as_path()));
    }

    #[test]
    fn missing_configured_path_falls_through() {
        let result = detect_browser(Some("/nonexistent/chrome"));
        assert_ne!(result.source, Some(DetectionSource::Configured));
        assert!(result.found || !result.install_hint.is_empty());
    }

    #[test]
    fn executable_list_covers_chrome_and_chromium() {
        assert!(CHROMIUM_EXECUTABLES.contains(&"google-chrome"));
        assert!(CHROMIUM_EXECUTABLES.contains(&"chromium"));
    }
}
