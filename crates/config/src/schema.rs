//! Config schema types (browser, target, convergence, parser, output).
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShelfscanConfig {
    pub browser: BrowserConfig,
    pub target: TargetConfig,
    pub convergence: ConvergenceConfig,
    pub parser: ParserConfig,
    pub output: OutputConfig,
}

/// Headless browser launch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Path to Chrome/Chromium binary (auto-detected if not set).
    pub chrome_path: Option<String>,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Navigation timeout in milliseconds.
    pub navigation_timeout_ms: u64,
    /// User agent string. When unset a realistic desktop UA is picked at
    /// random per session.
    pub user_agent: Option<String>,
    /// Pass the anti-automation flags to Chrome.
    pub stealth: bool,
    /// Additional Chrome arguments.
    pub chrome_args: Vec<String>,
    /// Allowed domains for navigation (empty = all allowed).
    pub allowed_domains: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            chrome_path: None,
            headless: true,
            viewport_width: 1920,
            viewport_height: 1080,
            navigation_timeout_ms: 45_000,
            user_agent: None,
            stealth: true,
            chrome_args: Vec::new(),
            allowed_domains: Vec::new(),
        }
    }
}

/// Where to scrape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Search page URL; `{keyword}` is replaced by the percent-encoded keyword.
    pub search_url_template: String,
    pub default_keyword: String,
    /// Fixed delay after navigation before the DOM is queried.
    pub settle_ms: u64,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            search_url_template: "https://www.hermes.com/jp/ja/search/?s={keyword}".into(),
            default_keyword: "バッグ".into(),
            settle_ms: 10_000,
        }
    }
}

/// A `(selector, regex)` pair used to read the advertised result total.
///
/// The regex must have one capture group holding the number; thousands
/// separators are stripped before parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountPattern {
    pub selector: String,
    pub pattern: String,
}

/// Tuning for the incremental loading loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvergenceConfig {
    /// Candidate grid containers, checked in order.
    pub container_selectors: Vec<String>,
    pub container_poll_interval_ms: u64,
    pub container_poll_attempts: u32,
    /// One element per product tile.
    pub item_selector: String,
    /// Link inside a tile whose href is the identity key.
    pub item_link_selector: String,
    pub count_patterns: Vec<CountPattern>,
    /// Known "load more" controls, checked in order.
    pub load_more_selectors: Vec<String>,
    pub max_iterations: u32,
    pub max_click_attempts: u32,
    /// Upper bound on waiting for growth after a click.
    pub click_wait_ms: u64,
    /// Upper bound on waiting for growth after a scroll.
    pub scroll_wait_ms: u64,
    /// Count polling interval while waiting for growth.
    pub poll_interval_ms: u64,
    /// Scroll increment in pixels.
    pub scroll_step_px: u32,
    /// Coverage at which a known target counts as reached.
    pub success_ratio: f64,
    /// Minimum coverage for a stalled run to still count as converged.
    pub accept_ratio: f64,
    pub click_stall_threshold: u32,
    pub scroll_stall_threshold: u32,
    /// Continue with scrolling once the load-more control is exhausted.
    pub scroll_after_click: bool,
    /// Case-insensitive text markers of a bot interstitial.
    pub block_markers: Vec<String>,
    /// Selectors whose presence indicates a bot interstitial.
    pub block_selectors: Vec<String>,
    /// Capture an extra snapshot when coverage first passes 50%.
    pub capture_midpoint: bool,
    /// Snapshots below this size are flagged as suspicious.
    pub min_snapshot_bytes: usize,
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        Self {
            container_selectors: vec![
                "h-grid-results".into(),
                ".product-grid-list".into(),
                "[data-testid=\"product-grid\"]".into(),
                ".search-results".into(),
                "h-grid-result-item".into(),
            ],
            container_poll_interval_ms: 500,
            container_poll_attempts: 40,
            item_selector: "h-grid-result-item".into(),
            item_link_selector: "a[href]".into(),
            count_patterns: vec![
                CountPattern {
                    selector: "[data-testid=\"number-current-result\"], \
                               span.header-title-current-number-result"
                        .into(),
                    pattern: r"\((\d[\d,]*)\)".into(),
                },
                CountPattern {
                    selector: "body".into(),
                    pattern: r"(?i)(\d[\d,]*)\s*(?:items|results|products|件|点)".into(),
                },
            ],
            load_more_selectors: vec![
                "button[data-testid=\"Load more items\"]".into(),
                "h-call-to-action button".into(),
                "button[aria-label*=\"Load\"]".into(),
                "button[class*=\"load\"]".into(),
                "button[data-testid*=\"load\"]".into(),
            ],
            max_iterations: 15,
            max_click_attempts: 10,
            click_wait_ms: 8_000,
            scroll_wait_ms: 8_000,
            poll_interval_ms: 500,
            scroll_step_px: 15_000,
            success_ratio: 0.95,
            accept_ratio: 0.8,
            click_stall_threshold: 2,
            scroll_stall_threshold: 3,
            scroll_after_click: true,
            block_markers: vec![
                "captcha".into(),
                "verify you are human".into(),
                "are you a robot".into(),
                "unusual traffic".into(),
                "access denied".into(),
                "ロボットではありません".into(),
            ],
            block_selectors: vec![
                "iframe[src*=\"captcha\"]".into(),
                "#px-captcha".into(),
                ".g-recaptcha".into(),
                "#challenge-form".into(),
            ],
            capture_midpoint: false,
            min_snapshot_bytes: 50 * 1024,
        }
    }
}

/// Selectors and patterns for turning a snapshot into product records.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Relative product URLs are resolved against this.
    pub base_url: Option<String>,
    pub container_selectors: Vec<String>,
    pub link_selectors: Vec<String>,
    pub name_selectors: Vec<String>,
    pub price_selectors: Vec<String>,
    pub color_selectors: Vec<String>,
    /// Elements carrying a SKU, either as `data-sku` or as text.
    pub sku_selectors: Vec<String>,
    /// Regex matched against hrefs; group 1, when present, is the SKU.
    pub product_path_pattern: String,
    /// Text containing any of these is taken to be a product name.
    pub name_keywords: Vec<String>,
    pub price_pattern: String,
    /// Bound on raw-markup matches for the last-resort strategy.
    pub max_pattern_matches: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            base_url: Some("https://www.hermes.com".into()),
            container_selectors: vec![
                "h-grid-result-item".into(),
                "[data-testid=\"product-item\"]".into(),
                ".product-item".into(),
            ],
            link_selectors: vec!["a[id*=\"product-item-meta\"]".into(), "a[href]".into()],
            name_selectors: vec![
                "h3".into(),
                "h2".into(),
                ".product-item-name".into(),
                ".product-name".into(),
                ".product-title".into(),
                ".title".into(),
            ],
            price_selectors: vec![
                ".price".into(),
                ".product-item-price".into(),
                ".product-price".into(),
                ".amount".into(),
            ],
            color_selectors: vec![
                "[data-color]".into(),
                ".product-item-colors".into(),
                ".color".into(),
            ],
            sku_selectors: vec!["[data-sku]".into(), ".sku".into()],
            product_path_pattern: r"/product/([^/?#]+)".into(),
            name_keywords: vec![
                "財布".into(),
                "バッグ".into(),
                "ケリー".into(),
                "バーキン".into(),
                "《".into(),
                "》".into(),
            ],
            price_pattern: r"[¥$€£]\s?[\d,.]+".into(),
            max_pattern_matches: 20,
        }
    }
}

/// Artifact persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    /// File name prefix: `<prefix>_page_<ts>.html`, `<prefix>_products_<ts>.json`.
    pub file_prefix: String,
    /// Newest artifacts kept per kind (0 = keep everything).
    pub keep_latest: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            file_prefix: "shelfscan".into(),
            keep_latest: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_thresholds_match_tuned_values() {
        let cfg = ConvergenceConfig::default();
        assert_eq!(cfg.click_stall_threshold, 2);
        assert_eq!(cfg.scroll_stall_threshold, 3);
        assert!((cfg.success_ratio - 0.95).abs() < f64::EPSILON);
        assert_eq!(cfg.container_poll_attempts, 40);
    }

    #[test]
    fn partial_sections_fill_defaults() {
        let raw = r#"
[convergence]
max_iterations = 4

[output]
dir = "/srv/out"
"#;
        let cfg: ShelfscanConfig = toml::from_str(raw).unwrap_or_default();
        assert_eq!(cfg.convergence.max_iterations, 4);
        assert_eq!(cfg.convergence.scroll_step_px, 15_000);
        assert_eq!(cfg.output.dir, PathBuf::from("/srv/out"));
        assert_eq!(cfg.output.keep_latest, 5);
        assert!(cfg.browser.headless);
    }
}
