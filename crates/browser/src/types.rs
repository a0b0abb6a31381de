//! Page query result types and URL guards.

use {
    serde::{Deserialize, Serialize},
    tracing::warn,
};

use crate::error::BrowserError;

/// State of the first matching "load more" control on the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlState {
    /// The selector that matched.
    pub selector: String,
    pub visible: bool,
    pub disabled: bool,
}

impl ControlState {
    /// A control is worth clicking only when it is rendered and enabled.
    #[must_use]
    pub fn clickable(&self) -> bool {
        self.visible && !self.disabled
    }
}

/// Viewport position after a scroll.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollPosition {
    pub scroll_y: f64,
    pub scroll_height: f64,
    pub viewport_height: f64,
}

impl ScrollPosition {
    /// True when the viewport bottom is within a few pixels of the document end.
    #[must_use]
    pub fn at_bottom(&self) -> bool {
        self.scroll_y + self.viewport_height >= self.scroll_height - 4.0
    }
}

/// Validate a URL before attempting navigation.
///
/// Rejects empty input, unparseable URLs and anything that is not http/https.
pub fn validate_url(url: &str) -> Result<(), BrowserError> {
    if url.trim().is_empty() {
        return Err(BrowserError::InvalidUrl("URL cannot be empty".to_string()));
    }

    let parsed = url::Url::parse(url)
        .map_err(|e| BrowserError::InvalidUrl(format!("'{}': {e}", truncate_url(url))))?;

    match parsed.scheme() {
        "http" | "https" => {},
        scheme => {
            warn!(url = %truncate_url(url), scheme, "rejecting non-http URL");
            return Err(BrowserError::InvalidUrl(format!(
                "unsupported URL scheme '{scheme}', only http/https allowed"
            )));
        },
    }

    Ok(())
}

/// Check if a URL's host is permitted by an allow-list.
///
/// An empty list allows everything. `*.example.com` matches `example.com`
/// and any subdomain of it.
pub fn is_domain_allowed(url: &str, allowed_domains: &[String]) -> bool {
    if allowed_domains.is_empty() {
        return true;
    }

    let Ok(parsed) = url::Url::parse(url) else {
        return false;
    };

    let Some(host) = parsed.host_str() else {
        return false;
    };

    allowed_domains.iter().any(|pattern| {
        match pattern.strip_prefix("*.") {
            Some(base) => host == base || host.ends_with(&format!(".{base}")),
            None => host == pattern,
        }
    })
}

/// Truncate a URL for error messages.
fn truncate_url(url: &str) -> String {
    match url.char_indices().nth(100) {
        Some((idx, _)) => format!("{}...", &url[..idx]),
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[rstest]
    #[case("https://www.hermes.com/jp/ja/search/?s=バッグ")]
    #[case("http://localhost:8080/path")]
    fn valid_urls_pass(#[case] url: &str) {
        assert!(validate_url(url).is_ok());
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("not a url")]
    #[case("ftp://example.com")]
    #[case("file:///etc/passwd")]
    #[case("javascript:alert(1)")]
    fn invalid_urls_fail(#[case] url: &str) {
        assert!(matches!(validate_url(url), Err(BrowserError::InvalidUrl(_))));
    }

    #[test]
    fn long_urls_are_truncated_on_char_boundary() {
        let url = "あ".repeat(150);
        let t = truncate_url(&url);
        assert!(t.ends_with("..."));
        assert_eq!(t.chars().count(), 103);
    }

    #[test]
    fn domain_allowed_empty_list() {
        assert!(is_domain_allowed("https://example.com", &[]));
    }

    #[test]
    fn domain_allowed_exact_match() {
        let allowed = vec!["example.com".to_string()];
        assert!(is_domain_allowed("https://example.com/path", &allowed));
        assert!(!is_domain_allowed("https://sub.example.com", &allowed));
    }

    #[test]
    fn domain_allowed_wildcard() {
        let allowed = vec!["*.hermes.com".to_string()];
        assert!(is_domain_allowed("https://www.hermes.com/jp/", &allowed));
        assert!(is_domain_allowed("https://hermes.com", &allowed));
        assert!(!is_domain_allowed("https://nothermes.com", &allowed));
        assert!(!is_domain_allowed("not-a-url", &allowed));
    }

    #[test]
    fn control_needs_visible_and_enabled() {
        let mut c = ControlState {
            selector: "button".into(),
            visible: true,
            disabled: false,
        };
        assert!(c.clickable());
        c.disabled = true;
        assert!(!c.clickable());
    }

    #[test]
    fn scroll_position_bottom() {
        let pos = ScrollPosition {
            scroll_y: 9000.0,
            scroll_height: 10_000.0,
            viewport_height: 1000.0,
        };
        assert!(pos.at_bottom());
        let pos = ScrollPosition {
            scroll_y: 0.0,
            ..pos
        };
        assert!(!pos.at_bottom());
    }
}
