//! Reading the advertised result total and spotting bot interstitials.

use {
    regex::Regex,
    shelfscan_browser::PageDriver,
    shelfscan_config::{ConvergenceConfig, CountPattern},
    tracing::debug,
};

use crate::error::{HarvestError, Result};

/// A [`CountPattern`] with its regex compiled.
#[derive(Debug, Clone)]
pub struct TotalPattern {
    pub selector: String,
    pub regex: Regex,
}

impl TotalPattern {
    pub fn compile(pattern: &CountPattern) -> Result<Self> {
        let regex = Regex::new(&pattern.pattern).map_err(|source| HarvestError::CountPattern {
            pattern: pattern.pattern.clone(),
            source,
        })?;
        Ok(Self {
            selector: pattern.selector.clone(),
            regex,
        })
    }
}

/// First number captured by `regex` in `texts` that is larger than
/// `visible`. Thousands separators are ignored.
///
/// A total no larger than what is already on screen is most likely a page
/// size or a filter count, not the result total.
pub fn total_from_texts(texts: &[String], regex: &Regex, visible: usize) -> Option<usize> {
    texts
        .iter()
        .flat_map(|text| regex.captures_iter(text))
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| m.as_str().replace(',', "").parse::<usize>().ok())
        .find(|n| *n > visible)
}

/// Read the advertised total from the page, trying each pattern in order.
pub async fn read_target_count(
    page: &dyn PageDriver,
    patterns: &[TotalPattern],
    visible: usize,
) -> Result<Option<usize>> {
    for pattern in patterns {
        let texts = page.text_content(&pattern.selector).await?;
        if let Some(total) = total_from_texts(&texts, &pattern.regex, visible) {
            debug!(selector = %pattern.selector, total, "read target count");
            return Ok(Some(total));
        }
    }
    Ok(None)
}

/// Return the first block marker found on the page, if any.
///
/// Selectors are checked first; text markers are matched case-insensitively
/// against the body text.
pub async fn find_block_marker(
    page: &dyn PageDriver,
    config: &ConvergenceConfig,
) -> Result<Option<String>> {
    for selector in &config.block_selectors {
        if page.selector_exists(selector).await? {
            return Ok(Some(selector.clone()));
        }
    }

    if config.block_markers.is_empty() {
        return Ok(None);
    }
    let body = page.text_content("body").await?.join("\n").to_lowercase();
    Ok(config
        .block_markers
        .iter()
        .find(|m| body.contains(&m.to_lowercase()))
        .cloned())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    fn header_pattern() -> Regex {
        TotalPattern::compile(&ConvergenceConfig::default().count_patterns[0])
            .unwrap()
            .regex
    }

    fn body_pattern() -> Regex {
        TotalPattern::compile(&ConvergenceConfig::default().count_patterns[1])
            .unwrap()
            .regex
    }

    #[rstest]
    #[case("バッグ (124)", 24, Some(124))]
    #[case("(1,204)", 24, Some(1204))]
    #[case("(24)", 24, None)]
    #[case("no number here", 0, None)]
    fn reads_header_total(#[case] text: &str, #[case] visible: usize, #[case] expected: Option<usize>) {
        assert_eq!(
            total_from_texts(&[text.to_string()], &header_pattern(), visible),
            expected
        );
    }

    #[test]
    fn skips_numbers_not_above_visible() {
        let texts = vec!["表示 24 件".to_string(), "全 318 件".to_string()];
        assert_eq!(total_from_texts(&texts, &body_pattern(), 24), Some(318));
    }

    #[test]
    fn body_pattern_is_case_insensitive() {
        let texts = vec!["Showing 48 of 212 Results".to_string()];
        assert_eq!(total_from_texts(&texts, &body_pattern(), 48), Some(212));
    }

    #[test]
    fn bad_pattern_is_reported() {
        let err = TotalPattern::compile(&CountPattern {
            selector: "body".into(),
            pattern: "(".into(),
        })
        .unwrap_err();
        assert!(matches!(err, HarvestError::CountPattern { .. }));
    }
}
