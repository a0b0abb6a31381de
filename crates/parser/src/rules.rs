//! Compiled extraction rules.

use {
    regex::Regex,
    scraper::Selector,
    shelfscan_config::ParserConfig,
    url::Url,
};

use crate::error::ParseError;

/// Everything the extractor needs, compiled once per run.
///
/// Selector lists are tried in order; the first one that yields a value wins.
#[derive(Debug)]
pub struct ParseRules {
    pub(crate) base_url: Option<Url>,
    pub(crate) containers: Vec<Selector>,
    pub(crate) links: Vec<Selector>,
    pub(crate) names: Vec<Selector>,
    pub(crate) prices: Vec<Selector>,
    pub(crate) colors: Vec<Selector>,
    pub(crate) skus: Vec<Selector>,
    pub(crate) any_link: Selector,
    pub(crate) product_path: Regex,
    pub(crate) price: Regex,
    pub(crate) href: Regex,
    pub(crate) text_node: Regex,
    pub(crate) keywords: Vec<String>,
    pub(crate) max_pattern_matches: usize,
}

impl ParseRules {
    pub fn from_config(config: &ParserConfig) -> Result<Self, ParseError> {
        let base_url = config
            .base_url
            .as_deref()
            .map(|b| Url::parse(b).map_err(|_| ParseError::InvalidBaseUrl(b.to_string())))
            .transpose()?;

        Ok(Self {
            base_url,
            containers: compile_all(&config.container_selectors)?,
            links: compile_all(&config.link_selectors)?,
            names: compile_all(&config.name_selectors)?,
            prices: compile_all(&config.price_selectors)?,
            colors: compile_all(&config.color_selectors)?,
            skus: compile_all(&config.sku_selectors)?,
            any_link: compile("a[href]")?,
            product_path: compile_regex(&config.product_path_pattern)?,
            price: compile_regex(&config.price_pattern)?,
            href: compile_regex(r#"href\s*=\s*"([^"]+)""#)?,
            text_node: compile_regex(r">([^<>]+)<")?,
            keywords: config
                .name_keywords
                .iter()
                .filter(|k| !k.is_empty())
                .cloned()
                .collect(),
            max_pattern_matches: config.max_pattern_matches,
        })
    }

    /// Resolve a possibly relative href against the configured base URL.
    ///
    /// Hrefs that cannot be resolved are returned unchanged.
    pub(crate) fn resolve(&self, href: &str) -> String {
        let href = href.trim();
        match Url::parse(href) {
            Ok(abs) => abs.to_string(),
            Err(_) => self
                .base_url
                .as_ref()
                .and_then(|base| base.join(href).ok())
                .map_or_else(|| href.to_string(), |u| u.to_string()),
        }
    }

    /// SKU embedded in a product URL, e.g. `/product/kelly-H012345/` yields
    /// `kelly-H012345`.
    pub(crate) fn sku_from_url(&self, url: &str) -> Option<String> {
        self.product_path
            .captures(url)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .filter(|s| !s.is_empty())
    }

    pub(crate) fn is_product_url(&self, url: &str) -> bool {
        self.product_path.is_match(url)
    }

    pub(crate) fn has_keyword(&self, text: &str) -> bool {
        self.keywords.iter().any(|k| text.contains(k.as_str()))
    }
}

fn compile(selector: &str) -> Result<Selector, ParseError> {
    Selector::parse(selector).map_err(|e| ParseError::InvalidSelector {
        selector: selector.to_string(),
        reason: format!("{e:?}"),
    })
}

fn compile_all(selectors: &[String]) -> Result<Vec<Selector>, ParseError> {
    selectors.iter().map(|s| compile(s)).collect()
}

fn compile_regex(pattern: &str) -> Result<Regex, ParseError> {
    Regex::new(pattern).map_err(|source| ParseError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}
