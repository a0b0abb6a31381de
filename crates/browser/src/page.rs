//! Typed page queries.
//!
//! Every script the harvester runs in the page lives here, each paired with
//! the struct its result decodes into. Callers never see raw JSON.

use {
    async_trait::async_trait,
    chromiumoxide::Page,
    serde::{Serialize, de::DeserializeOwned},
    tracing::debug,
};

use crate::{
    error::BrowserError,
    types::{ControlState, ScrollPosition},
};

/// The page operations the convergence loop needs.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Current document URL.
    async fn current_url(&self) -> Result<String, BrowserError>;

    /// Whether any element matches `selector`.
    async fn selector_exists(&self, selector: &str) -> Result<bool, BrowserError>;

    /// Distinct link targets of every item matched by `item_selector`.
    ///
    /// For each item the first descendant matching `link_selector` supplies
    /// the href; items without one are skipped.
    async fn item_urls(
        &self,
        item_selector: &str,
        link_selector: &str,
    ) -> Result<Vec<String>, BrowserError>;

    /// Trimmed `innerText` of every element matching `selector`.
    async fn text_content(&self, selector: &str) -> Result<Vec<String>, BrowserError>;

    /// The first selector in `selectors` that matches an element, with its
    /// visibility and enabled state.
    async fn load_more_control(
        &self,
        selectors: &[String],
    ) -> Result<Option<ControlState>, BrowserError>;

    /// Scroll the control into view and click it. Returns `false` when the
    /// element vanished between lookup and click.
    async fn click(&self, selector: &str) -> Result<bool, BrowserError>;

    /// Scroll the window down by `px` pixels.
    async fn scroll_by(&self, px: u32) -> Result<ScrollPosition, BrowserError>;

    /// The page's own serialization of the live document.
    async fn serialize_document(&self) -> Result<String, BrowserError>;
}

/// [`PageDriver`] over a chromiumoxide page.
pub struct CdpPage {
    page: Page,
}

impl CdpPage {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    async fn eval<T: DeserializeOwned>(&self, js: String) -> Result<T, BrowserError> {
        self.page
            .evaluate(js)
            .await
            .map_err(|e| BrowserError::JsEvalFailed(e.to_string()))?
            .into_value::<T>()
            .map_err(|e| BrowserError::Decode(e.to_string()))
    }
}

/// Encode a value as a JavaScript literal.
fn js_literal<T: Serialize + ?Sized>(value: &T) -> Result<String, BrowserError> {
    serde_json::to_string(value).map_err(|e| BrowserError::Decode(e.to_string()))
}

#[async_trait]
impl PageDriver for CdpPage {
    async fn current_url(&self) -> Result<String, BrowserError> {
        Ok(self.page.url().await?.unwrap_or_default())
    }

    async fn selector_exists(&self, selector: &str) -> Result<bool, BrowserError> {
        let js = format!(
            "(() => {{ try {{ return document.querySelector({}) !== null; }} catch (e) {{ return false; }} }})()",
            js_literal(selector)?
        );
        self.eval::<bool>(js).await
    }

    async fn item_urls(
        &self,
        item_selector: &str,
        link_selector: &str,
    ) -> Result<Vec<String>, BrowserError> {
        let js = format!(
            r#"(() => {{
    const seen = new Set();
    for (const item of document.querySelectorAll({items})) {{
        const link = item.matches({link}) ? item : item.querySelector({link});
        if (link && link.href) seen.add(link.href);
    }}
    return Array.from(seen);
}})()"#,
            items = js_literal(item_selector)?,
            link = js_literal(link_selector)?,
        );
        let urls = self.eval::<Vec<String>>(js).await?;
        debug!(count = urls.len(), "read item urls");
        Ok(urls)
    }

    async fn text_content(&self, selector: &str) -> Result<Vec<String>, BrowserError> {
        let js = format!(
            r#"(() => {{
    try {{
        return Array.from(document.querySelectorAll({sel}))
            .map(el => (el.innerText || el.textContent || '').trim())
            .filter(t => t.length > 0);
    }} catch (e) {{ return []; }}
}})()"#,
            sel = js_literal(selector)?,
        );
        self.eval::<Vec<String>>(js).await
    }

    async fn load_more_control(
        &self,
        selectors: &[String],
    ) -> Result<Option<ControlState>, BrowserError> {
        let js = format!(
            r#"(() => {{
    for (const selector of {list}) {{
        let el = null;
        try {{ el = document.querySelector(selector); }} catch (e) {{ continue; }}
        if (!el) continue;
        const rect = el.getBoundingClientRect();
        const style = getComputedStyle(el);
        const visible = rect.width > 0 && rect.height > 0
            && style.visibility !== 'hidden' && style.display !== 'none';
        const disabled = !!el.disabled || el.getAttribute('aria-disabled') === 'true';
        return {{ selector, visible, disabled }};
    }}
    return null;
}})()"#,
            list = js_literal(selectors)?,
        );
        self.eval::<Option<ControlState>>(js).await
    }

    async fn click(&self, selector: &str) -> Result<bool, BrowserError> {
        let js = format!(
            r#"(() => {{
    const el = document.querySelector({sel});
    if (!el) return false;
    el.scrollIntoView({{ block: 'center' }});
    el.click();
    return true;
}})()"#,
            sel = js_literal(selector)?,
        );
        self.eval::<bool>(js).await
    }

    async fn scroll_by(&self, px: u32) -> Result<ScrollPosition, BrowserError> {
        let js = format!(
            r#"(() => {{
    window.scrollBy(0, {px});
    return {{
        scrollY: window.scrollY,
        scrollHeight: document.documentElement.scrollHeight,
        viewportHeight: window.innerHeight,
    }};
}})()"#
        );
        self.eval::<ScrollPosition>(js).await
    }

    async fn serialize_document(&self) -> Result<String, BrowserError> {
        self.eval::<String>("document.documentElement.outerHTML".to_string())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selectors_are_quoted_for_js() {
        let lit = js_literal(r#"button[data-testid="Load more items"]"#).unwrap_or_default();
        assert_eq!(lit, r#""button[data-testid=\"Load more items\"]""#);
    }

    #[test]
    fn selector_lists_become_arrays() {
        let list = vec!["a".to_string(), "b c".to_string()];
        assert_eq!(js_literal(&list).unwrap_or_default(), r#"["a","b c"]"#);
    }
}
