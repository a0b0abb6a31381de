use {shelfscan_browser::PageDriver, tracing::debug};

use crate::error::{HarvestError, Result};

/// Serialize the live document.
///
/// A document under `min_bytes` yields [`HarvestError::EmptySnapshot`], which
/// still carries the HTML.
pub async fn capture(page: &dyn PageDriver, min_bytes: usize) -> Result<String> {
    let html = page.serialize_document().await?;
    let bytes = html.len();
    debug!(bytes, "captured snapshot");
    if bytes < min_bytes {
        return Err(HarvestError::EmptySnapshot {
            bytes,
            min: min_bytes,
            html,
        });
    }
    Ok(html)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, crate::mock::MockPage};

    #[tokio::test]
    async fn small_snapshot_keeps_html() {
        let page = MockPage::grid(3, &[]);
        match capture(&page, 1024 * 1024).await {
            Err(HarvestError::EmptySnapshot { bytes, html, .. }) => {
                assert_eq!(bytes, html.len());
                assert!(html.contains("p2"));
            },
            other => panic!("expected EmptySnapshot, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn large_enough_snapshot_passes() {
        let page = MockPage::grid(3, &[]).with_padding(2048);
        let html = capture(&page, 2048).await.unwrap();
        assert!(html.starts_with("<html>"));
    }
}
