use std::time::Duration;

use async_trait::async_trait;

use super::error::ResolverResult;

/// Text and target of an anchor as rendered on the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorSnapshot {
    pub text: String,
    pub href: Option<String>,
}

impl AnchorSnapshot {
    pub fn new(text: impl Into<String>, href: Option<&str>) -> Self {
        Self {
            text: text.into(),
            href: href.map(str::to_owned),
        }
    }
}

/// One live page of a browser session, as seen by the interactive resolver.
#[async_trait(?Send)]
pub trait GatePage {
    /// Loads `url` and returns the URL the page settled on.
    async fn goto(&mut self, url: &str, timeout: Duration) -> ResolverResult<String>;
    async fn current_url(&mut self) -> ResolverResult<String>;
    /// Inner text of the first element matching `selector`, if any.
    async fn text_of(&mut self, selector: &str) -> ResolverResult<Option<String>>;
    /// Clicks the first element matching `selector` and waits for the resulting navigation.
    /// Returns `None` when no element matches.
    async fn click_and_wait(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> ResolverResult<Option<String>>;
    async fn anchors(&mut self, selector: &str) -> ResolverResult<Vec<AnchorSnapshot>>;
    /// Moves exactly one entry back in history and returns the resulting URL.
    async fn go_back(&mut self, timeout: Duration) -> ResolverResult<String>;
    /// Releases the page and its browser. Safe to call more than once.
    async fn close(&mut self) -> ResolverResult<()>;
}

#[async_trait(?Send)]
pub trait SessionFactory: Send + Sync {
    async fn open(&self) -> ResolverResult<Box<dyn GatePage>>;
}

/// Hrefs of the anchors whose visible text carries one of `labels`, in page order.
pub fn select_server_links(anchors: &[AnchorSnapshot], labels: &[String]) -> Vec<String> {
    anchors
        .iter()
        .filter(|anchor| labels.iter().any(|label| anchor.text.contains(label.as_str())))
        .filter_map(|anchor| anchor.href.as_deref())
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> Vec<String> {
        vec![
            "Download [FSL Server]".to_string(),
            "Download [PixelServer : 2]".to_string(),
        ]
    }

    #[test]
    fn server_links_keep_page_order_and_skip_other_buttons() {
        let anchors = vec![
            AnchorSnapshot::new("Download [FSL Server]", Some("https://fsl.test/a")),
            AnchorSnapshot::new("Other", Some("https://other.test/b")),
            AnchorSnapshot::new(" Download [PixelServer : 2] ", Some("https://pixel.test/c")),
        ];
        assert_eq!(
            select_server_links(&anchors, &labels()),
            vec!["https://fsl.test/a", "https://pixel.test/c"]
        );
    }

    #[test]
    fn labelled_anchor_without_href_is_skipped() {
        let anchors = vec![
            AnchorSnapshot::new("Download [FSL Server]", None),
            AnchorSnapshot::new("Download [FSL Server]", Some("  ")),
        ];
        assert!(select_server_links(&anchors, &labels()).is_empty());
    }
}
