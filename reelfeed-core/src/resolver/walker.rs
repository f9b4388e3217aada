use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::extract::LinkExtractor;
use crate::fetch::{FetchResult, PageFetcher};
use crate::models::TerminalLink;

/// Follows listing page → intermediary pages to the first terminal-host URL.
///
/// There is no retry here: one failed fetch abandons the listing until the next
/// polling cycle picks it up again.
pub struct RedirectChainWalker {
    fetcher: Arc<dyn PageFetcher>,
    extractor: Arc<LinkExtractor>,
}

impl RedirectChainWalker {
    pub fn new(fetcher: Arc<dyn PageFetcher>, extractor: Arc<LinkExtractor>) -> Self {
        Self { fetcher, extractor }
    }

    pub async fn resolve(&self, listing_url: &str) -> Option<TerminalLink> {
        match self.walk(listing_url).await {
            Ok(Some(link)) => Some(link),
            Ok(None) => {
                warn!(url = %listing_url, "no terminal-host links found");
                None
            }
            Err(err) => {
                error!(url = %listing_url, error = %err, "failed to walk redirect chain");
                None
            }
        }
    }

    /// Returns every candidate in discovery order; the first one wins in [`Self::resolve`].
    pub async fn candidates(&self, listing_url: &str) -> FetchResult<(String, Vec<String>)> {
        let body = self.fetcher.fetch(listing_url).await?;
        let page_title = self.extractor.listing_title(&body);
        let intermediaries = self.extractor.intermediary_links(&body, listing_url);
        debug!(
            url = %listing_url,
            title = %page_title,
            intermediaries = intermediaries.len(),
            "parsed listing page"
        );

        let mut visited = HashSet::new();
        let mut candidates = Vec::new();
        for intermediary in intermediaries {
            if !visited.insert(intermediary.clone()) {
                continue;
            }
            let body = self.fetcher.fetch(&intermediary).await?;
            let found = self.extractor.terminal_links(&body, &intermediary);
            debug!(url = %intermediary, found = found.len(), "parsed intermediary page");
            candidates.extend(found);
        }
        Ok((page_title, candidates))
    }

    pub async fn walk(&self, listing_url: &str) -> FetchResult<Option<TerminalLink>> {
        let (page_title, candidates) = self.candidates(listing_url).await?;
        Ok(candidates
            .into_iter()
            .next()
            .map(|url| TerminalLink { url, page_title }))
    }
}
