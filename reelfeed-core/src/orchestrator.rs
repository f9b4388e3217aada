use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use tracing::{error, info};

use crate::models::{Listing, ResolutionOutcome};
use crate::resolver::{RedirectChainWalker, TerminalExtractor};

/// Resolves a listing into direct download links.
#[async_trait(?Send)]
pub trait ListingResolver {
    async fn resolve_listing(&self, listing: &Listing) -> ResolutionOutcome;
}

/// Walks the redirect chain, then runs the interactive stage once on the terminal URL.
///
/// Never fails past its boundary: every error, including a panic in either
/// stage, is logged with the listing URL and reported as `None`.
pub struct ResolutionOrchestrator {
    walker: RedirectChainWalker,
    extractor: Arc<dyn TerminalExtractor>,
}

impl ResolutionOrchestrator {
    pub fn new(walker: RedirectChainWalker, extractor: Arc<dyn TerminalExtractor>) -> Self {
        Self { walker, extractor }
    }

    async fn resolve_inner(&self, listing: &Listing) -> ResolutionOutcome {
        let terminal = self.walker.resolve(&listing.url).await?;
        info!(
            listing = %listing.url,
            terminal = %terminal.url,
            page_title = %terminal.page_title,
            "resolved terminal host"
        );
        match self.extractor.try_extract(&terminal.url).await {
            Ok(result) => Some(vec![result]),
            Err(err) => {
                error!(
                    listing = %listing.url,
                    terminal = %terminal.url,
                    error = %err,
                    "interactive stage failed"
                );
                None
            }
        }
    }
}

#[async_trait(?Send)]
impl ListingResolver for ResolutionOrchestrator {
    async fn resolve_listing(&self, listing: &Listing) -> ResolutionOutcome {
        match AssertUnwindSafe(self.resolve_inner(listing))
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome,
            Err(_) => {
                error!(listing = %listing.url, "resolution panicked");
                None
            }
        }
    }
}
