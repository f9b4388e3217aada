use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::extract::LinkExtractor;
use crate::fetch::{FetchResult, PageFetcher};
use crate::models::Listing;

#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Current catalog entries, newest first as the site orders them.
    async fn listings(&self) -> FetchResult<Vec<Listing>>;
}

/// Reads listings from the catalog page's anchors.
pub struct HtmlListingSource {
    fetcher: Arc<dyn PageFetcher>,
    extractor: Arc<LinkExtractor>,
    catalog_url: String,
}

impl HtmlListingSource {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        extractor: Arc<LinkExtractor>,
        catalog_url: impl Into<String>,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            catalog_url: catalog_url.into(),
        }
    }

    pub fn catalog_url(&self) -> &str {
        &self.catalog_url
    }
}

#[async_trait]
impl ListingSource for HtmlListingSource {
    async fn listings(&self) -> FetchResult<Vec<Listing>> {
        let body = self.fetcher.fetch(&self.catalog_url).await?;
        let listings = self.extractor.catalog_listings(&body, &self.catalog_url);
        debug!(url = %self.catalog_url, listings = listings.len(), "parsed catalog page");
        Ok(listings)
    }
}
