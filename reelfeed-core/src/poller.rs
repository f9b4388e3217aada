use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::PollSection;
use crate::listing::ListingSource;
use crate::models::{has_download_links, Listing};
use crate::orchestrator::ListingResolver;
use crate::publisher::{MessageFormatter, Publisher};
use crate::store::DedupStore;

#[derive(Debug, Clone)]
pub struct PollConfig {
    pub interval: Duration,
    pub post_delay: Duration,
    pub max_listings_per_cycle: Option<usize>,
    pub dry_run: bool,
}

impl PollConfig {
    pub fn from_section(section: &PollSection) -> Self {
        Self {
            interval: Duration::from_secs(section.interval_seconds),
            post_delay: Duration::from_secs(section.post_delay_seconds),
            max_listings_per_cycle: section.max_listings_per_cycle,
            dry_run: false,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct CycleStats {
    pub started_at: Option<DateTime<Utc>>,
    pub listings_found: usize,
    pub skipped_posted: usize,
    pub resolved: usize,
    pub unresolved: usize,
    pub published: usize,
    pub publish_failures: usize,
    pub dry_run: bool,
    pub duration_ms: u64,
    pub errors: Vec<String>,
}

impl CycleStats {
    fn new(dry_run: bool) -> Self {
        Self {
            started_at: Some(Utc::now()),
            dry_run,
            ..Default::default()
        }
    }
}

/// Finds new listings, resolves them one at a time and publishes the ones
/// that produced download links.
pub struct PollingLoop {
    source: Arc<dyn ListingSource>,
    resolver: Arc<dyn ListingResolver>,
    publisher: Arc<dyn Publisher>,
    store: Arc<dyn DedupStore>,
    formatter: MessageFormatter,
    config: PollConfig,
}

impl PollingLoop {
    pub fn new(
        source: Arc<dyn ListingSource>,
        resolver: Arc<dyn ListingResolver>,
        publisher: Arc<dyn Publisher>,
        store: Arc<dyn DedupStore>,
        formatter: MessageFormatter,
        config: PollConfig,
    ) -> Self {
        Self {
            source,
            resolver,
            publisher,
            store,
            formatter,
            config,
        }
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Runs cycles until `max_cycles` is reached, or forever when it is `None`.
    pub async fn run(&self, max_cycles: Option<usize>) -> Vec<CycleStats> {
        let mut history = Vec::new();
        let mut completed = 0usize;
        loop {
            let stats = self.run_cycle().await;
            completed += 1;
            if max_cycles.is_some() {
                history.push(stats);
            }
            if max_cycles.is_some_and(|limit| completed >= limit) {
                break;
            }
            debug!(seconds = self.config.interval.as_secs(), "sleeping until next cycle");
            sleep(self.config.interval).await;
        }
        history
    }

    pub async fn run_cycle(&self) -> CycleStats {
        let start = Instant::now();
        let mut stats = CycleStats::new(self.config.dry_run);

        let mut posted = match self.store.load() {
            Ok(posted) => posted,
            Err(err) => {
                error!(error = %err, "failed to load posted titles, skipping cycle");
                stats.errors.push(format!("store: {err}"));
                return self.finish(stats, start);
            }
        };

        let listings = match self.source.listings().await {
            Ok(listings) => listings,
            Err(err) => {
                error!(error = %err, "failed to fetch listings, skipping cycle");
                stats.errors.push(format!("listings: {err}"));
                return self.finish(stats, start);
            }
        };
        stats.listings_found = listings.len();
        info!(
            listings = stats.listings_found,
            posted = posted.len(),
            dry_run = self.config.dry_run,
            "polling cycle started"
        );

        let mut attempted = 0usize;
        for listing in &listings {
            if posted.contains(&listing.title) {
                stats.skipped_posted += 1;
                debug!(title = %listing.title, "already posted");
                continue;
            }
            if self
                .config
                .max_listings_per_cycle
                .is_some_and(|limit| attempted >= limit)
            {
                debug!(limit = attempted, "resolution limit reached for this cycle");
                break;
            }
            attempted += 1;
            self.process(listing, &mut posted, &mut stats).await;
        }

        self.finish(stats, start)
    }

    async fn process(
        &self,
        listing: &Listing,
        posted: &mut BTreeSet<String>,
        stats: &mut CycleStats,
    ) {
        info!(title = %listing.title, url = %listing.url, "resolving listing");
        let results = match self.resolver.resolve_listing(listing).await {
            Some(results) if has_download_links(&results) => results,
            _ => {
                stats.unresolved += 1;
                warn!(title = %listing.title, url = %listing.url, "no download links, retrying next cycle");
                return;
            }
        };
        stats.resolved += 1;

        if self.config.dry_run {
            info!(title = %listing.title, links = results.len(), "dry run, not publishing");
            return;
        }

        let message = self.formatter.format(listing, &results);
        match self.publisher.post(&message).await {
            Ok(()) => {
                stats.published += 1;
                posted.insert(listing.title.clone());
                if let Err(err) = self.store.save(posted) {
                    error!(title = %listing.title, error = %err, "failed to persist posted titles");
                    stats.errors.push(format!("{}: store: {err}", listing.title));
                }
            }
            Err(err) => {
                stats.publish_failures += 1;
                error!(title = %listing.title, error = %err, "failed to publish listing");
                stats.errors.push(format!("{}: {err}", listing.title));
            }
        }

        if !self.config.post_delay.is_zero() {
            sleep(self.config.post_delay).await;
        }
    }

    fn finish(&self, mut stats: CycleStats, start: Instant) -> CycleStats {
        stats.duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!(
            found = stats.listings_found,
            skipped = stats.skipped_posted,
            resolved = stats.resolved,
            published = stats.published,
            failures = stats.publish_failures,
            errors = stats.errors.len(),
            duration_ms = stats.duration_ms,
            "polling cycle finished"
        );
        stats
    }
}
