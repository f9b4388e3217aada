pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod listing;
pub mod models;
pub mod orchestrator;
pub mod poller;
pub mod publisher;
pub mod resolver;
pub mod store;

pub use config::{
    load_reelfeed_config, BrowserSection, HttpSection, PollSection, PublisherSection,
    ReelfeedConfig, ResolverSection, SourceSection, StoreBackend, StoreSection,
};
pub use error::{ConfigError, Result};
pub use extract::{ExtractError, ExtractResult, LinkExtractor};
pub use fetch::{FetchError, FetchResult, HttpFetcher, PageFetcher};
pub use listing::{HtmlListingSource, ListingSource};
pub use models::{
    has_download_links, DirectLinkResult, Listing, ResolutionOutcome, TerminalLink, UNKNOWN_FILE,
    UNKNOWN_TITLE,
};
pub use orchestrator::{ListingResolver, ResolutionOrchestrator};
pub use poller::{CycleStats, PollConfig, PollingLoop};
pub use publisher::{MessageFormatter, PublishError, PublishResult, Publisher, TelegramPublisher};
pub use resolver::{
    ChromiumSessionFactory, InteractiveResolver, RedirectChainWalker, ResolverError,
    ResolverMetrics, ResolverResult, ResolverSettings, TerminalExtractor,
};
pub use store::{
    open_store, DedupStore, JsonDedupStore, SqliteDedupStore, StoreError, StoreResult,
};
