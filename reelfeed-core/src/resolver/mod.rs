mod chromium;
mod error;
mod interactive;
mod machine;
mod metrics;
mod session;
mod walker;

pub use chromium::{ChromiumSession, ChromiumSessionFactory};
pub use error::{ResolverError, ResolverResult};
pub use interactive::{InteractiveResolver, ResolverSettings, TerminalExtractor};
pub use machine::{ExtractionSession, ResolverState, StepOutcome};
pub use metrics::ResolverMetrics;
pub use session::{select_server_links, AnchorSnapshot, GatePage, SessionFactory};
pub use walker::RedirectChainWalker;
