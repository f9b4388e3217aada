pub mod commands;

use std::env;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use reelfeed_core::{
    load_reelfeed_config, open_store, ChromiumSessionFactory, CycleStats, DedupStore,
    DirectLinkResult, HtmlListingSource, HttpFetcher, InteractiveResolver, LinkExtractor, Listing,
    ListingResolver, MessageFormatter, PollConfig, PollingLoop, PublishResult, Publisher,
    RedirectChainWalker, ReelfeedConfig, ResolutionOrchestrator, ResolverMetrics,
    ResolverSettings, TelegramPublisher, TerminalExtractor, UNKNOWN_TITLE,
};

use crate::commands::{
    CycleArgs, ExtractArgs, ForgetArgs, PostedCommands, ResolveArgs, WatchArgs,
};

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] reelfeed_core::ConfigError),
    #[error("selector error: {0}")]
    Extract(#[from] reelfeed_core::ExtractError),
    #[error("http error: {0}")]
    Fetch(#[from] reelfeed_core::FetchError),
    #[error("publisher error: {0}")]
    Publish(#[from] reelfeed_core::PublishError),
    #[error("store error: {0}")]
    Store(#[from] reelfeed_core::StoreError),
    #[error("resolver error: {0}")]
    Resolver(#[from] reelfeed_core::ResolverError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("required resource missing: {0}")]
    MissingResource(String),
}

#[derive(Parser, Debug)]
#[command(author, version, about = "reelfeed listing resolver and channel publisher", long_about = None)]
pub struct Cli {
    /// Path to reelfeed.toml
    #[arg(long, default_value = "configs/reelfeed.toml")]
    pub config: PathBuf,
    /// Alternative posted-titles store (overrides store.path)
    #[arg(long)]
    pub store: Option<PathBuf>,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Polls the catalog and publishes new listings
    Watch(WatchArgs),
    /// Runs one polling cycle
    Cycle(CycleArgs),
    /// Resolves a listing page into direct download links
    Resolve(ResolveArgs),
    /// Runs the browser stage against a terminal-host URL
    Extract(ExtractArgs),
    /// Maintains the posted-titles store
    #[command(subcommand)]
    Posted(PostedCommands),
    /// Checks configuration, browser and store
    Health,
    /// Prints shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

pub async fn run(cli: Cli) -> Result<()> {
    if let Commands::Completions { shell } = &cli.command {
        let mut command = Cli::command();
        clap_complete::generate(*shell, &mut command, "reelfeedctl", &mut io::stdout());
        return Ok(());
    }

    let context = AppContext::new(&cli)?;

    match &cli.command {
        Commands::Watch(args) => {
            let summary = context.watch(args).await?;
            render(&summary, cli.format)?;
        }
        Commands::Cycle(args) => {
            let stats = context.cycle(args).await?;
            render(&stats, cli.format)?;
        }
        Commands::Resolve(args) => {
            let report = context.resolve(args).await?;
            render(&report, cli.format)?;
        }
        Commands::Extract(args) => {
            let report = context.extract(args).await?;
            render(&report, cli.format)?;
        }
        Commands::Posted(PostedCommands::List) => {
            let list = context.posted_list()?;
            render(&list, cli.format)?;
        }
        Commands::Posted(PostedCommands::Forget(args)) => {
            let result = context.posted_forget(args)?;
            render(&result, cli.format)?;
        }
        Commands::Health => {
            let report = context.health_check();
            render(&report, cli.format)?;
            if report
                .iter()
                .any(|entry| matches!(entry.status, CheckStatus::Error))
            {
                return Err(AppError::MissingResource(
                    "one or more health checks failed".to_string(),
                ));
            }
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}

fn render<T>(value: &T, format: OutputFormat) -> Result<()>
where
    T: Serialize + DisplayFallback,
{
    match format {
        OutputFormat::Text => {
            println!("{}", value.display());
            Ok(())
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{}", json);
            Ok(())
        }
    }
}

trait DisplayFallback {
    fn display(&self) -> String;
}

/// Lets a dry run start without a bot token. `PollingLoop` never posts in
/// dry-run mode, so `post` is not reached.
struct DryRunPublisher;

#[async_trait]
impl Publisher for DryRunPublisher {
    async fn post(&self, _message: &str) -> PublishResult<()> {
        Ok(())
    }
}

#[derive(Debug)]
struct AppContext {
    config: ReelfeedConfig,
    config_path: PathBuf,
    store_path: PathBuf,
}

impl AppContext {
    fn new(cli: &Cli) -> Result<Self> {
        let config_path = cli.config.clone();
        let config = load_reelfeed_config(&config_path)?;

        let config_dir = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let store_path = cli
            .store
            .clone()
            .unwrap_or_else(|| config.resolve_store_path(&config_dir));

        Ok(Self {
            config,
            config_path,
            store_path,
        })
    }

    fn store(&self) -> Result<Arc<dyn DedupStore>> {
        let store = open_store(self.config.store.backend, &self.store_path)?;
        Ok(Arc::from(store))
    }

    fn extractor(&self) -> Result<Arc<LinkExtractor>> {
        Ok(Arc::new(LinkExtractor::new(&self.config.source)?))
    }

    fn interactive(&self, max_retries: Option<u32>) -> InteractiveResolver {
        let sessions = ChromiumSessionFactory::new(
            self.config.browser.clone(),
            self.config.http.user_agent.clone(),
        );
        let mut settings = ResolverSettings::from_config(&self.config.source, &self.config.resolver);
        if let Some(max_retries) = max_retries {
            settings = settings.with_max_retries(max_retries);
        }
        InteractiveResolver::new(Arc::new(sessions), settings)
    }

    fn orchestrator(&self) -> Result<ResolutionOrchestrator> {
        let fetcher = Arc::new(HttpFetcher::new(&self.config.http)?);
        let walker = RedirectChainWalker::new(fetcher, self.extractor()?);
        Ok(ResolutionOrchestrator::new(
            walker,
            Arc::new(self.interactive(None)),
        ))
    }

    fn polling_loop(&self, dry_run: bool) -> Result<PollingLoop> {
        let fetcher = Arc::new(HttpFetcher::new(&self.config.http)?);
        let source = HtmlListingSource::new(
            fetcher,
            self.extractor()?,
            self.config.source.catalog_url.clone(),
        );
        let publisher: Arc<dyn Publisher> = if dry_run {
            Arc::new(DryRunPublisher)
        } else {
            Arc::new(TelegramPublisher::new(&self.config.publisher)?)
        };
        let config = PollConfig::from_section(&self.config.poll).with_dry_run(dry_run);
        Ok(PollingLoop::new(
            Arc::new(source),
            Arc::new(self.orchestrator()?),
            publisher,
            self.store()?,
            MessageFormatter::new(self.config.publisher.header.clone()),
            config,
        ))
    }

    async fn watch(&self, args: &WatchArgs) -> Result<WatchSummary> {
        let poller = self.polling_loop(args.dry_run)?;
        info!(
            catalog = %self.config.source.catalog_url,
            interval = self.config.poll.interval_seconds,
            dry_run = args.dry_run,
            "starting polling loop"
        );
        let cycles = poller.run(args.cycles).await;
        Ok(WatchSummary { cycles })
    }

    async fn cycle(&self, args: &CycleArgs) -> Result<CycleStats> {
        let poller = self.polling_loop(args.dry_run)?;
        Ok(poller.run_cycle().await)
    }

    async fn resolve(&self, args: &ResolveArgs) -> Result<ResolveReport> {
        let listing = Listing::new(
            args.title.clone().unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
            args.url.clone(),
        );
        let outcome = self.orchestrator()?.resolve_listing(&listing).await;
        Ok(ResolveReport { listing, outcome })
    }

    async fn extract(&self, args: &ExtractArgs) -> Result<ExtractReport> {
        let resolver = self.interactive(args.max_retries);
        let result = resolver.try_extract(&args.url).await?;
        Ok(ExtractReport {
            url: args.url.clone(),
            result,
            metrics: resolver.metrics(),
        })
    }

    fn posted_list(&self) -> Result<PostedList> {
        let titles: Vec<String> = self.store()?.load()?.into_iter().collect();
        Ok(PostedList {
            store: self.store_path.display().to_string(),
            titles,
        })
    }

    fn posted_forget(&self, args: &ForgetArgs) -> Result<ForgetResult> {
        let store = self.store()?;
        let mut titles = store.load()?;
        let removed = titles.remove(&args.title);
        if removed {
            store.save(&titles)?;
        }
        Ok(ForgetResult {
            title: args.title.clone(),
            removed,
        })
    }

    fn health_check(&self) -> Vec<HealthEntry> {
        let mut results = vec![HealthEntry::ok(
            "config",
            self.config_path.display().to_string(),
        )];

        results.push(match LinkExtractor::new(&self.config.source) {
            Ok(_) => HealthEntry::ok("selectors", "all selectors parse"),
            Err(err) => HealthEntry::error("selectors", err.to_string()),
        });

        let executable = Path::new(&self.config.browser.executable_path);
        results.push(if executable.exists() {
            HealthEntry::ok("browser", executable.display().to_string())
        } else {
            HealthEntry::error(
                "browser",
                format!("{} not found", executable.display()),
            )
        });

        results.push(self.check_store());

        let token_env = &self.config.publisher.token_env;
        results.push(match env::var(token_env) {
            Ok(token) if !token.trim().is_empty() => {
                HealthEntry::ok("publisher", format!("{token_env} set"))
            }
            _ => HealthEntry::warn(
                "publisher",
                format!("{token_env} not set, only dry runs will work"),
            ),
        });

        results
    }

    fn check_store(&self) -> HealthEntry {
        let path = &self.store_path;
        if !path.exists() {
            let parent_ok = path
                .parent()
                .map(|parent| parent.as_os_str().is_empty() || parent.is_dir())
                .unwrap_or(true);
            return if parent_ok {
                HealthEntry::warn("store", format!("{} will be created", path.display()))
            } else {
                HealthEntry::warn(
                    "store",
                    format!("{} and its directory will be created", path.display()),
                )
            };
        }
        match self.store().and_then(|store| Ok(store.load()?)) {
            Ok(titles) => HealthEntry::ok(
                "store",
                format!("{} ({} posted titles)", path.display(), titles.len()),
            ),
            Err(err) => HealthEntry::error("store", err.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WatchSummary {
    pub cycles: Vec<CycleStats>,
}

#[derive(Debug, Serialize)]
pub struct ResolveReport {
    pub listing: Listing,
    pub outcome: Option<Vec<DirectLinkResult>>,
}

#[derive(Debug, Serialize)]
pub struct ExtractReport {
    pub url: String,
    pub result: DirectLinkResult,
    pub metrics: ResolverMetrics,
}

#[derive(Debug, Serialize)]
pub struct PostedList {
    pub store: String,
    pub titles: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ForgetResult {
    pub title: String,
    pub removed: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthEntry {
    pub name: String,
    pub status: CheckStatus,
    pub detail: String,
}

#[derive(Debug, Serialize)]
pub enum CheckStatus {
    #[serde(rename = "ok")]
    Ok,
    #[serde(rename = "warn")]
    Warn,
    #[serde(rename = "error")]
    Error,
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CheckStatus::Ok => "OK",
            CheckStatus::Warn => "WARN",
            CheckStatus::Error => "ERROR",
        };
        write!(f, "{}", label)
    }
}

impl HealthEntry {
    fn ok(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Ok,
            detail: detail.into(),
        }
    }

    fn warn(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Warn,
            detail: detail.into(),
        }
    }

    fn error(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Error,
            detail: detail.into(),
        }
    }
}

impl DisplayFallback for Vec<HealthEntry> {
    fn display(&self) -> String {
        self.iter()
            .map(|entry| format!("[{}] {}: {}", entry.status, entry.name, entry.detail))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl DisplayFallback for CycleStats {
    fn display(&self) -> String {
        let started = self
            .started_at
            .map(|at| {
                at.with_timezone(&chrono::Local)
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string()
            })
            .unwrap_or_else(|| "-".to_string());
        let mut lines = vec![format!(
            "cycle {started}{dry}: found={} skipped={} resolved={} unresolved={} published={} failures={} ({} ms)",
            self.listings_found,
            self.skipped_posted,
            self.resolved,
            self.unresolved,
            self.published,
            self.publish_failures,
            self.duration_ms,
            dry = if self.dry_run { " [dry run]" } else { "" },
        )];
        for error in &self.errors {
            lines.push(format!("  ! {error}"));
        }
        lines.join("\n")
    }
}

impl DisplayFallback for WatchSummary {
    fn display(&self) -> String {
        if self.cycles.is_empty() {
            return "no cycles recorded".to_string();
        }
        self.cycles
            .iter()
            .map(DisplayFallback::display)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn display_result(result: &DirectLinkResult) -> Vec<String> {
    let mut lines = vec![result.file_name.clone()];
    if result.download_links.is_empty() {
        lines.push("  (no download links)".to_string());
    }
    for (index, link) in result.download_links.iter().enumerate() {
        lines.push(format!("  {}. {link}", index + 1));
    }
    lines
}

impl DisplayFallback for ResolveReport {
    fn display(&self) -> String {
        let mut lines = vec![format!("{} <{}>", self.listing.title, self.listing.url)];
        match &self.outcome {
            Some(results) => {
                for result in results {
                    lines.extend(display_result(result));
                }
            }
            None => lines.push("  unresolved".to_string()),
        }
        lines.join("\n")
    }
}

impl DisplayFallback for ExtractReport {
    fn display(&self) -> String {
        let mut lines = vec![self.url.clone()];
        lines.extend(display_result(&self.result));
        lines.push(format!(
            "gate clicks={} harvests={} back={}",
            self.metrics.gate_clicks, self.metrics.harvest_attempts, self.metrics.back_navigations
        ));
        lines.join("\n")
    }
}

impl DisplayFallback for PostedList {
    fn display(&self) -> String {
        if self.titles.is_empty() {
            return format!("no posted titles in {}", self.store);
        }
        let mut lines = vec![format!("{} posted titles in {}", self.titles.len(), self.store)];
        lines.extend(self.titles.iter().map(|title| format!("  - {title}")));
        lines.join("\n")
    }
}

impl DisplayFallback for ForgetResult {
    fn display(&self) -> String {
        if self.removed {
            format!("forgot \"{}\"", self.title)
        } else {
            format!("\"{}\" was not posted", self.title)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::fs;
    use tempfile::TempDir;

    fn prepare_test_context() -> Result<(TempDir, AppContext)> {
        let temp = TempDir::new().unwrap();
        let configs_dir = temp.path().join("configs");
        fs::create_dir_all(&configs_dir).unwrap();
        fs::copy(
            "../configs/reelfeed.toml",
            configs_dir.join("reelfeed.toml"),
        )
        .unwrap();

        let cli = Cli {
            config: configs_dir.join("reelfeed.toml"),
            store: None,
            format: OutputFormat::Json,
            command: Commands::Health,
        };
        let context = AppContext::new(&cli)?;
        Ok((temp, context))
    }

    fn seed(context: &AppContext, titles: &[&str]) {
        let titles: BTreeSet<String> = titles.iter().map(|title| title.to_string()).collect();
        context.store().unwrap().save(&titles).unwrap();
    }

    #[test]
    fn parses_watch_flags() {
        let cli = Cli::try_parse_from([
            "reelfeedctl",
            "--format",
            "json",
            "watch",
            "--cycles",
            "2",
            "--dry-run",
        ])
        .unwrap();
        match cli.command {
            Commands::Watch(args) => {
                assert_eq!(args.cycles, Some(2));
                assert!(args.dry_run);
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert_eq!(cli.config, PathBuf::from("configs/reelfeed.toml"));
    }

    #[test]
    fn store_path_is_relative_to_config_dir() {
        let (temp, context) = prepare_test_context().unwrap();
        assert_eq!(
            context.store_path,
            temp.path().join("configs").join("data/movies.json")
        );
    }

    #[test]
    fn store_override_wins() {
        let (temp, _) = prepare_test_context().unwrap();
        let override_path = temp.path().join("elsewhere.json");
        let cli = Cli {
            config: temp.path().join("configs/reelfeed.toml"),
            store: Some(override_path.clone()),
            format: OutputFormat::Text,
            command: Commands::Health,
        };
        let context = AppContext::new(&cli).unwrap();
        assert_eq!(context.store_path, override_path);
    }

    #[test]
    fn posted_forget_removes_only_the_named_title() {
        let (_temp, context) = prepare_test_context().unwrap();
        seed(&context, &["Movie A", "Movie B"]);

        let result = context
            .posted_forget(&ForgetArgs {
                title: "Movie A".into(),
            })
            .unwrap();
        assert!(result.removed);

        let list = context.posted_list().unwrap();
        assert_eq!(list.titles, vec!["Movie B".to_string()]);

        let again = context
            .posted_forget(&ForgetArgs {
                title: "Movie A".into(),
            })
            .unwrap();
        assert!(!again.removed);
    }

    #[test]
    fn health_reports_store_and_selectors() {
        let (_temp, context) = prepare_test_context().unwrap();
        let report = context.health_check();
        let selectors = report.iter().find(|entry| entry.name == "selectors").unwrap();
        assert!(matches!(selectors.status, CheckStatus::Ok));
        let store = report.iter().find(|entry| entry.name == "store").unwrap();
        assert!(matches!(store.status, CheckStatus::Warn));

        seed(&context, &["Movie A"]);
        let store = context.check_store();
        assert!(matches!(store.status, CheckStatus::Ok));
        assert!(store.detail.contains("1 posted titles"));
    }

    #[test]
    fn dry_run_loop_builds_without_bot_token() {
        let (_temp, mut context) = prepare_test_context().unwrap();
        context.config.publisher.token_env = "REELFEED_TEST_TOKEN_THAT_IS_NEVER_SET".into();

        let poller = context.polling_loop(true).unwrap();
        assert!(poller.config().dry_run);
        assert!(matches!(
            context.polling_loop(false),
            Err(AppError::Publish(reelfeed_core::PublishError::MissingToken(_)))
        ));
    }

    #[test]
    fn existing_store_is_reported_with_its_size() {
        let (_temp, context) = prepare_test_context().unwrap();
        seed(&context, &["Movie A", "Movie B"]);
        let entry = context.check_store();
        assert!(matches!(entry.status, CheckStatus::Ok));
        assert!(entry.detail.ends_with("(2 posted titles)"));
    }

    #[test]
    fn cycle_stats_text_lists_errors() {
        let stats = CycleStats {
            listings_found: 3,
            published: 1,
            publish_failures: 1,
            dry_run: true,
            errors: vec!["Movie B: channel rejected message".into()],
            ..CycleStats::default()
        };
        let text = stats.display();
        assert!(text.contains("found=3"));
        assert!(text.contains("[dry run]"));
        assert!(text.contains("  ! Movie B: channel rejected message"));
    }
}
