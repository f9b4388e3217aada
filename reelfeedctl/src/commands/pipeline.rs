use clap::Args;

/// Runs the polling loop.
#[derive(Args, Debug, Clone)]
pub struct WatchArgs {
    /// Stop after this many cycles (runs forever when omitted)
    #[arg(long)]
    pub cycles: Option<usize>,

    /// Resolve listings without publishing or marking them as posted
    #[arg(long)]
    pub dry_run: bool,
}

/// Runs a single polling cycle and prints its statistics.
#[derive(Args, Debug, Clone)]
pub struct CycleArgs {
    /// Resolve listings without publishing or marking them as posted
    #[arg(long)]
    pub dry_run: bool,
}

/// Resolves one listing page end to end.
#[derive(Args, Debug, Clone)]
pub struct ResolveArgs {
    /// Listing page URL
    pub url: String,

    /// Title used in logs and output
    #[arg(long)]
    pub title: Option<String>,
}

/// Runs only the interactive stage against a terminal-host URL.
#[derive(Args, Debug, Clone)]
pub struct ExtractArgs {
    /// Terminal-host URL
    pub url: String,

    /// Override the configured retry budget
    #[arg(long)]
    pub max_retries: Option<u32>,
}
