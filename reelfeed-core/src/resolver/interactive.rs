use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::config::{ResolverSection, SourceSection};
use crate::models::DirectLinkResult;

use super::error::{ResolverError, ResolverResult};
use super::machine::{ExtractionSession, ResolverState, StepOutcome};
use super::metrics::ResolverMetrics;
use super::session::{select_server_links, GatePage, SessionFactory};

#[derive(Debug, Clone)]
pub struct ResolverSettings {
    pub terminal_marker: String,
    pub max_retries: u32,
    pub navigation_timeout: Duration,
    pub gate_timeout: Duration,
    pub file_name_selector: String,
    pub gate_selector: String,
    pub button_selector: String,
    pub server_labels: Vec<String>,
}

impl ResolverSettings {
    pub fn from_config(source: &SourceSection, resolver: &ResolverSection) -> Self {
        Self {
            terminal_marker: source.terminal_marker.clone(),
            max_retries: resolver.max_retries,
            navigation_timeout: resolver.navigation_timeout(),
            gate_timeout: resolver.gate_timeout(),
            file_name_selector: resolver.file_name_selector.clone(),
            gate_selector: resolver.gate_selector.clone(),
            button_selector: resolver.button_selector.clone(),
            server_labels: resolver.server_labels.clone(),
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// Turns a terminal-host URL into direct download links.
#[async_trait(?Send)]
pub trait TerminalExtractor {
    /// Fails only when the session could not be established or the first
    /// navigation did not complete.
    async fn try_extract(&self, terminal_url: &str) -> ResolverResult<DirectLinkResult>;
}

/// Drives one browser session per call through the download gate.
pub struct InteractiveResolver {
    sessions: Arc<dyn SessionFactory>,
    settings: ResolverSettings,
    metrics: Arc<Mutex<ResolverMetrics>>,
}

impl InteractiveResolver {
    pub fn new(sessions: Arc<dyn SessionFactory>, settings: ResolverSettings) -> Self {
        Self {
            sessions,
            settings,
            metrics: Arc::new(Mutex::new(ResolverMetrics::default())),
        }
    }

    pub fn settings(&self) -> &ResolverSettings {
        &self.settings
    }

    pub fn metrics(&self) -> ResolverMetrics {
        self.with_metrics(|metrics| metrics.clone())
    }

    fn with_metrics<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut ResolverMetrics) -> R,
    {
        let mut guard = self
            .metrics
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }

    /// Like [`TerminalExtractor::try_extract`], but a session failure yields
    /// the "Unknown File" result with no links instead of an error.
    pub async fn extract(&self, terminal_url: &str) -> DirectLinkResult {
        match self.try_extract(terminal_url).await {
            Ok(result) => result,
            Err(err) => {
                error!(url = %terminal_url, error = %err, "interactive resolution failed");
                DirectLinkResult::unresolved()
            }
        }
    }

    async fn run_session(&self, terminal_url: &str) -> ResolverResult<DirectLinkResult> {
        let mut page = self.sessions.open().await?;
        self.with_metrics(ResolverMetrics::record_session_open);

        let outcome = self.drive(page.as_mut(), terminal_url).await;

        if let Err(err) = page.close().await {
            warn!(url = %terminal_url, error = %err, "failed to close browser session");
        }
        self.with_metrics(ResolverMetrics::record_session_close);
        outcome
    }

    async fn drive(
        &self,
        page: &mut dyn GatePage,
        terminal_url: &str,
    ) -> ResolverResult<DirectLinkResult> {
        let mut session = ExtractionSession::new(
            terminal_url,
            self.settings.terminal_marker.as_str(),
            self.settings.max_retries,
        );
        info!(url = %terminal_url, "opening terminal page");

        while !session.state().is_terminal() {
            let state = session.state();
            let outcome = self.execute(state, &session, page).await;
            self.record(state, &outcome);
            let next = match session.advance(outcome) {
                Ok(next) => next,
                Err(err) => {
                    if state == ResolverState::Navigate {
                        self.with_metrics(ResolverMetrics::record_navigation_failure);
                    }
                    return Err(err);
                }
            };
            debug!(
                from = ?state,
                to = ?next,
                retries = session.retries(),
                url = %session.current_url(),
                "resolver transition"
            );
        }

        match session.state() {
            ResolverState::Success => {
                info!(
                    url = %terminal_url,
                    file_name = %session.file_name(),
                    links = session.links().len(),
                    "extracted direct download links"
                );
            }
            _ => {
                self.with_metrics(ResolverMetrics::record_exhausted);
                error!(
                    url = %terminal_url,
                    retries = session.retries(),
                    "max retries reached, skipping terminal url"
                );
            }
        }
        Ok(session.into_result())
    }

    async fn execute(
        &self,
        state: ResolverState,
        session: &ExtractionSession,
        page: &mut dyn GatePage,
    ) -> StepOutcome {
        let settings = &self.settings;
        match state {
            ResolverState::Navigate => {
                match page
                    .goto(session.terminal_url(), settings.navigation_timeout)
                    .await
                {
                    Ok(url) => StepOutcome::Navigated { url },
                    Err(err) => StepOutcome::Failed(err),
                }
            }
            ResolverState::CaptureName => match page.text_of(&settings.file_name_selector).await {
                Ok(name) => StepOutcome::NameCaptured(name),
                Err(err) => StepOutcome::Failed(err),
            },
            ResolverState::GateCheck => {
                let url = match page.current_url().await {
                    Ok(url) => url,
                    Err(err) => return StepOutcome::Failed(err),
                };
                if !session.is_terminal_host(&url) {
                    return StepOutcome::OffTerminalHost { url };
                }
                match page
                    .click_and_wait(&settings.gate_selector, settings.gate_timeout)
                    .await
                {
                    Ok(Some(landed)) => StepOutcome::GateOpened { url: landed },
                    Ok(None) => StepOutcome::GateMissing { url },
                    Err(err) => StepOutcome::Failed(err),
                }
            }
            ResolverState::Harvest => {
                let url = match page.current_url().await {
                    Ok(url) => url,
                    Err(err) => return StepOutcome::Failed(err),
                };
                match page.anchors(&settings.button_selector).await {
                    Ok(anchors) => StepOutcome::Harvested {
                        links: select_server_links(&anchors, &settings.server_labels),
                        url,
                    },
                    Err(err) => StepOutcome::Failed(err),
                }
            }
            ResolverState::Backtrack => match page.go_back(settings.gate_timeout).await {
                Ok(url) => StepOutcome::SteppedBack { url },
                Err(err) => StepOutcome::Failed(err),
            },
            ResolverState::Success | ResolverState::Exhausted => StepOutcome::Failed(
                ResolverError::Unexpected(format!("state {state:?} has no action")),
            ),
        }
    }

    fn record(&self, state: ResolverState, outcome: &StepOutcome) {
        self.with_metrics(|metrics| match (state, outcome) {
            (ResolverState::GateCheck, StepOutcome::GateOpened { .. }) => metrics.record_gate(true),
            (ResolverState::GateCheck, StepOutcome::GateMissing { .. }) => {
                metrics.record_gate(false)
            }
            (ResolverState::Harvest, StepOutcome::Harvested { links, .. }) => {
                metrics.record_harvest(!links.is_empty())
            }
            (ResolverState::Harvest, StepOutcome::Failed(_)) => metrics.record_harvest(false),
            (ResolverState::Backtrack, StepOutcome::SteppedBack { .. }) => {
                metrics.record_back_navigation()
            }
            _ => {}
        });
    }
}

#[async_trait(?Send)]
impl TerminalExtractor for InteractiveResolver {
    async fn try_extract(&self, terminal_url: &str) -> ResolverResult<DirectLinkResult> {
        self.run_session(terminal_url).await
    }
}
