use serde::Serialize;
use tracing::{debug, warn};
use url::Url;

use crate::models::{DirectLinkResult, UNKNOWN_FILE};

use super::error::{ResolverError, ResolverResult};

/// States of one interactive extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResolverState {
    Navigate,
    CaptureName,
    GateCheck,
    Harvest,
    Backtrack,
    Success,
    Exhausted,
}

impl ResolverState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ResolverState::Success | ResolverState::Exhausted)
    }
}

/// What happened when the driver executed the current state against the page.
#[derive(Debug)]
pub enum StepOutcome {
    Navigated { url: String },
    NameCaptured(Option<String>),
    GateOpened { url: String },
    GateMissing { url: String },
    OffTerminalHost { url: String },
    Harvested { url: String, links: Vec<String> },
    SteppedBack { url: String },
    Failed(ResolverError),
}

/// Mutable state of one extraction: retry counter, file name and harvested links.
///
/// Transitions are driven exclusively through [`ExtractionSession::advance`].
#[derive(Debug, Clone)]
pub struct ExtractionSession {
    terminal_url: String,
    terminal_marker: String,
    max_retries: u32,
    retries: u32,
    state: ResolverState,
    current_url: String,
    file_name: String,
    links: Vec<String>,
}

impl ExtractionSession {
    pub fn new(
        terminal_url: impl Into<String>,
        terminal_marker: impl Into<String>,
        max_retries: u32,
    ) -> Self {
        let terminal_url = terminal_url.into();
        Self {
            current_url: terminal_url.clone(),
            terminal_url,
            terminal_marker: terminal_marker.into(),
            max_retries: max_retries.max(1),
            retries: 0,
            state: ResolverState::Navigate,
            file_name: UNKNOWN_FILE.to_string(),
            links: Vec::new(),
        }
    }

    pub fn state(&self) -> ResolverState {
        self.state
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn terminal_url(&self) -> &str {
        &self.terminal_url
    }

    pub fn current_url(&self) -> &str {
        &self.current_url
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn links(&self) -> &[String] {
        &self.links
    }

    /// Whether `url` is served by the terminal host, i.e. the gate may be on it.
    pub fn is_terminal_host(&self, url: &str) -> bool {
        match Url::parse(url).ok().and_then(|parsed| parsed.host_str().map(str::to_owned)) {
            Some(host) => host.contains(&self.terminal_marker),
            None => url.contains(&self.terminal_marker),
        }
    }

    /// Whether links found on `url` may be kept.
    pub fn is_harvestable(&self, url: &str) -> bool {
        url.contains(&self.terminal_marker)
    }

    /// Applies the outcome of the current state and returns the next one.
    ///
    /// Only a failure while in `Navigate`, or an outcome that does not belong to
    /// the current state, is returned as an error.
    pub fn advance(&mut self, outcome: StepOutcome) -> ResolverResult<ResolverState> {
        let next = match (self.state, outcome) {
            (ResolverState::Navigate, StepOutcome::Navigated { url }) => {
                self.current_url = url;
                ResolverState::CaptureName
            }
            (ResolverState::Navigate, StepOutcome::Failed(err)) => {
                return Err(match err {
                    err @ ResolverError::Navigation { .. } => err,
                    other => ResolverError::Navigation {
                        url: self.terminal_url.clone(),
                        reason: other.to_string(),
                    },
                });
            }
            (ResolverState::CaptureName, StepOutcome::NameCaptured(name)) => {
                if let Some(name) = name.map(|value| value.trim().to_string()) {
                    if !name.is_empty() {
                        self.file_name = name;
                    }
                }
                ResolverState::GateCheck
            }
            (ResolverState::CaptureName, StepOutcome::Failed(err)) => {
                warn!(error = %err, "file name not found");
                ResolverState::GateCheck
            }
            (ResolverState::GateCheck, StepOutcome::GateOpened { url }) => {
                self.current_url = url;
                ResolverState::Harvest
            }
            (ResolverState::GateCheck, StepOutcome::OffTerminalHost { url }) => {
                self.current_url = url;
                ResolverState::Harvest
            }
            (ResolverState::GateCheck, StepOutcome::GateMissing { url }) => {
                self.current_url = url;
                warn!(url = %self.current_url, "download gate not found");
                self.fail_attempt(ResolverState::GateCheck)
            }
            (ResolverState::GateCheck, StepOutcome::Failed(err)) => {
                warn!(error = %err, "download gate interaction failed");
                self.fail_attempt(ResolverState::GateCheck)
            }
            (ResolverState::Harvest, StepOutcome::Harvested { url, links }) => {
                let harvestable = self.is_harvestable(&url);
                self.current_url = url;
                if harvestable && !links.is_empty() {
                    self.links = links;
                    ResolverState::Success
                } else {
                    if !harvestable && !links.is_empty() {
                        debug!(url = %self.current_url, "ignoring links outside the terminal host");
                    }
                    warn!(url = %self.current_url, "no valid download buttons found");
                    self.fail_attempt(ResolverState::Backtrack)
                }
            }
            (ResolverState::Harvest, StepOutcome::Failed(err)) => {
                warn!(error = %err, "failed to extract final links");
                self.fail_attempt(ResolverState::GateCheck)
            }
            (ResolverState::Backtrack, StepOutcome::SteppedBack { url }) => {
                self.current_url = url;
                ResolverState::GateCheck
            }
            (ResolverState::Backtrack, StepOutcome::Failed(err)) => {
                warn!(error = %err, "history navigation failed");
                self.fail_attempt(ResolverState::GateCheck)
            }
            (state, outcome) => {
                return Err(ResolverError::Unexpected(format!(
                    "outcome {outcome:?} is not valid in state {state:?}"
                )));
            }
        };
        self.state = next;
        Ok(next)
    }

    fn fail_attempt(&mut self, retry_state: ResolverState) -> ResolverState {
        self.retries = self.retries.saturating_add(1);
        if self.retries >= self.max_retries {
            ResolverState::Exhausted
        } else {
            retry_state
        }
    }

    pub fn into_result(self) -> DirectLinkResult {
        let links = if self.state == ResolverState::Success {
            self.links
        } else {
            Vec::new()
        };
        DirectLinkResult::new(self.file_name, links)
    }
}
