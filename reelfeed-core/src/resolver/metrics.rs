use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolverMetrics {
    pub sessions_opened: u64,
    pub sessions_closed: u64,
    pub navigation_failures: u64,
    pub gate_clicks: u64,
    pub gate_misses: u64,
    pub harvest_attempts: u64,
    pub harvest_successes: u64,
    pub back_navigations: u64,
    pub exhausted_runs: u64,
}

impl ResolverMetrics {
    pub fn record_session_open(&mut self) {
        self.sessions_opened = self.sessions_opened.saturating_add(1);
    }

    pub fn record_session_close(&mut self) {
        self.sessions_closed = self.sessions_closed.saturating_add(1);
    }

    pub fn record_navigation_failure(&mut self) {
        self.navigation_failures = self.navigation_failures.saturating_add(1);
    }

    pub fn record_gate(&mut self, clicked: bool) {
        if clicked {
            self.gate_clicks = self.gate_clicks.saturating_add(1);
        } else {
            self.gate_misses = self.gate_misses.saturating_add(1);
        }
    }

    pub fn record_harvest(&mut self, success: bool) {
        self.harvest_attempts = self.harvest_attempts.saturating_add(1);
        if success {
            self.harvest_successes = self.harvest_successes.saturating_add(1);
        }
    }

    pub fn record_back_navigation(&mut self) {
        self.back_navigations = self.back_navigations.saturating_add(1);
    }

    pub fn record_exhausted(&mut self) {
        self.exhausted_runs = self.exhausted_runs.saturating_add(1);
    }

    /// Sessions opened but not yet released.
    pub fn open_sessions(&self) -> u64 {
        self.sessions_opened.saturating_sub(self.sessions_closed)
    }

    pub fn harvest_success_rate(&self) -> f64 {
        if self.harvest_attempts == 0 {
            0.0
        } else {
            (self.harvest_successes as f64 / self.harvest_attempts as f64) * 100.0
        }
    }
}
