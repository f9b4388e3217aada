use thiserror::Error;

pub type ResolverResult<T> = Result<T, ResolverError>;

#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("chromium launch failed: {0}")]
    Launch(String),
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },
    #[error("cdp error: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("element unavailable: {0}")]
    Element(String),
    #[error("timeout waiting for {0}")]
    Timeout(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl ResolverError {
    /// Fatal errors end the whole extraction; the rest count as one failed attempt.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ResolverError::Launch(_)
                | ResolverError::Navigation { .. }
                | ResolverError::Configuration(_)
        )
    }
}

impl From<tokio::task::JoinError> for ResolverError {
    fn from(err: tokio::task::JoinError) -> Self {
        ResolverError::Unexpected(err.to_string())
    }
}
