use serde::{Deserialize, Serialize};

pub const UNKNOWN_TITLE: &str = "Unknown Title";
pub const UNKNOWN_FILE: &str = "Unknown File";

/// One catalog entry. Identified by `title` for dedup purposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub title: String,
    pub url: String,
}

impl Listing {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
        }
    }
}

/// First terminal-host URL found behind a listing's intermediary pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TerminalLink {
    pub url: String,
    pub page_title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectLinkResult {
    pub file_name: String,
    pub download_links: Vec<String>,
}

impl DirectLinkResult {
    pub fn new(file_name: impl Into<String>, download_links: Vec<String>) -> Self {
        Self {
            file_name: file_name.into(),
            download_links,
        }
    }

    /// Result returned when the terminal page could not be opened at all.
    pub fn unresolved() -> Self {
        Self::new(UNKNOWN_FILE, Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.download_links.is_empty()
    }
}

/// `None` when the listing could not be resolved; otherwise one result per terminal host.
pub type ResolutionOutcome = Option<Vec<DirectLinkResult>>;

pub fn has_download_links(outcome: &[DirectLinkResult]) -> bool {
    outcome.iter().any(|result| !result.is_empty())
}
