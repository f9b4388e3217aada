use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("posted titles file {path} is not a JSON array of strings: {source}")]
    Serde {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("failed to open database at {path}: {source}")]
    OpenDatabase {
        path: PathBuf,
        source: rusqlite::Error,
    },
    #[error("store path not configured")]
    MissingPath,
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
