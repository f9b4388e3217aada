use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{DedupStore, StoreError, StoreResult};

/// Posted titles kept as a pretty-printed JSON array.
#[derive(Debug, Clone)]
pub struct JsonDedupStore {
    path: PathBuf,
}

impl JsonDedupStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl DedupStore for JsonDedupStore {
    fn load(&self) -> StoreResult<BTreeSet<String>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(BTreeSet::new()),
            Err(err) => return Err(self.io_error(err)),
        };
        if content.trim().is_empty() {
            return Ok(BTreeSet::new());
        }
        let titles: Vec<String> =
            serde_json::from_str(&content).map_err(|source| StoreError::Serde {
                path: self.path.clone(),
                source,
            })?;
        Ok(titles.into_iter().collect())
    }

    fn save(&self, titles: &BTreeSet<String>) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|err| self.io_error(err))?;
            }
        }
        let payload = serde_json::to_string_pretty(titles).map_err(|source| StoreError::Serde {
            path: self.path.clone(),
            source,
        })?;
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, payload).map_err(|err| self.io_error(err))?;
        fs::rename(&staging, &self.path).map_err(|err| self.io_error(err))?;
        Ok(())
    }
}
