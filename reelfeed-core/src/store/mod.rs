mod error;
mod json;
mod sqlite;

use std::collections::BTreeSet;
use std::path::Path;

use crate::config::StoreBackend;

pub use error::{StoreError, StoreResult};
pub use json::JsonDedupStore;
pub use sqlite::{SqliteDedupStore, SqliteDedupStoreBuilder};

/// Titles that were already published.
///
/// The polling loop loads the set once per cycle and saves it after every
/// successful publication; there are no concurrent writers.
pub trait DedupStore: Send + Sync {
    fn load(&self) -> StoreResult<BTreeSet<String>>;
    fn save(&self, titles: &BTreeSet<String>) -> StoreResult<()>;
}

pub fn open_store(backend: StoreBackend, path: &Path) -> StoreResult<Box<dyn DedupStore>> {
    match backend {
        StoreBackend::Json => Ok(Box::new(JsonDedupStore::new(path))),
        StoreBackend::Sqlite => {
            let store = SqliteDedupStore::builder()
                .path(path)
                .create_if_missing(true)
                .build()?;
            store.initialize()?;
            Ok(Box::new(store))
        }
    }
}
