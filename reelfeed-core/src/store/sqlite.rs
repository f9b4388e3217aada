use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use rusqlite::{params, Connection, OpenFlags};

use super::{DedupStore, StoreError, StoreResult};

const POSTED_SCHEMA: &str = "CREATE TABLE IF NOT EXISTS posted_titles (\n\
     title TEXT PRIMARY KEY,\n\
     posted_at TEXT NOT NULL\n\
 );";

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct SqliteDedupStoreBuilder {
    path: Option<PathBuf>,
    create_if_missing: bool,
    busy_timeout: Duration,
}

impl Default for SqliteDedupStoreBuilder {
    fn default() -> Self {
        Self {
            path: None,
            create_if_missing: true,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }
}

impl SqliteDedupStoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    /// When false, opening a database file that does not exist fails.
    pub fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn build(self) -> StoreResult<SqliteDedupStore> {
        let path = self.path.ok_or(StoreError::MissingPath)?;
        let mut flags = OpenFlags::SQLITE_OPEN_READ_WRITE;
        if self.create_if_missing {
            flags |= OpenFlags::SQLITE_OPEN_CREATE;
        }
        Ok(SqliteDedupStore {
            path,
            flags,
            busy_timeout: self.busy_timeout,
        })
    }
}

/// Posted titles in a `posted_titles` table, with the time each was first saved.
#[derive(Debug, Clone)]
pub struct SqliteDedupStore {
    path: PathBuf,
    flags: OpenFlags,
    busy_timeout: Duration,
}

impl SqliteDedupStore {
    pub fn builder() -> SqliteDedupStoreBuilder {
        SqliteDedupStoreBuilder::new()
    }

    pub fn new(path: impl AsRef<Path>) -> StoreResult<Self> {
        SqliteDedupStoreBuilder::new().path(path).build()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> StoreResult<Connection> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && self.flags.contains(OpenFlags::SQLITE_OPEN_CREATE) {
                std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }
        let conn = Connection::open_with_flags(&self.path, self.flags).map_err(|source| {
            StoreError::OpenDatabase {
                path: self.path.clone(),
                source,
            }
        })?;
        conn.busy_timeout(self.busy_timeout)
            .and_then(|_| {
                conn.execute_batch(
                    "PRAGMA journal_mode = WAL;\n\
                     PRAGMA synchronous = NORMAL;\n",
                )
            })
            .map_err(|source| StoreError::OpenDatabase {
                path: self.path.clone(),
                source,
            })?;
        Ok(conn)
    }

    pub fn initialize(&self) -> StoreResult<()> {
        let conn = self.open()?;
        conn.execute_batch(POSTED_SCHEMA)?;
        Ok(())
    }

    /// Titles with their first publication timestamp, most recent first.
    pub fn entries(&self) -> StoreResult<Vec<(String, String)>> {
        let conn = self.open()?;
        let mut stmt =
            conn.prepare("SELECT title, posted_at FROM posted_titles ORDER BY posted_at DESC, title")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

impl DedupStore for SqliteDedupStore {
    fn load(&self) -> StoreResult<BTreeSet<String>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare("SELECT title FROM posted_titles")?;
        let titles = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<BTreeSet<_>, _>>()?;
        Ok(titles)
    }

    fn save(&self, titles: &BTreeSet<String>) -> StoreResult<()> {
        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        let existing = {
            let mut stmt = tx.prepare("SELECT title FROM posted_titles")?;
            let rows = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<BTreeSet<_>, _>>()?;
            rows
        };
        let now = Utc::now().to_rfc3339();
        for title in titles.difference(&existing) {
            tx.execute(
                "INSERT INTO posted_titles(title, posted_at) VALUES (?1, ?2)",
                params![title, now],
            )?;
        }
        for title in existing.difference(titles) {
            tx.execute("DELETE FROM posted_titles WHERE title = ?1", params![title])?;
        }
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn titles(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn builder_requires_path() {
        let err = SqliteDedupStore::builder().build().unwrap_err();
        assert!(matches!(err, StoreError::MissingPath));
    }

    #[test]
    fn missing_database_is_not_created_on_request() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("posted.sqlite");
        let store = SqliteDedupStore::builder()
            .path(&path)
            .create_if_missing(false)
            .build()
            .unwrap();
        let err = store.load().unwrap_err();
        assert!(matches!(err, StoreError::OpenDatabase { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn save_replaces_the_stored_set() {
        let dir = tempdir().unwrap();
        let store = SqliteDedupStore::new(dir.path().join("state/posted.sqlite")).unwrap();
        store.initialize().unwrap();
        assert!(store.load().unwrap().is_empty());

        store.save(&titles(&["Movie A", "Movie B"])).unwrap();
        assert_eq!(store.load().unwrap(), titles(&["Movie A", "Movie B"]));

        store.save(&titles(&["Movie B", "Movie C"])).unwrap();
        assert_eq!(store.load().unwrap(), titles(&["Movie B", "Movie C"]));
        assert_eq!(store.entries().unwrap().len(), 2);
    }
}
