use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ReelfeedConfig {
    pub source: SourceSection,
    pub http: HttpSection,
    pub browser: BrowserSection,
    pub resolver: ResolverSection,
    pub poll: PollSection,
    pub publisher: PublisherSection,
    pub store: StoreSection,
}

impl ReelfeedConfig {
    pub fn validate(&self) -> Result<()> {
        if self.source.terminal_marker.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "source.terminal_marker",
                reason: "must not be empty".into(),
            });
        }
        if self.source.intermediary_marker.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "source.intermediary_marker",
                reason: "must not be empty".into(),
            });
        }
        if self.resolver.max_retries == 0 {
            return Err(ConfigError::Invalid {
                field: "resolver.max_retries",
                reason: "must be at least 1".into(),
            });
        }
        if self.resolver.server_labels.is_empty() {
            return Err(ConfigError::Invalid {
                field: "resolver.server_labels",
                reason: "at least one label is required".into(),
            });
        }
        Ok(())
    }

    /// Resolves the store path relative to the directory holding the config file.
    pub fn resolve_store_path(&self, config_dir: &Path) -> PathBuf {
        let path = Path::new(&self.store.path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            config_dir.join(path)
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceSection {
    pub catalog_url: String,
    pub listing_selector: String,
    pub title_selector: String,
    pub intermediary_marker: String,
    pub content_box_selector: String,
    pub terminal_marker: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpSection {
    pub user_agent: String,
    pub timeout_seconds: u64,
}

impl HttpSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.max(1))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrowserSection {
    pub executable_path: String,
    pub headless: bool,
    pub sandbox: bool,
    pub disable_gpu: bool,
    #[serde(default)]
    pub extra_args: Vec<String>,
    pub request_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResolverSection {
    pub max_retries: u32,
    pub navigation_timeout_seconds: u64,
    pub gate_timeout_seconds: u64,
    pub file_name_selector: String,
    pub gate_selector: String,
    pub button_selector: String,
    pub server_labels: Vec<String>,
}

impl ResolverSection {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_seconds)
    }

    pub fn gate_timeout(&self) -> Duration {
        Duration::from_secs(self.gate_timeout_seconds)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollSection {
    pub interval_seconds: u64,
    pub post_delay_seconds: u64,
    #[serde(default)]
    pub max_listings_per_cycle: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublisherSection {
    pub api_base: String,
    pub channel_id: String,
    pub token_env: String,
    pub header: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Json,
    Sqlite,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreSection {
    pub backend: StoreBackend,
    pub path: String,
}

pub fn load_reelfeed_config<P: AsRef<Path>>(path: P) -> Result<ReelfeedConfig> {
    let config: ReelfeedConfig = load_toml(path)?;
    config.validate()?;
    Ok(config)
}

fn load_toml<T, P>(path: P) -> Result<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        source,
        path: path.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture_path() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../configs/reelfeed.toml")
    }

    #[test]
    fn load_fixture_config() {
        let config = load_reelfeed_config(fixture_path()).expect("config should parse");
        assert_eq!(config.source.terminal_marker, "hubcloud");
        assert_eq!(config.source.intermediary_marker, "howblogs.xyz");
        assert_eq!(config.resolver.max_retries, 5);
        assert_eq!(config.resolver.server_labels.len(), 2);
        assert_eq!(config.store.backend, StoreBackend::Json);
        assert_eq!(config.resolver.navigation_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn zero_retry_budget_is_rejected() {
        let mut config = load_reelfeed_config(fixture_path()).unwrap();
        config.resolver.max_retries = 0;
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "resolver.max_retries",
                ..
            }
        ));
    }

    #[test]
    fn relative_store_path_joins_config_dir() {
        let config = load_reelfeed_config(fixture_path()).unwrap();
        let resolved = config.resolve_store_path(Path::new("/srv/reelfeed"));
        assert_eq!(resolved, PathBuf::from("/srv/reelfeed/data/movies.json"));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load_reelfeed_config("/nonexistent/reelfeed.toml").unwrap_err();
        match err {
            ConfigError::Io { path, .. } => {
                assert_eq!(path, PathBuf::from("/nonexistent/reelfeed.toml"))
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
