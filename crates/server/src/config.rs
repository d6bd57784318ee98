use std::path::PathBuf;
use std::time::Duration;

use baywatch_core::debounce::{DEFAULT_SCROLL_COALESCE, MAX_SCROLL_COALESCE};
use baywatch_core::session::SessionConfig;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} is not a valid URL: {source}")]
    InvalidUrl {
        var: &'static str,
        #[source]
        source: url::ParseError,
    },

    #[error("{var} must be a whole number of milliseconds, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },
}

const DEFAULT_BASE_URL: &str = "http://localhost:8097/";

/// Runtime settings, read from `BAYWATCH_*` environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub db_path: String,
    pub catalog_path: PathBuf,
    pub bind_addr: String,
    /// Page that share links point at. Always a valid absolute URL.
    pub base_url: String,
    pub scroll_coalesce: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            db_path: "baywatch.db".to_string(),
            catalog_path: PathBuf::from("data/catalog.json"),
            bind_addr: "0.0.0.0:8097".to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            scroll_coalesce: DEFAULT_SCROLL_COALESCE,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any variable source; unset or empty variables keep their default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(db) = get("BAYWATCH_DB") {
            config.db_path = db;
        }
        if let Some(path) = get("BAYWATCH_CATALOG") {
            config.catalog_path = path.into();
        }
        if let Some(bind) = get("BAYWATCH_BIND") {
            config.bind_addr = bind;
        }
        if let Some(raw) = get("BAYWATCH_BASE_URL") {
            let url = Url::parse(raw.trim()).map_err(|source| ConfigError::InvalidUrl {
                var: "BAYWATCH_BASE_URL",
                source,
            })?;
            config.base_url = url.into();
        }
        if let Some(raw) = get("BAYWATCH_SCROLL_COALESCE_MS") {
            let ms: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidNumber {
                var: "BAYWATCH_SCROLL_COALESCE_MS",
                value: raw.clone(),
            })?;
            config.scroll_coalesce = Duration::from_millis(ms).min(MAX_SCROLL_COALESCE);
        }
        Ok(config)
    }

    pub fn share_base(&self) -> Result<Url, url::ParseError> {
        Url::parse(&self.base_url)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            scroll_coalesce: self.scroll_coalesce,
            ..SessionConfig::default()
        }
    }
}
