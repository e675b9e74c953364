// Configuration module for plex-genre-sync
// Combines an optional TOML file with environment variables, read once at startup

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::models::SyncMode;

const APP_NAME: &str = "plex-genre-sync";
const CONFIG_FILENAME: &str = "config.toml";

pub const DEFAULT_LIBRARY_URL: &str = "http://plex:32400";
const DEFAULT_LANGUAGE: &str = "en";
const DEFAULT_PACING_MS: u64 = 1000;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Environment keys; the second name of each pair is the legacy one
const ENV_LIBRARY_URL: [&str; 2] = ["LIBRARY_SERVER_URL", "PLEX_URL"];
const ENV_LIBRARY_TOKEN: [&str; 2] = ["LIBRARY_SERVER_TOKEN", "PLEX_TOKEN"];
const ENV_CATALOG_API_KEY: [&str; 2] = ["CATALOG_API_KEY", "TMDB_API_KEY"];
const ENV_SYNC_MODE: &str = "SYNC_MODE";
const ENV_CATALOG_LANGUAGE: &str = "CATALOG_LANGUAGE";
const ENV_PACING_MS: &str = "PACING_MS";
const ENV_HTTP_TIMEOUT_SECS: &str = "HTTP_TIMEOUT_SECS";
const ENV_CONFIG_DIR: &str = "GENRE_SYNC_CONFIG_DIR";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing one or more required environment variables: {}", .0.join(", "))]
    Missing(Vec<&'static str>),

    #[error("Invalid SYNC_MODE '{0}' (expected 'update' or 'full-sync')")]
    InvalidSyncMode(String),

    #[error("Invalid value '{value}' for {key} (expected a whole number)")]
    InvalidNumber { key: &'static str, value: String },
}

/// TOML configuration file structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    /// Library server connection
    pub library: LibraryServerConfig,

    /// Metadata catalog configuration
    pub catalog: CatalogConfig,

    /// Sync behaviour
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LibraryServerConfig {
    pub url: Option<String>,
    pub token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub api_key: Option<String>,

    /// Language for genre names (default: en)
    pub language: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// "update" or "full-sync"
    pub mode: Option<String>,

    /// Delay after each item that hit an external API, in milliseconds
    pub pacing_ms: Option<u64>,

    /// Per-request timeout for both HTTP clients, in seconds
    pub http_timeout_secs: Option<u64>,
}

/// Application configuration - immutable once built
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub library_url: String,
    pub library_token: String,
    pub catalog_api_key: String,
    pub catalog_language: String,
    pub sync_mode: SyncMode,
    pub pacing: Duration,
    pub http_timeout: Duration,
}

impl AppConfig {
    /// Load configuration from TOML file and environment
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables
    /// 2. TOML config file
    /// 3. Default values
    pub fn load() -> Result<Self, ConfigError> {
        let config_dir = Self::find_config_dir();
        let config_file = Self::load_config_file(&config_dir);
        Self::build(config_file, |key| std::env::var(key).ok())
    }

    /// Find the config directory (for locating config.toml)
    fn find_config_dir() -> PathBuf {
        // Environment variable takes priority
        if let Ok(path) = std::env::var(ENV_CONFIG_DIR) {
            return PathBuf::from(path);
        }

        // Then XDG config dir
        if let Some(dir) = dirs::config_dir() {
            return dir.join(APP_NAME);
        }

        // Fallback to current directory
        std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
    }

    /// Load and parse the TOML config file; a missing or broken file means defaults
    fn load_config_file(config_dir: &Path) -> ConfigFile {
        let config_path = config_dir.join(CONFIG_FILENAME);

        if !config_path.exists() {
            tracing::debug!(
                "No config file found at {}, using environment only",
                config_path.display()
            );
            return ConfigFile::default();
        }

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded configuration from {}", config_path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to parse config file {}: {}. Using defaults.",
                        config_path.display(),
                        e
                    );
                    ConfigFile::default()
                }
            },
            Err(e) => {
                tracing::warn!(
                    "Failed to read config file {}: {}. Using defaults.",
                    config_path.display(),
                    e
                );
                ConfigFile::default()
            }
        }
    }

    /// Build configuration from config file with overrides from `env`
    pub fn build<F>(config_file: ConfigFile, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Empty strings count as unset
        let lookup = |key: &str| env(key).filter(|v| !v.trim().is_empty());
        let first_of = |keys: &[&str]| keys.iter().find_map(|k| lookup(*k));
        let non_empty = |v: Option<String>| v.filter(|v| !v.trim().is_empty());

        // The default address only applies when no URL was given at all;
        // a blank one is reported as missing.
        let url_given = ENV_LIBRARY_URL.iter().any(|k| env(*k).is_some())
            || config_file.library.url.is_some();
        let library_url = first_of(&ENV_LIBRARY_URL[..])
            .or_else(|| non_empty(config_file.library.url.clone()))
            .or_else(|| (!url_given).then(|| DEFAULT_LIBRARY_URL.to_string()));
        let library_token = first_of(&ENV_LIBRARY_TOKEN[..])
            .or_else(|| non_empty(config_file.library.token.clone()));
        let catalog_api_key = first_of(&ENV_CATALOG_API_KEY[..])
            .or_else(|| non_empty(config_file.catalog.api_key.clone()));

        let mut missing = Vec::new();
        if library_url.is_none() {
            missing.push(ENV_LIBRARY_URL[0]);
        }
        if library_token.is_none() {
            missing.push(ENV_LIBRARY_TOKEN[0]);
        }
        if catalog_api_key.is_none() {
            missing.push(ENV_CATALOG_API_KEY[0]);
        }
        let (Some(library_url), Some(library_token), Some(catalog_api_key)) =
            (library_url, library_token, catalog_api_key)
        else {
            return Err(ConfigError::Missing(missing));
        };

        let sync_mode = match lookup(ENV_SYNC_MODE).or(config_file.sync.mode) {
            Some(mode) => mode.parse::<SyncMode>().map_err(ConfigError::InvalidSyncMode)?,
            None => SyncMode::default(),
        };

        let catalog_language = lookup(ENV_CATALOG_LANGUAGE)
            .or(config_file.catalog.language)
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());

        let pacing_ms = match lookup(ENV_PACING_MS) {
            Some(v) => parse_number(ENV_PACING_MS, &v)?,
            None => config_file.sync.pacing_ms.unwrap_or(DEFAULT_PACING_MS),
        };

        let http_timeout_secs = match lookup(ENV_HTTP_TIMEOUT_SECS) {
            Some(v) => parse_number(ENV_HTTP_TIMEOUT_SECS, &v)?,
            None => config_file
                .sync
                .http_timeout_secs
                .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS),
        };

        Ok(Self {
            library_url,
            library_token,
            catalog_api_key,
            catalog_language,
            sync_mode,
            pacing: Duration::from_millis(pacing_ms),
            http_timeout: Duration::from_secs(http_timeout_secs),
        })
    }

    /// Log configuration status (secrets excluded)
    pub fn log_config(&self) {
        tracing::info!("Library server: {}", self.library_url);
        tracing::info!("Sync mode: {}", self.sync_mode);
        tracing::debug!("Catalog language: {}", self.catalog_language);
        tracing::debug!(
            "Pacing: {:?} per item, HTTP timeout: {:?}",
            self.pacing,
            self.http_timeout
        );
        if self.library_url == DEFAULT_LIBRARY_URL {
            tracing::info!(
                "Hint: set LIBRARY_SERVER_URL if your server is not at the default address"
            );
        }
    }
}

fn parse_number(key: &'static str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidNumber {
        key,
        value: value.to_string(),
    })
}
