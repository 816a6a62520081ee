use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::version::registries::github::DEFAULT_BASE_URL;

// =============================================================================
// Sync-related constants
// =============================================================================

/// Default refresh interval in milliseconds (1 hour)
pub const DEFAULT_REFRESH_INTERVAL_MS: i64 = 60 * 60 * 1000;

/// Default number of repositories synced at the same time
pub const DEFAULT_SYNC_CONCURRENCY: usize = 4;

/// Delay between starting each repository sync to avoid rate limiting (10ms)
pub const SYNC_STAGGER_DELAY_MS: u64 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Application configuration structure
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct AppConfig {
    pub github: GitHubConfig,
    pub sync: SyncConfig,
    pub database: DatabaseConfig,
}

/// Whether the configured owner is a user or an organization
#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OwnerKind {
    /// Listed through `/users/{owner}/repos`, which returns public
    /// repositories only even when a token is configured. Private app
    /// repositories of a user account are not synced; move them to an
    /// organization to include them.
    User,
    #[default]
    Org,
}

/// GitHub access configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct GitHubConfig {
    pub base_url: String,
    /// User or organization whose repositories hold the apps
    pub owner: Option<String>,
    pub owner_kind: OwnerKind,
    /// Personal access token; `GITHUB_TOKEN` is used when unset
    pub token: Option<String>,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            owner: None,
            owner_kind: OwnerKind::default(),
            token: None,
        }
    }
}

impl GitHubConfig {
    /// Token from the config file, falling back to the environment
    pub fn resolve_token(&self) -> Option<String> {
        resolve_token_with_env(self.token.clone(), std::env::var("GITHUB_TOKEN").ok())
    }
}

/// Catalog sync configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct SyncConfig {
    pub concurrency: usize,
    /// Repositories synced more recently than this are skipped (milliseconds)
    pub refresh_interval: i64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_SYNC_CONCURRENCY,
            refresh_interval: DEFAULT_REFRESH_INTERVAL_MS,
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct DatabaseConfig {
    /// Overrides the default catalog location
    pub path: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration from a JSON file, or defaults when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&content).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Catalog database location
    pub fn db_path(&self) -> PathBuf {
        self.database.path.clone().unwrap_or_else(db_path)
    }
}

fn resolve_token_with_env(configured: Option<String>, env_token: Option<String>) -> Option<String> {
    configured
        .or(env_token)
        .filter(|token| !token.trim().is_empty())
}

/// Returns the path to the data directory for bc-env-manager.
/// Uses $XDG_DATA_HOME/bc-env-manager if XDG_DATA_HOME is set,
/// otherwise falls back to ~/.local/share/bc-env-manager,
/// or ./bc-env-manager if neither is available.
pub fn data_dir() -> PathBuf {
    data_dir_with_env(std::env::var("XDG_DATA_HOME").ok(), dirs::home_dir())
}

/// Returns the path to the database file.
pub fn db_path() -> PathBuf {
    data_dir().join("catalog.db")
}

/// Returns the path to the log file.
pub fn log_path() -> PathBuf {
    data_dir().join("bc-env-manager.log")
}

fn data_dir_with_env(xdg_data_home: Option<String>, home_dir: Option<PathBuf>) -> PathBuf {
    let data_dir = xdg_data_home
        .map(PathBuf::from)
        .or_else(|| home_dir.map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));

    data_dir.join("bc-env-manager")
}
