//! Configuration management for rill.
//!
//! Configuration is read from `~/.config/rill/config.toml` at startup.
//! If the file doesn't exist, a default configuration with comments is created.
//! The fetch cursor is not stored here; it lives with the account in the database.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::scheduler::{parse_interval, SchedulerConfig};
use crate::service::{AuthMode, ServiceConfig, DEFAULT_FETCH_LIMIT, DEFAULT_PAGE_SIZE};

/// Main configuration struct.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceSection,
    pub sync: SyncSection,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthKind {
    #[default]
    Token,
    Basic,
}

/// `[service]`: where the Miniflux instance lives and how to log in.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceSection {
    pub endpoint: String,
    pub auth: AuthKind,
    pub token: String,
    pub username: String,
    pub password: String,
    pub page_size: usize,
    pub fetch_limit: usize,
    pub import_groups: bool,
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            auth: AuthKind::Token,
            token: String::new(),
            username: String::new(),
            password: String::new(),
            page_size: DEFAULT_PAGE_SIZE,
            fetch_limit: DEFAULT_FETCH_LIMIT,
            import_groups: true,
        }
    }
}

impl ServiceSection {
    /// Account settings for the sync engine, with no cursor yet.
    pub fn to_service_config(&self) -> Result<ServiceConfig, ConfigError> {
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::Invalid("service.endpoint is not set".into()));
        }
        if self.page_size == 0 {
            return Err(ConfigError::Invalid("service.page_size must be positive".into()));
        }

        let auth = match self.auth {
            AuthKind::Token if self.token.is_empty() => {
                return Err(ConfigError::Invalid("service.token is not set".into()))
            }
            AuthKind::Token => AuthMode::Token {
                token: self.token.clone(),
            },
            AuthKind::Basic if self.username.is_empty() => {
                return Err(ConfigError::Invalid("service.username is not set".into()))
            }
            AuthKind::Basic => AuthMode::Basic {
                username: self.username.clone(),
                password: self.password.clone(),
            },
        };

        let mut config = ServiceConfig::new(self.endpoint.trim(), auth);
        config.page_size = self.page_size;
        config.fetch_limit = self.fetch_limit;
        config.import_groups = self.import_groups;
        Ok(config)
    }
}

/// `[sync]`: the background schedule.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncSection {
    pub interval: String,
    pub sync_on_start: bool,
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            interval: "30m".to_string(),
            sync_on_start: true,
        }
    }
}

impl SyncSection {
    pub fn interval(&self) -> Result<Duration, ConfigError> {
        parse_interval(&self.interval).map_err(ConfigError::Invalid)
    }

    pub fn scheduler_config(&self) -> Result<SchedulerConfig, ConfigError> {
        Ok(SchedulerConfig {
            interval: self.interval()?,
            sync_on_start: self.sync_on_start,
        })
    }
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// If the config file doesn't exist, creates a default one with comments.
    /// If the config file exists but is invalid, returns an error.
    /// Missing fields in the config file will use default values.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::default_config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            Self::create_default_config(config_path)?;
            return Ok(Self::default());
        }

        let content = fs::read_to_string(config_path).map_err(|e| ConfigError::Io {
            path: config_path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: config_path.to_path_buf(),
            source: e,
        })?;

        Ok(config)
    }

    /// Get the default config file path: `~/.config/rill/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("rill").join("config.toml"))
    }

    fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        file.write_all(Self::default_config_content().as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;

        Ok(())
    }

    /// Generate the default config file content with comments.
    fn default_config_content() -> String {
        r##"# rill configuration

[service]
# Base URL of the Miniflux instance, without the /v1 suffix
endpoint = ""

# "token" uses an API key (Settings > API Keys in Miniflux),
# "basic" uses username and password
auth = "token"
token = ""
# username = ""
# password = ""

# Entries requested per page
page_size = 125

# Soft cap on entries gathered per query. A query may overshoot it by one page.
fetch_limit = 250

# Create local groups from Miniflux categories
import_groups = true

[sync]
# How often `rill sync --watch` runs, e.g. "30m", "1h", "1d"
interval = "30m"

# Sync immediately when the watcher starts
sync_on_start = true
"##
        .to_string()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
