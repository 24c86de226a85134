use crate::error::ValidationError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";

/// Configuration for the REST backend
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ApiConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub page_size: Option<u32>,
}

fn default_timeout_ms() -> u64 {
    15_000
}

fn default_page_size() -> u32 {
    20
}

/// Where the session token and expiry are persisted
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct SessionConfig {
    #[serde(default)]
    pub storage_path: Option<PathBuf>,
}

/// Activity journal (JSONL)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JournalConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            dir: None,
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub journal: JournalConfig,
}

impl Config {
    /// Load configuration from default paths
    /// Priority: local (.shelf/config.local.toml) > project (.shelf/config.toml) > user (~/.shelf/config.toml)
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".shelf").join("config.toml");
            if user_config.exists() {
                config.merge(Self::load_from(&user_config)?);
            }
        }

        let project_config = Path::new(".shelf").join("config.toml");
        if project_config.exists() {
            config.merge(Self::load_from(&project_config)?);
        }

        // Should be gitignored
        let local_config = Path::new(".shelf").join("config.local.toml");
        if local_config.exists() {
            config.merge(Self::load_from(&local_config)?);
        }

        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Merge another config into this one (other takes priority for every value it sets)
    pub fn merge(&mut self, other: Config) {
        if other.api.base_url.is_some() {
            self.api.base_url = other.api.base_url;
        }
        if other.api.timeout_ms.is_some() {
            self.api.timeout_ms = other.api.timeout_ms;
        }
        if other.api.page_size.is_some() {
            self.api.page_size = other.api.page_size;
        }
        if other.session.storage_path.is_some() {
            self.session.storage_path = other.session.storage_path;
        }
        if other.journal.dir.is_some() {
            self.journal.dir = other.journal.dir;
        }
        // Only an explicit opt-out is meaningful.
        if !other.journal.enabled {
            self.journal.enabled = false;
        }
    }

    pub fn base_url(&self) -> &str {
        self.api.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn timeout_ms(&self) -> u64 {
        self.api.timeout_ms.unwrap_or_else(default_timeout_ms)
    }

    pub fn page_size(&self) -> u32 {
        self.api.page_size.unwrap_or_else(default_page_size)
    }

    /// Session file; `None` when there is no home directory to put it in.
    pub fn session_path(&self) -> Option<PathBuf> {
        self.session
            .storage_path
            .clone()
            .or_else(crate::storage::FileStorage::default_path)
    }

    pub fn journal_dir(&self) -> PathBuf {
        self.journal
            .dir
            .clone()
            .unwrap_or_else(|| Path::new(".shelf").join("journal"))
    }

    /// Validate configuration and return any errors found
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        let base_url = self.base_url();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            errors.push(ValidationError::new(
                "api.base_url",
                format!("Expected an http(s) URL, got '{}'", base_url),
            ));
        }

        if self.timeout_ms() == 0 {
            errors.push(ValidationError::new("api.timeout_ms", "Must be greater than 0"));
        }

        if self.page_size() == 0 {
            errors.push(ValidationError::new("api.page_size", "Must be greater than 0"));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
