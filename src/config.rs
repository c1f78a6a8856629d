//! Configuration management for Manga Saver.
//!
//! Handles loading, saving, and validating configuration from
//! platform-specific config directories.

use crate::cache::DEFAULT_UPDATE_INTERVAL_SEC;
use crate::error::ConfigError;
use crate::source::{AttrFilter, SourceConfig, SourceRegistry};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application name used for config directory.
const APP_NAME: &str = "MangaSaver";

/// Default config filename.
const CONFIG_FILENAME: &str = "config.toml";

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Web scraping settings.
    pub scraping: ScrapingConfig,

    /// Index cache settings.
    pub cache: CacheConfig,

    /// File paths.
    pub paths: PathsConfig,

    /// Source websites.
    pub sources: Vec<SourceConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scraping: ScrapingConfig::default(),
            cache: CacheConfig::default(),
            paths: PathsConfig::default(),
            sources: vec![SourceConfig {
                name: "MangaReader".to_string(),
                root_url: "http://www.mangareader.net/".to_string(),
                slug_filler: "-".to_string(),
                is_multipage: true,
                page_image: Some(AttrFilter::from([("id".to_string(), "img".to_string())])),
                index_tag: "table".to_string(),
                index: Some(AttrFilter::from([("id".to_string(), "listing".to_string())])),
            }],
        }
    }
}

/// Web scraping configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapingConfig {
    /// User agent sent with every request.
    pub user_agent: String,
    /// Request timeout in seconds; 0 leaves the client default.
    pub timeout_sec: u64,
    /// Enable scraper debug logging.
    pub debug: bool,
}

impl Default for ScrapingConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            timeout_sec: 30,
            debug: false,
        }
    }
}

/// Index cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Seconds before a cached index page is fetched again.
    pub update_interval_sec: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            update_interval_sec: DEFAULT_UPDATE_INTERVAL_SEC,
        }
    }
}

/// File path configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory chapters are saved under.
    pub output_directory: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            output_directory: PathBuf::from("."),
        }
    }
}

impl Config {
    /// Returns the platform-specific config directory path.
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|p| p.join(APP_NAME))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Returns the full path to the config file.
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join(CONFIG_FILENAME))
    }

    /// Loads configuration from the default location.
    ///
    /// If the config file doesn't exist, creates a default one.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let config = Config::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        Ok(config)
    }

    /// Saves configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Builds the source registry, validating every configured source.
    pub fn source_registry(&self) -> Result<SourceRegistry, ConfigError> {
        SourceRegistry::from_configs(&self.sources).map_err(|e| ConfigError::InvalidValue {
            key: "sources".to_string(),
            message: e.to_string(),
        })
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sources.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "sources".to_string(),
                message: "at least one source must be configured".to_string(),
            });
        }

        self.source_registry()?;
        Ok(())
    }
}
