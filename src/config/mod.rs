//! Configuration management for bookpub

pub mod schema;

pub use schema::Config;

use crate::error::{BookpubError, BookpubResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("bookpub")
            .join("config.toml")
    }

    /// Load configuration, falling back to defaults if the file is missing
    pub async fn load(&self) -> BookpubResult<Config> {
        if !self.config_path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        self.load_from_file(&self.config_path).await
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> BookpubResult<Config> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| BookpubError::io(format!("reading config from {}", path.display()), e))?;

        toml::from_str(&content).map_err(|e| BookpubError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Save configuration to file
    pub async fn save(&self, config: &Config) -> BookpubResult<()> {
        self.ensure_config_dir().await?;

        let content = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, content).await.map_err(|e| {
            BookpubError::io(
                format!("writing config to {}", self.config_path.display()),
                e,
            )
        })?;

        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    /// Ensure the config directory exists
    async fn ensure_config_dir(&self) -> BookpubResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| BookpubError::ConfigDirCreate {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }
        Ok(())
    }

    /// Ensure the checkout and built site roots exist
    pub async fn ensure_storage_dirs(config: &Config) -> BookpubResult<()> {
        let dirs = [
            &config.storage.checkout_root,
            &config.storage.built_sites_root,
        ];

        for dir in dirs {
            fs::create_dir_all(dir).await.map_err(|e| {
                BookpubError::io(format!("creating directory {}", dir.display()), e)
            })?;
        }

        Ok(())
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_default_when_missing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nonexistent.toml");
        let manager = ConfigManager::with_path(path);

        let config = manager.load().await.unwrap();
        assert_eq!(config.server.port, 9200);
    }

    #[tokio::test]
    async fn save_and_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.toml");
        let manager = ConfigManager::with_path(path);

        let mut config = Config::default();
        config.server.port = 8080;
        config.build.command = vec!["make".to_string(), "html".to_string()];

        manager.save(&config).await.unwrap();
        let loaded = manager.load().await.unwrap();

        assert_eq!(loaded.server.port, 8080);
        assert_eq!(loaded.build.command, vec!["make", "html"]);
    }

    #[tokio::test]
    async fn invalid_file_is_reported() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "[server]\nport = \"not a number\"\n").unwrap();

        let err = ConfigManager::with_path(path).load().await.unwrap_err();
        assert!(matches!(err, BookpubError::ConfigInvalid { .. }));
        assert!(err.hint().is_some());
    }

    #[tokio::test]
    async fn storage_dirs_are_created() {
        let temp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.storage.checkout_root = temp.path().join("repos");
        config.storage.built_sites_root = temp.path().join("sites");

        ConfigManager::ensure_storage_dirs(&config).await.unwrap();
        assert!(temp.path().join("repos").is_dir());
        assert!(temp.path().join("sites").is_dir());
    }
}
