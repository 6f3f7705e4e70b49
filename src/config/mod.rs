use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::error::{Result, ScrapingError};
use crate::limits::Proxy;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub crawl: CrawlConfig,
    pub rate_limits: RateLimitConfig,
    pub proxies: ProxyConfig,
}

/// Per-job crawl defaults; seed URLs come from the caller, not the file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CrawlConfig {
    pub max_depth: usize,
    pub max_pages: usize,
    pub delay_ms: u64,
    pub concurrent: usize,
    pub timeout_ms: u64,
    pub follow_redirects: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    pub global_per_second: u32,
    pub domain_per_second: u32,
    pub max_concurrent: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProxyConfig {
    pub enabled: bool,
    pub list: Vec<Proxy>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            crawl: CrawlConfig {
                max_depth: 2,
                max_pages: 50,
                delay_ms: 1000,
                concurrent: 3,
                timeout_ms: 30000,
                follow_redirects: true,
            },
            rate_limits: RateLimitConfig {
                global_per_second: 5,
                domain_per_second: 2,
                max_concurrent: 10,
            },
            proxies: ProxyConfig {
                enabled: false,
                list: Vec::new(),
            },
        }
    }
}

#[async_trait::async_trait]
pub trait ConfigManager {
    async fn load_config(&self) -> Result<Config>;
    async fn save_config(&self, config: &Config) -> Result<()>;
    fn validate_config(&self, config: &Config) -> Result<()>;
}

pub struct FileConfigManager {
    config_path: PathBuf,
}

impl FileConfigManager {
    pub fn new(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    /// Create a default configuration file
    async fn create_default_config(&self) -> Result<()> {
        let default_config = Config::default();
        let toml_content = toml::to_string_pretty(&default_config)
            .map_err(|e| ScrapingError::ConfigError(format!("Failed to serialize default config: {}", e)))?;

        // Create parent directory if it doesn't exist
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ScrapingError::ConfigError(format!("Failed to create config directory: {}", e)))?;
        }

        fs::write(&self.config_path, toml_content)
            .map_err(|e| ScrapingError::ConfigError(format!("Failed to write default config: {}", e)))?;

        info!("Default configuration file created at {:?}", self.config_path);
        Ok(())
    }
}

#[async_trait::async_trait]
impl ConfigManager for FileConfigManager {
    async fn load_config(&self) -> Result<Config> {
        info!("Loading configuration from {:?}", self.config_path);

        // check if config file exists, create default if not
        if !self.config_path.exists() {
            warn!("Configuration file not found, creating default config at {:?}", self.config_path);
            self.create_default_config().await?;
        }

        let config_content = fs::read_to_string(&self.config_path)
            .map_err(|e| ScrapingError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&config_content)
            .map_err(|e| ScrapingError::ConfigError(format!("Failed to parse TOML config: {}", e)))?;

        self.validate_config(&config)?;

        info!("Configuration loaded successfully");
        Ok(config)
    }

    async fn save_config(&self, config: &Config) -> Result<()> {
        info!("Saving configuration to {:?}", self.config_path);

        let toml_content = toml::to_string_pretty(config)
            .map_err(|e| ScrapingError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        fs::write(&self.config_path, toml_content)
            .map_err(|e| ScrapingError::ConfigError(format!("Failed to write config file: {}", e)))?;

        info!("Configuration saved successfully");
        Ok(())
    }

    fn validate_config(&self, config: &Config) -> Result<()> {
        debug!("Validating configuration");

        // checking crawl config
        if config.crawl.max_pages == 0 {
            return Err(ScrapingError::ConfigError("max_pages must be greater than 0".to_string()).into());
        }
        if config.crawl.concurrent == 0 {
            return Err(ScrapingError::ConfigError("concurrent must be greater than 0".to_string()).into());
        }
        if config.crawl.concurrent > 50 {
            return Err(ScrapingError::ConfigError("concurrent cannot exceed 50 for resource safety".to_string()).into());
        }
        if config.crawl.timeout_ms == 0 {
            return Err(ScrapingError::ConfigError("timeout_ms must be greater than 0".to_string()).into());
        }
        if config.crawl.delay_ms > 60000 {
            return Err(ScrapingError::ConfigError("delay_ms cannot exceed 60 seconds".to_string()).into());
        }

        // checking rate limit config
        if config.rate_limits.global_per_second == 0 {
            return Err(ScrapingError::ConfigError("global_per_second must be greater than 0".to_string()).into());
        }
        if config.rate_limits.domain_per_second == 0 {
            return Err(ScrapingError::ConfigError("domain_per_second must be greater than 0".to_string()).into());
        }
        if config.rate_limits.max_concurrent == 0 {
            return Err(ScrapingError::ConfigError("max_concurrent must be greater than 0".to_string()).into());
        }

        // checking proxy list if enabled
        if config.proxies.enabled {
            if config.proxies.list.is_empty() {
                return Err(ScrapingError::ConfigError("proxies enabled but list is empty".to_string()).into());
            }
            for proxy in &config.proxies.list {
                if proxy.host.trim().is_empty() {
                    return Err(ScrapingError::ConfigError("proxy host cannot be empty".to_string()).into());
                }
                if proxy.port == 0 {
                    return Err(ScrapingError::ConfigError(format!("proxy '{}' has invalid port", proxy.host)).into());
                }
            }
        }

        debug!("Configuration validation passed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_load_default_config() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        let manager = FileConfigManager::new(config_path.clone());

        let config = manager.load_config().await.unwrap();

        assert_eq!(config.crawl.max_depth, 2);
        assert_eq!(config.crawl.max_pages, 50);
        assert_eq!(config.crawl.concurrent, 3);
        assert_eq!(config.rate_limits.global_per_second, 5);
        assert!(!config.proxies.enabled);
        assert!(config_path.exists());
    }

    #[tokio::test]
    async fn test_config_roundtrip() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        let manager = FileConfigManager::new(config_path);

        let mut config = Config::default();
        config.crawl.max_pages = 10;
        config.crawl.concurrent = 2;
        manager.save_config(&config).await.unwrap();

        let loaded = manager.load_config().await.unwrap();
        assert_eq!(loaded.crawl.max_pages, 10);
        assert_eq!(loaded.crawl.concurrent, 2);
    }

    #[tokio::test]
    async fn test_config_validation() {
        let manager = FileConfigManager::new(PathBuf::from("test.toml"));

        // Test valid config
        let valid_config = Config::default();
        assert!(manager.validate_config(&valid_config).is_ok());

        // Test invalid config - max_pages = 0
        let mut invalid_config = Config::default();
        invalid_config.crawl.max_pages = 0;
        assert!(manager.validate_config(&invalid_config).is_err());

        // Test invalid config - concurrent = 0
        let mut invalid_config = Config::default();
        invalid_config.crawl.concurrent = 0;
        assert!(manager.validate_config(&invalid_config).is_err());

        // Test invalid config - proxies enabled with empty list
        let mut invalid_config = Config::default();
        invalid_config.proxies.enabled = true;
        assert!(manager.validate_config(&invalid_config).is_err());

        // Test invalid config - zero rate budget
        let mut invalid_config = Config::default();
        invalid_config.rate_limits.domain_per_second = 0;
        assert!(manager.validate_config(&invalid_config).is_err());
    }
}
