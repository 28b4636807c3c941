use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};
use crate::feed::FeedSource;

pub const ANIME_NEWS_NETWORK_RSS: &str = "https://www.animenewsnetwork.com/all/rss.xml?ann-edition=us";
pub const CRUNCHYROLL_RSS: &str = "https://www.crunchyroll.com/news/rss";
pub const JIKAN_BASE_URL: &str = "https://api.jikan.moe/v4";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_sources")]
    pub sources: Vec<FeedSource>,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub throttle: ThrottleSettings,
    #[serde(default)]
    pub image_cache: ImageCacheSettings,
    #[serde(default)]
    pub api: ApiSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Per-source request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_max_feed_size")]
    pub max_feed_size: usize,

    /// Seconds between cycles in `news --watch`.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrottleSettings {
    #[serde(default = "default_throttle_capacity")]
    pub capacity: u32,

    /// Steady-state rate; one token is minted every `1s / requests_per_second`.
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageCacheSettings {
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    #[serde(default = "default_api_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json_format: bool,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .map_err(|_| ConfigError::NotFound(path.as_ref().display().to_string()))?;

        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` when it exists, otherwise the defaults; env overrides apply to both.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::config_file()?,
        };

        if path.exists() {
            Self::load_with_env(&path)
        } else {
            let mut config = Self::default();
            config.apply_env_overrides();
            config.validate()?;
            Ok(config)
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        for source in &self.sources {
            if source.name.trim().is_empty() {
                return Err(ConfigError::Invalid("Source name cannot be empty".to_string()));
            }

            let url = url::Url::parse(&source.url)
                .map_err(|_| ConfigError::InvalidUrl(source.url.clone()))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(ConfigError::InvalidUrl(source.url.clone()));
            }
        }

        if self.settings.timeout == 0 || self.image_cache.timeout == 0 {
            return Err(ConfigError::Invalid("Timeout must be greater than 0".to_string()));
        }

        if self.throttle.capacity == 0 {
            return Err(ConfigError::Invalid("Throttle capacity must be greater than 0".to_string()));
        }

        if self.throttle.requests_per_second == 0 {
            return Err(ConfigError::Invalid("Throttle rate must be greater than 0".to_string()));
        }

        if self.image_cache.max_entries == 0 {
            return Err(ConfigError::Invalid("Image cache size must be greater than 0".to_string()));
        }

        url::Url::parse(&self.api.base_url)
            .map_err(|_| ConfigError::InvalidUrl(self.api.base_url.clone()))?;

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("ANIMENEWS_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Ok(timeout) = std::env::var("ANIMENEWS_TIMEOUT") {
            if let Ok(val) = timeout.parse() {
                self.settings.timeout = val;
            }
        }

        if let Ok(user_agent) = std::env::var("ANIMENEWS_USER_AGENT") {
            if !user_agent.trim().is_empty() {
                self.settings.user_agent = user_agent;
            }
        }
    }

    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("animenews"))
            .ok_or_else(|| ConfigError::Config("Could not determine config directory".to_string()))
    }

    pub fn config_file() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sources: default_sources(),
            settings: Settings::default(),
            throttle: ThrottleSettings::default(),
            image_cache: ImageCacheSettings::default(),
            api: ApiSettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Settings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            user_agent: default_user_agent(),
            max_feed_size: default_max_feed_size(),
            refresh_interval: default_refresh_interval(),
        }
    }
}

impl Default for ThrottleSettings {
    fn default() -> Self {
        Self {
            capacity: default_throttle_capacity(),
            requests_per_second: default_requests_per_second(),
        }
    }
}

impl Default for ImageCacheSettings {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            timeout: default_timeout(),
        }
    }
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
        }
    }
}

fn default_sources() -> Vec<FeedSource> {
    vec![
        FeedSource::new("Anime News Network", ANIME_NEWS_NETWORK_RSS),
        FeedSource::new("Crunchyroll", CRUNCHYROLL_RSS),
    ]
}

fn default_timeout() -> u64 { 15 }
fn default_user_agent() -> String {
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Safari/605.1.15".to_string()
}
fn default_max_feed_size() -> usize { 10 * 1024 * 1024 } // 10MB
fn default_refresh_interval() -> u64 { 300 }

fn default_throttle_capacity() -> u32 { 3 }
fn default_requests_per_second() -> u32 { 3 }

fn default_max_entries() -> usize { 100 }

fn default_api_base_url() -> String { JIKAN_BASE_URL.to_string() }

fn default_log_level() -> String { "warn".to_string() }

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::SourceClass;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.settings.timeout, 15);
        assert_eq!(config.throttle.capacity, 3);
        assert_eq!(config.throttle.requests_per_second, 3);
        assert_eq!(config.image_cache.max_entries, 100);
        assert!(config.settings.user_agent.starts_with("Mozilla/5.0"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[[sources]]
name = "Jikan Watch"
url = "https://api.jikan.moe/v4/watch/episodes"
class = "rate_limited"

[settings]
timeout = 5
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.sources.len(), 1);
        assert_eq!(config.sources[0].class, SourceClass::RateLimited);
        assert_eq!(config.settings.timeout, 5);
        assert_eq!(config.settings.max_feed_size, 10 * 1024 * 1024);
        assert_eq!(config.image_cache.max_entries, 100);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.throttle.capacity = 5;
        config.save(&path).unwrap();

        let reloaded = Config::load(&path).unwrap();
        assert_eq!(reloaded.throttle.capacity, 5);
        assert_eq!(reloaded.sources, config.sources);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.sources.push(FeedSource::new("Local", "file:///etc/passwd"));
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.sources.push(FeedSource::new(" ", "https://example.com/rss"));
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.throttle.capacity = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.image_cache.max_entries = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let result = Config::load("/definitely/not/here.toml");
        assert!(matches!(result, Err(crate::Error::NotFound(_))));
    }
}
