use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use crate::error::{Error, Result};

pub const API_KEY_ENV: &str = "NEWS_API_KEY";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub article: ArticleConfig,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default, skip_serializing)]
    pub api_key: Option<ApiKey>,

    /// Seconds a raw provider response stays cached.
    #[serde(default = "default_feed_ttl")]
    pub feed_ttl: u64,

    #[serde(default = "default_upstream_timeout")]
    pub timeout: u64,

    #[serde(default = "default_country")]
    pub default_country: String,

    #[serde(default = "default_language")]
    pub default_language: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleConfig {
    #[serde(default = "default_article_timeout")]
    pub timeout: u64,

    #[serde(default = "default_max_article_size")]
    pub max_size: u64,

    #[serde(default = "default_article_ttl")]
    pub cache_ttl: u64,

    /// Disables the private-network guard. Only meant for local testing.
    #[serde(default)]
    pub allow_private_hosts: bool,

    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    #[serde(default = "default_article_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub log_to_file: bool,

    #[serde(default = "default_log_file")]
    pub log_file: String,

    #[serde(default)]
    pub json_format: bool,
}

/// Provider credential. Never printed, never serialized.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .map_err(|e| Error::Config(format!("{}: {}", path.as_ref().display(), e)))?;

        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let _ = dotenvy::dotenv();
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load from an explicit path, the default location, or fall back to defaults.
    pub fn resolve(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_with_env(path);
        }

        let default_path = Self::config_dir()?.join("config.toml");
        if default_path.exists() {
            return Self::load_with_env(default_path);
        }

        let _ = dotenvy::dotenv();
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let base = url::Url::parse(&self.upstream.base_url)
            .map_err(|e| Error::Config(format!("Invalid upstream base_url: {}", e)))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(Error::Config("Upstream base_url must be http or https".to_string()));
        }

        if self.upstream.feed_ttl == 0 {
            return Err(Error::Config("Feed TTL must be greater than 0".to_string()));
        }

        if self.upstream.timeout == 0 || self.article.timeout == 0 {
            return Err(Error::Config("Timeouts must be greater than 0".to_string()));
        }

        if self.article.max_size == 0 {
            return Err(Error::Config("Article max size must be greater than 0".to_string()));
        }

        if self.article.cache_ttl == 0 {
            return Err(Error::Config("Article cache TTL must be greater than 0".to_string()));
        }

        if self.cache.max_entries == 0 {
            return Err(Error::Config("Cache max entries must be greater than 0".to_string()));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(API_KEY_ENV) {
            if !key.trim().is_empty() {
                self.upstream.api_key = Some(ApiKey::new(key.trim()));
            }
        }

        if let Some(host) = lookup("NEWSPROXY_HOST") {
            self.server.host = host;
        }

        if let Some(port) = lookup("NEWSPROXY_PORT") {
            if let Ok(val) = port.parse() {
                self.server.port = val;
            }
        }

        if let Some(level) = lookup("NEWSPROXY_LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("newsproxy"))
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))
    }
}

impl UpstreamConfig {
    pub fn feed_ttl(&self) -> Duration {
        Duration::from_secs(self.feed_ttl)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

impl ArticleConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            feed_ttl: default_feed_ttl(),
            timeout: default_upstream_timeout(),
            default_country: default_country(),
            default_language: default_language(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for ArticleConfig {
    fn default() -> Self {
        Self {
            timeout: default_article_timeout(),
            max_size: default_max_article_size(),
            cache_ttl: default_article_ttl(),
            allow_private_hosts: false,
            max_redirects: default_max_redirects(),
            user_agent: default_article_user_agent(),
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_to_file: false,
            log_file: default_log_file(),
            json_format: false,
        }
    }
}

fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 3000 }

fn default_base_url() -> String { "https://newsapi.org/v2".to_string() }
fn default_feed_ttl() -> u64 { 30 }
fn default_upstream_timeout() -> u64 { 30 }
fn default_country() -> String { "us".to_string() }
fn default_language() -> String { "en".to_string() }
fn default_user_agent() -> String {
    format!("newsproxy/{}", env!("CARGO_PKG_VERSION"))
}

fn default_article_timeout() -> u64 { 10 }
fn default_max_article_size() -> u64 { 1024 * 1024 } // 1 MiB
fn default_article_ttl() -> u64 { 60 * 60 * 24 }
fn default_max_redirects() -> usize { 5 }
fn default_article_user_agent() -> String {
    format!("Mozilla/5.0 (compatible; newsproxy/{})", env!("CARGO_PKG_VERSION"))
}

fn default_max_entries() -> usize { 1000 }

fn default_log_level() -> String { "info".to_string() }
fn default_log_file() -> String { "logs/newsproxy.log".to_string() }
