//! Configuration loading and root folder resolution
//!
//! Every setting is resolved with the same priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`SPM_*`)
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing TOML file is never fatal; the compiled defaults are used instead.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Default HTTP port for spm-server
pub const DEFAULT_PORT: u16 = 5780;

/// Default Stash endpoint (Stash's own default port)
pub const DEFAULT_STASH_URL: &str = "http://localhost:9999";

/// Default lifetime of a cached marker set
pub const DEFAULT_CACHE_TTL_MINUTES: u64 = 15;

pub const ENV_ROOT_FOLDER: &str = "SPM_ROOT_FOLDER";
pub const ENV_STASH_URL: &str = "SPM_STASH_URL";
pub const ENV_STASH_API_KEY: &str = "SPM_STASH_API_KEY";
pub const ENV_PORT: &str = "SPM_PORT";

/// Bootstrap configuration loaded from `spm.toml`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    /// Folder holding `spm.db` and the file-backed marker cache
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Base URL of the Stash server (without `/graphql`)
    #[serde(default)]
    pub stash_url: Option<String>,

    /// Stash API key, sent as the `ApiKey` header
    #[serde(default)]
    pub stash_api_key: Option<String>,

    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Marker cache configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Entry lifetime in minutes
    #[serde(default = "default_ttl_minutes")]
    pub ttl_minutes: u64,

    /// Backing store for cache entries
    #[serde(default)]
    pub backend: CacheBackend,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: default_ttl_minutes(),
            backend: CacheBackend::default(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_minutes.saturating_mul(60))
    }
}

/// Where cached marker sets live
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// Process-local map, lost on restart
    #[default]
    Memory,
    /// One JSON document per key under `<root_folder>/marker-cache`
    File,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_ttl_minutes() -> u64 {
    DEFAULT_CACHE_TTL_MINUTES
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Load TOML configuration from `path`
///
/// A missing file yields the defaults with a warning. A file that exists but
/// cannot be parsed is a configuration error.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!("Config file not found at {} (using defaults)", path.display());
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;

    info!("Loaded TOML configuration from {}", path.display());
    Ok(config)
}

/// Default configuration file path for the platform (`<config dir>/spm/spm.toml`)
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("spm").join("spm.toml"))
        .unwrap_or_else(|| PathBuf::from("spm.toml"))
}

/// Get OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("spm"))
        .unwrap_or_else(|| PathBuf::from("./spm_data"))
}

/// Resolve the root folder: CLI > `SPM_ROOT_FOLDER` > TOML > OS default
pub fn resolve_root_folder(cli_arg: Option<&Path>, toml_config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ENV_ROOT_FOLDER) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml_config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// Command-line overrides collected by the binary
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub root_folder: Option<PathBuf>,
    pub stash_url: Option<String>,
    pub stash_api_key: Option<String>,
    pub port: Option<u16>,
    pub log_level: Option<String>,
}

/// Fully resolved runtime configuration
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub root_folder: PathBuf,
    pub stash_url: String,
    pub stash_api_key: Option<String>,
    pub port: u16,
    pub cache: CacheConfig,
    pub log_level: String,
}

impl ResolvedConfig {
    /// Merge CLI overrides, environment and TOML into a single configuration
    pub fn resolve(overrides: ConfigOverrides, toml_config: TomlConfig) -> Result<Self> {
        let root_folder = resolve_root_folder(overrides.root_folder.as_deref(), &toml_config);

        let stash_url = overrides
            .stash_url
            .or_else(|| non_empty_env(ENV_STASH_URL))
            .or(toml_config.stash_url)
            .unwrap_or_else(|| DEFAULT_STASH_URL.to_string());

        let stash_api_key = overrides
            .stash_api_key
            .or_else(|| non_empty_env(ENV_STASH_API_KEY))
            .or(toml_config.stash_api_key)
            .filter(|key| !key.trim().is_empty());

        let port = match overrides.port {
            Some(port) => port,
            None => match non_empty_env(ENV_PORT) {
                Some(raw) => raw
                    .parse::<u16>()
                    .map_err(|e| Error::Config(format!("{} must be a port number: {}", ENV_PORT, e)))?,
                None => toml_config.port.unwrap_or(DEFAULT_PORT),
            },
        };

        if toml_config.cache.ttl_minutes == 0 {
            return Err(Error::Config("cache.ttl_minutes must be greater than zero".to_string()));
        }

        let log_level = overrides.log_level.unwrap_or(toml_config.logging.level);

        Ok(Self {
            root_folder,
            stash_url: stash_url.trim_end_matches('/').to_string(),
            stash_api_key,
            port,
            cache: toml_config.cache,
            log_level,
        })
    }

    /// Path of the SQLite database inside the root folder
    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join("spm.db")
    }

    /// Directory used by the file-backed marker cache
    pub fn cache_dir(&self) -> PathBuf {
        self.root_folder.join("marker-cache")
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
