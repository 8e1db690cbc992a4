use crate::paths::AppDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const CURRENT_CONFIG_VERSION: u32 = 1;

/// Environment variable overriding the cache root directory.
pub const CACHE_DIR_ENV: &str = "AIRWAVES_CACHE_DIR";
/// Environment variable overriding the cache TTL, in hours.
pub const CACHE_TTL_HOURS_ENV: &str = "AIRWAVES_CACHE_TTL_HOURS";

pub const DEFAULT_CACHE_ROOT: &str = ".cache";
pub const DEFAULT_CACHE_TTL_HOURS: f64 = 48.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_config_version")]
    pub config_version: u32,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub origin: OriginConfig,
    #[serde(default)]
    pub prefetch: PrefetchConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_version: default_config_version(),
            server: ServerConfig::default(),
            cache: CacheConfig::default(),
            origin: OriginConfig::default(),
            prefetch: PrefetchConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Optional JSON catalog used to seed the in-memory store.
    #[serde(default)]
    pub catalog: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            catalog: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_root")]
    pub root: PathBuf,
    /// Fractional hours are honoured, so `0.5` means thirty minutes.
    #[serde(default = "default_cache_ttl_hours")]
    pub ttl_hours: f64,
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,
}

impl CacheConfig {
    /// The configured TTL, or the 48 hour default when `ttl_hours` is not a
    /// positive number that fits in a [`Duration`].
    pub fn ttl(&self) -> Duration {
        hours_to_duration(self.ttl_hours).unwrap_or(Duration::from_secs(48 * 60 * 60))
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: default_cache_root(),
            ttl_hours: default_cache_ttl_hours(),
            download_timeout_secs: default_download_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OriginConfig {
    #[serde(default = "default_origin_base_url")]
    pub base_url: String,
    #[serde(default = "default_origin_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self {
            base_url: default_origin_base_url(),
            timeout_secs: default_origin_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrefetchConfig {
    #[serde(default = "default_prefetch_enabled")]
    pub enabled: bool,
    #[serde(default = "default_window_days")]
    pub window_days: u32,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,
}

impl PrefetchConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes.saturating_mul(60))
    }
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            enabled: default_prefetch_enabled(),
            window_days: default_window_days(),
            concurrency: default_concurrency(),
            interval_minutes: default_interval_minutes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: LogLevel,
    #[serde(default = "default_max_log_files")]
    pub max_log_files: usize,
    #[serde(default = "default_stdout_enabled")]
    pub stdout: bool,
    #[serde(default)]
    pub file_name: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_log_files: default_max_log_files(),
            stdout: default_stdout_enabled(),
            file_name: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("config validation failed: {0}")]
    Validation(ValidationError),
    #[error("failed to prepare configuration directories: {0}")]
    Directories(#[from] crate::paths::DirsError),
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("unsupported config_version {found}, expected {expected}")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("prefetch.concurrency must be at least 1")]
    ZeroConcurrency,
    #[error("prefetch.interval_minutes must be at least 1")]
    ZeroInterval,
}

impl Config {
    /// Load `config.toml` from the config directory, then apply environment overrides.
    pub fn load_or_default(dirs: &AppDirs) -> Result<Self, ConfigError> {
        dirs.ensure_exists()?;
        Self::load_from(&Self::config_path(dirs))
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            toml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate().map_err(ConfigError::Validation)?;
        Ok(config)
    }

    pub fn config_path(dirs: &AppDirs) -> PathBuf {
        dirs.config_dir().join("config.toml")
    }

    /// Apply `AIRWAVES_*` overrides. `lookup` abstracts the process environment.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(root) = lookup(CACHE_DIR_ENV).filter(|v| !v.trim().is_empty()) {
            self.cache.root = PathBuf::from(root.trim());
        }
        if let Some(raw) = lookup(CACHE_TTL_HOURS_ENV) {
            self.cache.ttl_hours = parse_ttl_hours(Some(&raw));
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.config_version != CURRENT_CONFIG_VERSION {
            return Err(ValidationError::UnsupportedVersion {
                found: self.config_version,
                expected: CURRENT_CONFIG_VERSION,
            });
        }
        if self.prefetch.concurrency == 0 {
            return Err(ValidationError::ZeroConcurrency);
        }
        if self.prefetch.interval_minutes == 0 {
            return Err(ValidationError::ZeroInterval);
        }
        Ok(())
    }
}

/// Parse a TTL in hours, falling back to 48 when unset, non-numeric,
/// non-positive or too large to express as a [`Duration`].
pub fn parse_ttl_hours(raw: Option<&str>) -> f64 {
    raw.map(str::trim)
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|hours| hours_to_duration(*hours).is_some())
        .unwrap_or(DEFAULT_CACHE_TTL_HOURS)
}

fn hours_to_duration(hours: f64) -> Option<Duration> {
    if !hours.is_finite() || hours <= 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(hours * 3600.0)
        .ok()
        .filter(|ttl| !ttl.is_zero())
}

fn default_config_version() -> u32 {
    CURRENT_CONFIG_VERSION
}

fn default_bind() -> String {
    "127.0.0.1:8080".into()
}

fn default_cache_root() -> PathBuf {
    PathBuf::from(DEFAULT_CACHE_ROOT)
}

fn default_cache_ttl_hours() -> f64 {
    DEFAULT_CACHE_TTL_HOURS
}

fn default_download_timeout_secs() -> u64 {
    300
}

fn default_origin_base_url() -> String {
    "https://api.sr.se".into()
}

fn default_origin_timeout_secs() -> u64 {
    20
}

fn default_prefetch_enabled() -> bool {
    true
}

fn default_window_days() -> u32 {
    14
}

fn default_concurrency() -> usize {
    4
}

fn default_interval_minutes() -> u64 {
    15
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

fn default_max_log_files() -> usize {
    7
}

fn default_stdout_enabled() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cache.ttl_hours, 48.0);
        assert_eq!(config.cache.ttl(), Duration::from_secs(48 * 3600));
        assert_eq!(config.cache.root, PathBuf::from(".cache"));
        assert_eq!(config.prefetch.window_days, 14);
        assert_eq!(config.prefetch.concurrency, 4);
        assert_eq!(config.prefetch.interval(), Duration::from_secs(15 * 60));
        assert_eq!(config.logging.level, LogLevel::Info);
    }

    #[test]
    fn invalid_version_rejected() {
        let mut config = Config::default();
        config.config_version = CURRENT_CONFIG_VERSION + 1;
        assert!(matches!(
            config.validate(),
            Err(ValidationError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn zero_concurrency_rejected() {
        let mut config = Config::default();
        config.prefetch.concurrency = 0;
        assert!(matches!(
            config.validate(),
            Err(ValidationError::ZeroConcurrency)
        ));
    }

    #[test]
    fn ttl_falls_back_on_garbage() {
        assert_eq!(parse_ttl_hours(None), 48.0);
        assert_eq!(parse_ttl_hours(Some("")), 48.0);
        assert_eq!(parse_ttl_hours(Some("abc")), 48.0);
        assert_eq!(parse_ttl_hours(Some("0")), 48.0);
        assert_eq!(parse_ttl_hours(Some("-3")), 48.0);
        assert_eq!(parse_ttl_hours(Some("NaN")), 48.0);
        assert_eq!(parse_ttl_hours(Some("inf")), 48.0);
        assert_eq!(parse_ttl_hours(Some(" 6 ")), 6.0);
    }

    #[test]
    fn huge_ttl_falls_back_instead_of_overflowing() {
        assert_eq!(parse_ttl_hours(Some("1e30")), 48.0);

        let mut config = Config::default();
        config.apply_env(|key| (key == CACHE_TTL_HOURS_ENV).then(|| "1e30".to_string()));
        assert_eq!(config.cache.ttl(), Duration::from_secs(48 * 3600));

        config.cache.ttl_hours = 1e30;
        assert_eq!(config.cache.ttl(), Duration::from_secs(48 * 3600));
        config.cache.ttl_hours = -1.0;
        assert_eq!(config.cache.ttl(), Duration::from_secs(48 * 3600));
    }

    #[test]
    fn fractional_ttl_is_not_rounded_up() {
        let mut config = Config::default();
        config.apply_env(|key| (key == CACHE_TTL_HOURS_ENV).then(|| "0.5".to_string()));
        assert_eq!(config.cache.ttl_hours, 0.5);
        assert_eq!(config.cache.ttl(), Duration::from_secs(30 * 60));
    }

    #[test]
    fn huge_interval_saturates() {
        let mut config = Config::default();
        config.prefetch.interval_minutes = u64::MAX;
        assert_eq!(config.prefetch.interval(), Duration::from_secs(u64::MAX));
    }

    #[test]
    fn env_overrides_cache_settings() {
        let mut config = Config::default();
        config.apply_env(|key| match key {
            CACHE_DIR_ENV => Some("/var/cache/airwaves".into()),
            CACHE_TTL_HOURS_ENV => Some("12".into()),
            _ => None,
        });
        assert_eq!(config.cache.root, PathBuf::from("/var/cache/airwaves"));
        assert_eq!(config.cache.ttl(), Duration::from_secs(12 * 3600));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [cache]
            ttl_hours = 6

            [prefetch]
            concurrency = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.cache.ttl_hours, 6.0);
        assert_eq!(config.cache.ttl(), Duration::from_secs(6 * 3600));
        assert_eq!(config.cache.download_timeout_secs, 300);
        assert_eq!(config.prefetch.concurrency, 2);
        assert_eq!(config.prefetch.window_days, 14);
        assert_eq!(config.origin.base_url, "https://api.sr.se");
    }
}
