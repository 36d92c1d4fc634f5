//! Configuration management for Roost
//!
//! Defaults, TOML files and `ROOST_*` environment overrides, with
//! validation and feature flags.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

mod error;
mod feature_flags;

pub use error::ConfigError;
pub use feature_flags::{FeatureFlags, FeatureManager};

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Snapshot cache configuration
    pub cache: CacheConfig,

    /// Session configuration
    pub session: SessionConfig,

    /// Content filter configuration
    pub filter: FilterConfig,

    /// Input validation limits
    pub validation: ValidationConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Feature flags
    pub features: FeatureFlags,
}

/// Snapshot cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Write store snapshots to disk
    pub enabled: bool,

    /// Directory holding one JSON file per store
    pub dir: PathBuf,
}

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How long `account_created` stays raised after a profile is created
    #[serde(with = "humantime_serde")]
    pub flag_reset_delay: Duration,

    /// Buffered session events per subscriber
    pub event_capacity: usize,
}

/// Content filter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// 26-letter substitution key the lexicon is ciphered with
    pub cipher_key: String,

    /// Fall back to the bundled lexicon if the remote one cannot be fetched
    pub bundled_fallback: bool,
}

/// Input validation limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub min_password_len: usize,
    pub max_display_name_len: usize,
    pub max_subject_len: usize,
    pub max_content_len: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Enable JSON formatting
    pub json_format: bool,

    /// Include target module
    pub with_target: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: PathBuf::from("./cache"),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            flag_reset_delay: Duration::from_secs(3),
            event_capacity: 64,
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            cipher_key: crate::core_filter::DEFAULT_KEY.to_string(),
            bundled_fallback: true,
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_password_len: 6,
            max_display_name_len: 32,
            max_subject_len: 120,
            max_content_len: 2000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            with_target: true,
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &'static str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.parse().map(Some).map_err(|e: T::Err| ConfigError::InvalidOverride {
            key,
            reason: e.to_string(),
        }),
        Err(_) => Ok(None),
    }
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Environment variables follow the pattern: ROOST_<SECTION>_<KEY>
    /// Example: ROOST_CACHE_DIR=/var/cache/roost
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file, then apply environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config: Self = toml::from_str(&contents)?;

        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        // Cache config
        if let Ok(dir) = env::var("ROOST_CACHE_DIR") {
            self.cache.dir = PathBuf::from(dir);
        }
        if let Some(enabled) = parse_env("ROOST_CACHE_ENABLED")? {
            self.cache.enabled = enabled;
        }

        // Session config
        if let Ok(delay) = env::var("ROOST_SESSION_FLAG_RESET_DELAY") {
            self.session.flag_reset_delay = humantime_serde::re::humantime::parse_duration(&delay)
                .map_err(|e| ConfigError::InvalidOverride {
                    key: "ROOST_SESSION_FLAG_RESET_DELAY",
                    reason: e.to_string(),
                })?;
        }

        // Filter config
        if let Ok(key) = env::var("ROOST_FILTER_CIPHER_KEY") {
            self.filter.cipher_key = key;
        }

        // Validation config
        if let Some(len) = parse_env("ROOST_VALIDATION_MIN_PASSWORD_LEN")? {
            self.validation.min_password_len = len;
        }

        // Logging config
        if let Ok(level) = env::var("ROOST_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(json) = parse_env("ROOST_LOG_JSON")? {
            self.logging.json_format = json;
        }

        // Feature flags
        if let Some(reset) = parse_env("ROOST_FEATURES_RESET_STORES_ON_SIGN_OUT")? {
            self.features.reset_stores_on_sign_out = reset;
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session.event_capacity == 0 {
            return Err(ConfigError::ValidationFailed(
                "event_capacity must be greater than 0".to_string(),
            ));
        }

        crate::core_filter::Cipher::new(&self.filter.cipher_key)?;

        if self.validation.min_password_len == 0 {
            return Err(ConfigError::ValidationFailed(
                "min_password_len must be greater than 0".to_string(),
            ));
        }

        if self.validation.max_display_name_len == 0
            || self.validation.max_subject_len == 0
            || self.validation.max_content_len == 0
        {
            return Err(ConfigError::ValidationFailed(
                "length limits must be greater than 0".to_string(),
            ));
        }

        if let Err(e) = self.logging.level.parse::<crate::logging::LogLevel>() {
            return Err(ConfigError::ValidationFailed(e.to_string()));
        }

        Ok(())
    }

    /// Cache directory, if snapshot caching is enabled
    pub fn cache_dir(&self) -> Option<&Path> {
        self.cache.enabled.then_some(self.cache.dir.as_path())
    }

    /// Save configuration to file
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = toml::to_string_pretty(self)?;

        std::fs::write(path, contents).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.session.flag_reset_delay, Duration::from_secs(3));
        assert!(!config.features.reset_stores_on_sign_out);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.session.event_capacity = 0;
        assert!(config.validate().is_err());

        config = Config::default();
        config.filter.cipher_key = "abc".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::CipherKey(_))));

        config = Config::default();
        config.validation.min_password_len = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_log_level_validation() {
        let mut config = Config::default();

        config.logging.level = "invalid".to_string();
        assert!(config.validate().is_err());

        config.logging.level = "debug".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("roost.toml");

        let mut config = Config::default();
        config.session.flag_reset_delay = Duration::from_millis(500);
        config.features.reset_stores_on_sign_out = true;
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.session.flag_reset_delay, Duration::from_millis(500));
        assert!(loaded.features.reset_stores_on_sign_out);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("roost.toml");
        std::fs::write(&path, "[session]\nflag_reset_delay = \"10s\"\n").unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.session.flag_reset_delay, Duration::from_secs(10));
        assert_eq!(loaded.validation, ValidationConfig::default());
    }

    #[test]
    fn test_missing_file_names_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.toml");

        match Config::from_file(&path) {
            Err(ConfigError::Read { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("expected read error, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("roost.toml");
        std::fs::write(&path, "[session\n").unwrap();

        assert!(matches!(Config::from_file(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_cache_dir_respects_enabled() {
        let mut config = Config::default();
        assert!(config.cache_dir().is_some());
        config.cache.enabled = false;
        assert!(config.cache_dir().is_none());
    }
}
