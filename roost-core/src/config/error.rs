//! Configuration error types

use crate::core_filter::CipherError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Cannot serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// An environment override that does not parse
    #[error("Invalid value for {key}: {reason}")]
    InvalidOverride { key: &'static str, reason: String },

    #[error("Invalid cipher key: {0}")]
    CipherKey(#[from] CipherError),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}
