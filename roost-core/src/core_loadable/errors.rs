/*
    errors.rs - Error types for loadable stores

    TransportError is what a remote collaborator reports.
    LoadError is what a store reports and retains; it is Clone because
    coalesced fetch callers all receive the same outcome.
*/

use thiserror::Error;

/// Failure reported by a remote data collaborator
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Requested record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Remote could not be reached
    #[error("Remote unavailable: {0}")]
    Unavailable(String),

    /// Remote refused the request (permissions, rules, quota)
    #[error("Rejected by remote: {0}")]
    Rejected(String),

    /// Anything else
    #[error("Transport error: {0}")]
    Other(String),
}

/// Errors that can occur in a loadable store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// Remote fetch failed
    #[error("Failed to fetch {label}: {source}")]
    Fetch {
        label: &'static str,
        source: TransportError,
    },

    /// Remote create failed
    #[error("Failed to create {label}: {source}")]
    Create {
        label: &'static str,
        source: TransportError,
    },

    /// The fetch this call was waiting on was dropped before it finished
    #[error("Fetch for {0} was abandoned before completing")]
    Interrupted(&'static str),

    /// Snapshot cache could not be written
    #[error("Cache error: {0}")]
    Cache(String),
}

impl LoadError {
    /// Underlying transport error, if any
    pub fn transport(&self) -> Option<&TransportError> {
        match self {
            LoadError::Fetch { source, .. } | LoadError::Create { source, .. } => Some(source),
            LoadError::Interrupted(_) | LoadError::Cache(_) => None,
        }
    }
}

impl From<std::io::Error> for LoadError {
    fn from(err: std::io::Error) -> Self {
        LoadError::Cache(err.to_string())
    }
}

impl From<serde_json::Error> for LoadError {
    fn from(err: serde_json::Error) -> Self {
        LoadError::Cache(err.to_string())
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, LoadError>;
