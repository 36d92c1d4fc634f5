//! Errors surfaced by the composition root

use crate::config::ConfigError;
use crate::core_filter::FilterError;
use crate::core_loadable::LoadError;
use crate::core_session::SessionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Content filter error: {0}")]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Store(#[from] LoadError),
}

pub type AppResult<T> = Result<T, AppError>;
