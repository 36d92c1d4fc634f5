//! Content filter error types

use crate::core_loadable::TransportError;
use thiserror::Error;

/// Cipher key validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CipherError {
    #[error("Cipher key must have 26 letters, got {0}")]
    WrongLength(usize),

    #[error("Cipher key contains non-lowercase character '{0}'")]
    InvalidCharacter(char),

    #[error("Cipher key repeats letter '{0}'")]
    DuplicateLetter(char),
}

/// Content filter errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    /// Lexicon could not be fetched; the filter stays disabled
    #[error("Failed to fetch lexicon: {0}")]
    Source(#[from] TransportError),

    #[error("Invalid cipher: {0}")]
    Cipher(#[from] CipherError),
}

pub type FilterResult<T> = Result<T, FilterError>;
