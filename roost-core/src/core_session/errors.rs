/*
    errors.rs - Session error types

    AuthRemoteError is what the auth platform reports.
    SessionError is what session operations return; it is Clone because
    the most recent one is retained on the published snapshot.
*/

use crate::core_loadable::TransportError;
use thiserror::Error;

/// Failure reported by the remote auth platform
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthRemoteError {
    /// No account for the credential
    #[error("No account for this credential")]
    NotFound,

    /// Credential already belongs to another account
    #[error("Credential already in use")]
    AlreadyInUse,

    #[error("Wrong password")]
    WrongPassword,

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Session operation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Rejected before any remote call
    #[error("Invalid input: {0}")]
    InputValidation(String),

    #[error("No account exists for this email")]
    IdentityNotFound,

    #[error("This email is already linked to another account")]
    IdentityConflict,

    /// Identity exists but its profile could not be written or read
    #[error("Profile incomplete: {0}")]
    ProfileIncomplete(String),

    #[error("Re-authentication failed: {0}")]
    ReauthenticationFailed(String),

    #[error("Password change failed: {0}")]
    PasswordChangeFailed(String),

    #[error("Not signed in with a real account")]
    NotSignedIn,

    /// A sign-in or sign-out replaced the identity this operation was for
    #[error("Signed-in identity changed during the operation")]
    IdentityChanged,

    #[error("Remote error: {0}")]
    Remote(#[from] AuthRemoteError),
}

impl From<TransportError> for SessionError {
    fn from(err: TransportError) -> Self {
        SessionError::Remote(AuthRemoteError::Transport(err))
    }
}

impl SessionError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        SessionError::InputValidation(msg.into())
    }
}

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;
