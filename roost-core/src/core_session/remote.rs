//! Remote auth and profile contracts
//!
//! The session never talks to a platform SDK directly; it goes through
//! these two traits so a fake or the in-memory backend can stand in.

use super::errors::AuthRemoteError;
use crate::core_loadable::TransportError;
use crate::core_model::{Identity, Profile, ProfileCandidate, Uid};
use async_trait::async_trait;
use tokio::sync::broadcast;

pub type AuthRemoteResult<T> = Result<T, AuthRemoteError>;

/// Remote identity provider
#[async_trait]
pub trait AuthRemote: Send + Sync {
    /// Identity the platform currently considers signed in
    async fn current_identity(&self) -> Option<Identity>;

    async fn sign_in_anonymously(&self) -> AuthRemoteResult<Identity>;

    async fn sign_in(&self, email: &str, password: &str) -> AuthRemoteResult<Identity>;

    async fn create_identity(&self, email: &str, password: &str) -> AuthRemoteResult<Identity>;

    /// Attach an email credential to the current anonymous identity, keeping its uid
    async fn link_anonymous(&self, email: &str, password: &str) -> AuthRemoteResult<Identity>;

    async fn sign_out(&self) -> AuthRemoteResult<()>;

    async fn send_password_reset(&self, email: &str) -> AuthRemoteResult<()>;

    async fn reauthenticate(&self, email: &str, password: &str) -> AuthRemoteResult<()>;

    async fn update_password(&self, new_password: &str) -> AuthRemoteResult<()>;

    async fn send_verification_email(&self) -> AuthRemoteResult<()>;

    /// Re-read the current identity (e.g. to pick up email verification)
    async fn reload_identity(&self) -> AuthRemoteResult<Option<Identity>>;

    /// Identity changes as the platform reports them.
    ///
    /// Transitions that keep the uid (anonymous link) may not be reported.
    fn subscribe_identity_changes(&self) -> broadcast::Receiver<Option<Identity>>;
}

/// Remote store of application profiles
#[async_trait]
pub trait ProfileRemote: Send + Sync {
    async fn fetch_profile(&self, uid: &Uid) -> Result<Profile, TransportError>;

    async fn create_profile(&self, candidate: &ProfileCandidate) -> Result<Profile, TransportError>;

    /// Reserve `name` for `uid` in the display-name index
    async fn create_display_name(&self, uid: &Uid, name: &str) -> Result<(), TransportError>;

    async fn set_display_name(&self, uid: &Uid, name: &str) -> Result<(), TransportError>;

    async fn update_photo_url(&self, uid: &Uid, url: &str) -> Result<(), TransportError>;
}
