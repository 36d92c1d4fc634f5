//! Observable session state

use super::errors::SessionError;
use super::saga::SagaWarning;
use crate::core_model::{Identity, Profile, SessionUser, Uid};
use std::fmt;

/// Where the session stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionPhase {
    /// No identity yet
    #[default]
    SigningIn,
    Anonymous,
    /// Real identity without a readable profile
    ProfileIncomplete,
    /// Real identity and profile, email not verified
    Unverified,
    Verified,
}

impl SessionPhase {
    /// Phase implied by an identity and the profile loaded for it.
    ///
    /// Identities without an email have nothing to verify.
    pub fn resolve(identity: Option<&Identity>, profile: Option<&Profile>) -> Self {
        match (identity, profile) {
            (None, _) => SessionPhase::SigningIn,
            (Some(identity), _) if identity.is_anonymous => SessionPhase::Anonymous,
            (Some(_), None) => SessionPhase::ProfileIncomplete,
            (Some(identity), Some(_)) => {
                if identity.is_email_verified || identity.email.is_none() {
                    SessionPhase::Verified
                } else {
                    SessionPhase::Unverified
                }
            }
        }
    }

    /// Signed in with a non-anonymous identity
    pub fn is_real(&self) -> bool {
        matches!(
            self,
            SessionPhase::ProfileIncomplete | SessionPhase::Unverified | SessionPhase::Verified
        )
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionPhase::SigningIn => "signing-in",
            SessionPhase::Anonymous => "anonymous",
            SessionPhase::ProfileIncomplete => "profile-incomplete",
            SessionPhase::Unverified => "unverified",
            SessionPhase::Verified => "verified",
        };
        f.write_str(name)
    }
}

/// Short-lived UI flags around account creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionFlags {
    /// Real identity exists but its profile does not
    pub account_incomplete: bool,
    /// Sign-up in progress
    pub creating_account: bool,
    /// Profile just created; cleared after a delay
    pub account_created: bool,
}

/// Everything observers can see about the session
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub identity: Option<Identity>,
    pub profile: Option<Profile>,
    pub last_error: Option<SessionError>,
    /// Non-fatal failures from the most recent profile creation
    pub warnings: Vec<SagaWarning>,
    pub flags: SessionFlags,
}

impl SessionSnapshot {
    pub fn uid(&self) -> Option<&Uid> {
        self.identity.as_ref().map(|identity| &identity.uid)
    }

    pub fn is_anonymous(&self) -> bool {
        self.identity.as_ref().is_some_and(|identity| identity.is_anonymous)
    }

    /// Identity and profile together, once both exist
    pub fn user(&self) -> Option<SessionUser> {
        match (&self.identity, &self.profile) {
            (Some(identity), Some(profile)) => Some(SessionUser {
                identity: identity.clone(),
                profile: profile.clone(),
            }),
            _ => None,
        }
    }

    /// Recompute the phase from identity and profile
    pub(crate) fn refresh_phase(&mut self) {
        self.phase = SessionPhase::resolve(self.identity.as_ref(), self.profile.as_ref());
    }
}
