/*
    identity.rs - Identity and profile records

    Identity is remote-authoritative (owned by the auth platform).
    Profile is application-owned and only exists once an Identity does.
*/

use super::types::Uid;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Remote auth record for the signed-in user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub uid: Uid,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub is_anonymous: bool,
    pub is_email_verified: bool,
}

impl Identity {
    /// Fresh anonymous identity
    pub fn anonymous(uid: Uid) -> Self {
        Identity {
            uid,
            email: None,
            phone_number: None,
            is_anonymous: true,
            is_email_verified: false,
        }
    }

    /// Identity backed by an email credential
    pub fn with_email(uid: Uid, email: impl Into<String>, verified: bool) -> Self {
        Identity {
            uid,
            email: Some(email.into()),
            phone_number: None,
            is_anonymous: false,
            is_email_verified: verified,
        }
    }

    /// True if this identity is anonymous and shares `other`'s uid.
    ///
    /// The identity-change event does not reliably fire for these transitions.
    pub fn is_same_uid_link(&self, other: &Identity) -> bool {
        self.is_anonymous && self.uid == other.uid
    }
}

/// Role attached to a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    #[default]
    Standard,
    Moderator,
    Admin,
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            UserType::Standard => "standard",
            UserType::Moderator => "moderator",
            UserType::Admin => "admin",
        };
        f.write_str(label)
    }
}

/// Application-owned display attributes, keyed by uid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub uid: Uid,
    pub display_name: String,
    pub photo_url: Option<String>,
    #[serde(default)]
    pub user_type: UserType,
}

impl Profile {
    pub fn key(&self) -> UserKey {
        UserKey {
            uid: self.uid.clone(),
            display_name: self.display_name.clone(),
            user_type: self.user_type,
        }
    }
}

/// Proposed profile, built before the remote record exists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileCandidate {
    pub uid: Uid,
    pub display_name: String,
    pub photo_url: Option<String>,
}

impl ProfileCandidate {
    pub fn new(uid: Uid, display_name: impl Into<String>) -> Self {
        ProfileCandidate {
            uid,
            display_name: display_name.into(),
            photo_url: None,
        }
    }

    pub fn with_photo_url(mut self, url: impl Into<String>) -> Self {
        self.photo_url = Some(url.into());
        self
    }

    /// Profile this candidate turns into once the remote accepts it
    pub fn into_profile(self) -> Profile {
        Profile {
            uid: self.uid,
            display_name: self.display_name,
            photo_url: self.photo_url,
            user_type: UserType::Standard,
        }
    }
}

/// Lightweight address for a user, carried on posts
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserKey {
    pub uid: Uid,
    pub display_name: String,
    #[serde(default)]
    pub user_type: UserType,
}

impl UserKey {
    pub fn new(uid: Uid, display_name: impl Into<String>) -> Self {
        UserKey {
            uid,
            display_name: display_name.into(),
            user_type: UserType::Standard,
        }
    }

    /// Non-empty uid and a display name that isn't just whitespace
    pub fn is_valid(&self) -> bool {
        !self.uid.is_empty() && !self.display_name.trim().is_empty()
    }
}

/// Identity plus its profile, as held by the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    pub identity: Identity,
    pub profile: Profile,
}

impl SessionUser {
    pub fn key(&self) -> UserKey {
        self.profile.key()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_key_validity() {
        assert!(UserKey::new(Uid::new("u1"), "Ada").is_valid());
        assert!(!UserKey::new(Uid::new(""), "Ada").is_valid());
        assert!(!UserKey::new(Uid::new("u1"), "   ").is_valid());
        assert!(!UserKey::new(Uid::new("u1"), "").is_valid());
    }

    #[test]
    fn test_same_uid_link_requires_anonymous_source() {
        let anon = Identity::anonymous(Uid::new("A"));
        let real = Identity::with_email(Uid::new("A"), "a@example.com", false);
        assert!(anon.is_same_uid_link(&real));
        assert!(!real.is_same_uid_link(&anon));

        let other = Identity::with_email(Uid::new("B"), "b@example.com", false);
        assert!(!anon.is_same_uid_link(&other));
    }

    #[test]
    fn test_candidate_into_profile() {
        let profile = ProfileCandidate::new(Uid::new("u1"), "Ada")
            .with_photo_url("https://img.example/ada.png")
            .into_profile();
        assert_eq!(profile.display_name, "Ada");
        assert_eq!(profile.user_type, UserType::Standard);
        assert_eq!(profile.key().uid, Uid::new("u1"));
    }

    #[test]
    fn test_user_type_defaults_when_missing() {
        let json = r#"{"uid":"u1","display_name":"Ada","photo_url":null}"#;
        let profile: Profile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.user_type, UserType::Standard);
    }
}
