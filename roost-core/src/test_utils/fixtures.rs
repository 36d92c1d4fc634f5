//! Test fixtures for creating common test objects

use crate::core_loadable::StoreItem;
use crate::core_model::{DirectedPost, Identity, PostCandidate, PostId, Timestamp, Uid, UserKey};
use serde::{Deserialize, Serialize};

/// Minimal store item for exercising `LoadableStore` without domain types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleItem {
    pub id: u32,
    pub label: String,
}

impl SampleItem {
    pub fn new(id: u32, label: &str) -> Self {
        SampleItem {
            id,
            label: label.to_string(),
        }
    }
}

impl StoreItem for SampleItem {
    type Id = u32;
    type Candidate = String;

    const TYPE_LABEL: &'static str = "sample";
    const CACHE_FILE: &'static str = "samples.json";

    fn item_id(&self) -> u32 {
        self.id
    }

    fn is_valid(&self) -> bool {
        !self.label.is_empty()
    }
}

pub fn user_key(uid: &str, name: &str) -> UserKey {
    UserKey::new(Uid::new(uid), name)
}

/// Post with a deterministic id and timestamp
pub fn post_between(id: &str, at: u64, from: &UserKey, to: &UserKey, content: &str) -> DirectedPost {
    DirectedPost::new(
        PostId::new(id),
        Timestamp(at),
        from.clone(),
        to.clone(),
        format!("re: {}", id),
        content,
    )
}

pub fn post_candidate(from: &UserKey, to: &UserKey, content: &str) -> PostCandidate {
    PostCandidate::new(from.clone(), to.clone(), "hello", content)
}

pub fn verified_identity(uid: &str, email: &str) -> Identity {
    Identity::with_email(Uid::new(uid), email, true)
}
