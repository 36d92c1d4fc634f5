/*
    partners.rs - Conversation partners view

    Collapses a loaded post list into one entry per counterpart of the
    current user, ordered oldest activity first.
*/

use crate::core_loadable::Loadable;
use crate::core_model::{DirectedPost, PostId, Timestamp, Uid, UserKey};
use serde::Serialize;
use std::collections::HashMap;

/// Another user the current user has exchanged posts with
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationPartner {
    /// Key as it appeared on the latest post
    pub key: UserKey,
    pub latest: Timestamp,
    pub latest_post: PostId,
    pub post_count: usize,
}

/// The party on `post` that is not `current`, if `current` is involved at all
fn other_party<'a>(post: &'a DirectedPost, current: &Uid) -> Option<&'a UserKey> {
    let other = if &post.from.uid == current {
        &post.to
    } else if &post.to.uid == current {
        &post.from
    } else {
        return None;
    };

    if &other.uid == current || !other.is_valid() {
        return None;
    }
    Some(other)
}

/// Partners of `current_uid` over a loaded collection, ascending by latest activity.
///
/// Anything other than `Loaded` yields an empty list.
pub fn conversation_partners(posts: &Loadable<DirectedPost>, current_uid: &Uid) -> Vec<ConversationPartner> {
    let Some(items) = posts.items() else {
        return Vec::new();
    };

    let mut by_uid: HashMap<&Uid, ConversationPartner> = HashMap::new();
    for post in items {
        let Some(other) = other_party(post, current_uid) else {
            continue;
        };

        by_uid
            .entry(&other.uid)
            .and_modify(|partner| {
                partner.post_count += 1;
                if post.timestamp() > partner.latest {
                    partner.key = other.clone();
                    partner.latest = post.timestamp();
                    partner.latest_post = post.id().clone();
                }
            })
            .or_insert_with(|| ConversationPartner {
                key: other.clone(),
                latest: post.timestamp(),
                latest_post: post.id().clone(),
                post_count: 1,
            });
    }

    let mut partners: Vec<ConversationPartner> = by_uid.into_values().collect();
    partners.sort_by(|a, b| a.latest.cmp(&b.latest).then_with(|| a.key.uid.cmp(&b.key.uid)));
    partners
}
