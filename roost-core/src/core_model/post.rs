/*
    post.rs - Directed posts (comments and messages)

    A directed post travels from one user to another. Its id and timestamp
    are fixed at creation; everything else is plain data.

    The platform stores comments and messages as different row shapes.
    RemotePost is the closed set of shapes we accept; each variant converts
    into the single local DirectedPost.
*/

use super::identity::UserKey;
use super::types::{PostId, Timestamp};
use crate::core_loadable::StoreItem;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Delivery status of a post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Sent,
    Delivered,
    Read,
    Flagged,
}

/// One entry of a post's status history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub status: PostStatus,
    pub at: Timestamp,
}

/// Comment or message addressed from one user to another
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectedPost {
    id: PostId,
    timestamp: Timestamp,
    pub from: UserKey,
    pub to: UserKey,
    pub subject: String,
    pub content: String,
    #[serde(default)]
    pub references: BTreeSet<PostId>,
    #[serde(default)]
    pub status_history: Option<Vec<StatusEntry>>,
}

impl DirectedPost {
    pub fn new(
        id: PostId,
        timestamp: Timestamp,
        from: UserKey,
        to: UserKey,
        subject: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        DirectedPost {
            id,
            timestamp,
            from,
            to,
            subject: subject.into(),
            content: content.into(),
            references: BTreeSet::new(),
            status_history: None,
        }
    }

    /// Materialize a candidate with a fresh id, stamped now
    pub fn from_candidate(candidate: PostCandidate) -> Self {
        let mut post = DirectedPost::new(
            PostId::generate(),
            Timestamp::now(),
            candidate.from,
            candidate.to,
            candidate.subject,
            candidate.content,
        );
        post.references = candidate.references;
        post
    }

    pub fn id(&self) -> &PostId {
        &self.id
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn with_reference(mut self, id: PostId) -> Self {
        self.references.insert(id);
        self
    }

    /// Append a status change, starting the history if needed
    pub fn record_status(&mut self, status: PostStatus, at: Timestamp) {
        self.status_history
            .get_or_insert_with(Vec::new)
            .push(StatusEntry { status, at });
    }

    /// Most recent status, if any history is tracked
    pub fn current_status(&self) -> Option<PostStatus> {
        self.status_history
            .as_ref()
            .and_then(|history| history.last())
            .map(|entry| entry.status)
    }
}

impl StoreItem for DirectedPost {
    type Id = PostId;
    type Candidate = PostCandidate;

    const TYPE_LABEL: &'static str = "post";
    const CACHE_FILE: &'static str = "posts.json";

    fn item_id(&self) -> PostId {
        self.id.clone()
    }

    fn is_valid(&self) -> bool {
        !self.id.0.is_empty() && self.from.is_valid() && self.to.is_valid()
    }
}

/// Proposed post, before the remote assigns id and timestamp
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostCandidate {
    pub from: UserKey,
    pub to: UserKey,
    pub subject: String,
    pub content: String,
    #[serde(default)]
    pub references: BTreeSet<PostId>,
}

impl PostCandidate {
    pub fn new(
        from: UserKey,
        to: UserKey,
        subject: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        PostCandidate {
            from,
            to,
            subject: subject.into(),
            content: content.into(),
            references: BTreeSet::new(),
        }
    }
}

/// Comment row as the platform stores it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentRow {
    pub id: String,
    pub created_at: u64,
    pub author: UserKey,
    pub target: UserKey,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub thread: Vec<String>,
}

/// Message row as the platform stores it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRow {
    pub id: String,
    pub sent_at: u64,
    pub sender: UserKey,
    pub recipient: UserKey,
    #[serde(default)]
    pub subject: String,
    pub text: String,
    pub reply_to: Option<String>,
    #[serde(default)]
    pub statuses: Vec<StatusEntry>,
}

/// Every remote row shape that maps onto a DirectedPost
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RemotePost {
    Comment(CommentRow),
    Message(MessageRow),
}

impl RemotePost {
    pub fn into_post(self) -> DirectedPost {
        match self {
            RemotePost::Comment(row) => {
                let mut post = DirectedPost::new(
                    PostId(row.id),
                    Timestamp(row.created_at),
                    row.author,
                    row.target,
                    row.title,
                    row.body,
                );
                post.references = row.thread.into_iter().map(PostId).collect();
                post
            }
            RemotePost::Message(row) => {
                let mut post = DirectedPost::new(
                    PostId(row.id),
                    Timestamp(row.sent_at),
                    row.sender,
                    row.recipient,
                    row.subject,
                    row.text,
                );
                if let Some(parent) = row.reply_to {
                    post.references.insert(PostId(parent));
                }
                if !row.statuses.is_empty() {
                    post.status_history = Some(row.statuses);
                }
                post
            }
        }
    }
}

impl From<RemotePost> for DirectedPost {
    fn from(row: RemotePost) -> Self {
        row.into_post()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_model::types::Uid;

    fn key(uid: &str, name: &str) -> UserKey {
        UserKey::new(Uid::new(uid), name)
    }

    #[test]
    fn test_comment_row_maps_thread_to_references() {
        let row = RemotePost::Comment(CommentRow {
            id: "c1".to_string(),
            created_at: 10,
            author: key("a", "Ada"),
            target: key("b", "Bob"),
            title: "Hi".to_string(),
            body: "Nice work".to_string(),
            thread: vec!["p1".to_string(), "p2".to_string()],
        });

        let post = row.into_post();
        assert_eq!(post.id(), &PostId::new("c1"));
        assert_eq!(post.timestamp(), Timestamp(10));
        assert_eq!(post.references.len(), 2);
        assert!(post.status_history.is_none());
    }

    #[test]
    fn test_message_row_keeps_status_history() {
        let row = RemotePost::Message(MessageRow {
            id: "m1".to_string(),
            sent_at: 20,
            sender: key("a", "Ada"),
            recipient: key("b", "Bob"),
            subject: String::new(),
            text: "hello".to_string(),
            reply_to: Some("m0".to_string()),
            statuses: vec![StatusEntry { status: PostStatus::Delivered, at: Timestamp(21) }],
        });

        let post: DirectedPost = row.into();
        assert!(post.references.contains(&PostId::new("m0")));
        assert_eq!(post.current_status(), Some(PostStatus::Delivered));
    }

    #[test]
    fn test_remote_post_tagged_json() {
        let json = r#"{
            "kind": "message",
            "id": "m9",
            "sent_at": 5,
            "sender": {"uid": "a", "display_name": "Ada"},
            "recipient": {"uid": "b", "display_name": "Bob"},
            "text": "yo",
            "reply_to": null
        }"#;
        let row: RemotePost = serde_json::from_str(json).unwrap();
        assert!(matches!(row, RemotePost::Message(_)));
        assert_eq!(row.into_post().content, "yo");
    }

    #[test]
    fn test_validity_requires_both_parties() {
        let good = DirectedPost::new(
            PostId::new("p"),
            Timestamp(1),
            key("a", "Ada"),
            key("b", "Bob"),
            "s",
            "c",
        );
        assert!(good.is_valid());

        let mut bad = good.clone();
        bad.to = key("", "Nobody");
        assert!(!bad.is_valid());
    }

    #[test]
    fn test_record_status_starts_history() {
        let mut post = DirectedPost::from_candidate(PostCandidate::new(
            key("a", "Ada"),
            key("b", "Bob"),
            "s",
            "c",
        ));
        assert_eq!(post.current_status(), None);
        post.record_status(PostStatus::Sent, Timestamp(1));
        post.record_status(PostStatus::Read, Timestamp(2));
        assert_eq!(post.current_status(), Some(PostStatus::Read));
    }
}
