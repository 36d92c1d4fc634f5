//! Data model shared by the session, the stores and the derived views

pub mod identity;
pub mod post;
pub mod types;

pub use identity::{Identity, Profile, ProfileCandidate, SessionUser, UserKey, UserType};
pub use post::{
    CommentRow, DirectedPost, MessageRow, PostCandidate, PostStatus, RemotePost, StatusEntry,
};
pub use types::{PostId, Timestamp, Uid};
