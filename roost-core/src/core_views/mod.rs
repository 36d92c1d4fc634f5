//! UI-ready projections over loaded collections
//!
//! Pure functions; they read a `Loadable` and never touch a store.

pub mod partners;
pub mod search;

pub use partners::{conversation_partners, ConversationPartner};
pub use search::{post_contains, search_posts};
