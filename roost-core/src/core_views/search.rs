//! Text search over posts

use crate::core_loadable::Loadable;
use crate::core_model::DirectedPost;

/// Case-insensitive substring match on subject, content and party names.
///
/// A blank query matches every post. Display names only take part when they
/// are non-blank.
pub fn post_contains(post: &DirectedPost, query: &str) -> bool {
    let query = query.trim();
    if query.is_empty() {
        return true;
    }
    let needle = query.to_lowercase();
    let hit = |text: &str| text.to_lowercase().contains(&needle);

    if hit(&post.subject) || hit(&post.content) {
        return true;
    }

    [&post.from.display_name, &post.to.display_name]
        .into_iter()
        .filter(|name| !name.trim().is_empty())
        .any(|name| hit(name))
}

/// Posts of a loaded collection matching `query`, in collection order
pub fn search_posts(posts: &Loadable<DirectedPost>, query: &str) -> Vec<DirectedPost> {
    posts
        .items()
        .map(|items| {
            items
                .iter()
                .filter(|post| post_contains(post, query))
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}
