// Domain types - pure, no I/O
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::thread::repository::RepositoryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommentId(pub i64);

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlogId(pub i64);

impl fmt::Display for BlogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub blog_id: BlogId,
    pub parent_id: Option<CommentId>,
    pub author_id: String,
    /// Display name of the author; clients fall back to `author_id`
    #[serde(default)]
    pub author_name: Option<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub edited: bool,
    pub pinned: bool,
    #[serde(default)]
    pub love_count: i64,
}

impl Comment {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// A root comment together with every reply that resolves to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadGroup {
    pub root: Comment,
    pub replies: Vec<Comment>,
}

pub type ThreadView = Vec<ThreadGroup>;

#[derive(Debug, thiserror::Error)]
pub enum ThreadError {
    #[error("{0}")]
    Validation(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Not found")]
    NotFound,

    #[error(transparent)]
    Store(#[from] RepositoryError),
}

/// Newest first; equal timestamps fall back to ascending id.
fn display_order(a: &Comment, b: &Comment) -> Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| a.id.cmp(&b.id))
}

/// Walk parent links up to a top-level comment.
/// Returns None when an ancestor is missing or the chain loops.
fn resolve_root(
    id: CommentId,
    parents: &HashMap<CommentId, Option<CommentId>>,
) -> Option<CommentId> {
    let mut seen = HashSet::new();
    let mut current = id;
    loop {
        if !seen.insert(current) {
            return None;
        }
        match parents.get(&current)? {
            None => return Some(current),
            Some(parent) => current = *parent,
        }
    }
}

/// Reconstruct the display forest for one blog from an unordered snapshot.
///
/// The pinned root (if any) comes first, then the remaining roots newest
/// first. Replies of any depth attach to their top-level ancestor; a
/// comment whose ancestry is broken is promoted to its own root.
pub fn build_thread_view(comments: Vec<Comment>) -> ThreadView {
    let parents: HashMap<CommentId, Option<CommentId>> =
        comments.iter().map(|c| (c.id, c.parent_id)).collect();

    let mut roots = Vec::new();
    let mut replies: HashMap<CommentId, Vec<Comment>> = HashMap::new();

    for comment in comments {
        match resolve_root(comment.id, &parents) {
            Some(root) if root != comment.id => replies.entry(root).or_default().push(comment),
            _ => roots.push(comment),
        }
    }

    roots.sort_by(display_order);

    // Only a true top-level comment can be promoted; lowest id wins if the
    // snapshot somehow carries more than one pin.
    let pinned_pos = roots
        .iter()
        .enumerate()
        .filter(|(_, c)| c.pinned && c.is_root())
        .min_by_key(|(_, c)| c.id)
        .map(|(pos, _)| pos);

    if let Some(pos) = pinned_pos {
        let pinned = roots.remove(pos);
        roots.insert(0, pinned);
    }

    roots
        .into_iter()
        .map(|root| {
            let mut group_replies = replies.remove(&root.id).unwrap_or_default();
            group_replies.sort_by(display_order);
            ThreadGroup {
                root,
                replies: group_replies,
            }
        })
        .collect()
}

/// Trim and bound a comment body.
pub fn validate_content(content: &str, max_len: usize) -> Result<String, ThreadError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(ThreadError::Validation("Comment cannot be empty".into()));
    }
    if content.chars().count() > max_len {
        return Err(ThreadError::Validation(format!(
            "Comment must be {} characters or less",
            max_len
        )));
    }
    Ok(content.to_string())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    pub(crate) fn comment(id: i64, parent: Option<i64>, minutes: i64) -> Comment {
        Comment {
            id: CommentId(id),
            blog_id: BlogId(1),
            parent_id: parent.map(CommentId),
            author_id: "alice".to_string(),
            author_name: Some("Alice".to_string()),
            content: format!("comment {}", id),
            created_at: t(minutes),
            edited: false,
            pinned: false,
            love_count: 0,
        }
    }

    fn pinned(mut c: Comment) -> Comment {
        c.pinned = true;
        c
    }

    fn shape(view: &ThreadView) -> Vec<(i64, Vec<i64>)> {
        view.iter()
            .map(|g| (g.root.id.0, g.replies.iter().map(|r| r.id.0).collect()))
            .collect()
    }

    #[test]
    fn empty_input_gives_empty_forest() {
        assert!(build_thread_view(Vec::new()).is_empty());
    }

    #[test]
    fn pinned_root_comes_first_with_replies_nested() {
        let view = build_thread_view(vec![
            comment(1, None, 0),
            comment(2, Some(1), 1),
            pinned(comment(3, None, 2)),
        ]);
        assert_eq!(shape(&view), vec![(3, vec![]), (1, vec![2])]);
        assert!(view[0].root.pinned);
    }

    #[test]
    fn pinned_root_beats_newer_roots() {
        let view = build_thread_view(vec![
            pinned(comment(1, None, 0)),
            comment(2, None, 10),
            comment(3, None, 20),
        ]);
        assert_eq!(shape(&view), vec![(1, vec![]), (3, vec![]), (2, vec![])]);
    }

    #[test]
    fn roots_and_replies_are_newest_first() {
        let view = build_thread_view(vec![
            comment(1, None, 0),
            comment(2, None, 5),
            comment(3, Some(1), 1),
            comment(4, Some(1), 7),
            comment(5, Some(2), 6),
        ]);
        assert_eq!(shape(&view), vec![(2, vec![5]), (1, vec![4, 3])]);
    }

    #[test]
    fn equal_timestamps_tie_break_by_ascending_id() {
        let view = build_thread_view(vec![
            comment(9, None, 0),
            comment(4, None, 0),
            comment(6, None, 0),
            comment(8, Some(4), 3),
            comment(7, Some(4), 3),
        ]);
        assert_eq!(shape(&view), vec![(4, vec![7, 8]), (6, vec![]), (9, vec![])]);
    }

    #[test]
    fn replies_of_replies_flatten_to_root() {
        let view = build_thread_view(vec![
            comment(1, None, 0),
            comment(2, Some(1), 1),
            comment(3, Some(2), 2),
            comment(4, Some(3), 3),
        ]);
        assert_eq!(shape(&view), vec![(1, vec![4, 3, 2])]);
    }

    #[test]
    fn dangling_replies_become_singleton_roots() {
        let view = build_thread_view(vec![
            comment(2, Some(100), 0),
            comment(3, Some(101), 1),
        ]);
        assert_eq!(shape(&view), vec![(3, vec![]), (2, vec![])]);
    }

    #[test]
    fn cycles_are_promoted_not_dropped() {
        let view = build_thread_view(vec![
            comment(1, None, 0),
            comment(2, Some(3), 1),
            comment(3, Some(2), 2),
        ]);
        assert_eq!(shape(&view), vec![(3, vec![]), (2, vec![]), (1, vec![])]);
    }

    #[test]
    fn self_parent_is_promoted() {
        let view = build_thread_view(vec![comment(5, Some(5), 0)]);
        assert_eq!(shape(&view), vec![(5, vec![])]);
    }

    #[test]
    fn pinned_reply_is_not_promoted() {
        let view = build_thread_view(vec![
            comment(1, None, 0),
            pinned(comment(2, Some(1), 1)),
            comment(3, None, 2),
        ]);
        assert_eq!(shape(&view), vec![(3, vec![]), (1, vec![2])]);
    }

    #[test]
    fn only_one_pinned_root_is_promoted() {
        let view = build_thread_view(vec![
            comment(1, None, 0),
            pinned(comment(5, None, 2)),
            pinned(comment(3, None, 1)),
        ]);
        assert_eq!(shape(&view), vec![(3, vec![]), (5, vec![]), (1, vec![])]);
    }

    #[test]
    fn reconstruction_is_deterministic() {
        let input = vec![
            comment(3, Some(1), 4),
            comment(1, None, 0),
            pinned(comment(7, None, 1)),
            comment(2, None, 4),
            comment(5, Some(2), 4),
            comment(6, Some(2), 4),
            comment(4, Some(99), 4),
        ];
        let mut reversed = input.clone();
        reversed.reverse();

        let first = build_thread_view(input.clone());
        assert_eq!(first, build_thread_view(input));
        assert_eq!(first, build_thread_view(reversed));
    }

    #[test]
    fn no_comment_is_lost() {
        let input = vec![
            comment(1, None, 0),
            comment(2, Some(1), 1),
            comment(3, Some(2), 2),
            comment(4, Some(42), 3),
            comment(5, Some(6), 4),
            comment(6, Some(5), 5),
        ];
        let view = build_thread_view(input);
        let total: usize = view.iter().map(|g| 1 + g.replies.len()).sum();
        assert_eq!(total, 6);
    }

    #[test]
    fn validate_content_trims() {
        assert_eq!(validate_content("  hello  ", 10).unwrap(), "hello");
    }

    #[test]
    fn validate_content_rejects_empty() {
        assert!(matches!(
            validate_content("   ", 10),
            Err(ThreadError::Validation(_))
        ));
    }

    #[test]
    fn validate_content_rejects_too_long() {
        assert!(matches!(
            validate_content(&"x".repeat(11), 10),
            Err(ThreadError::Validation(_))
        ));
        assert!(validate_content(&"x".repeat(10), 10).is_ok());
    }
}
