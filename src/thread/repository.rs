// Repository pattern - isolates all comment storage side effects
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::db::in_transaction;
use crate::state::DbPool;
use crate::thread::domain::{BlogId, Comment, CommentId};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] r2d2::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid: {0}")]
    Invalid(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Integrity violation: {0}")]
    Integrity(String),
}

impl RepositoryError {
    fn sqlite_code(&self) -> Option<ErrorCode> {
        match self {
            RepositoryError::Sql(rusqlite::Error::SqliteFailure(e, _)) => Some(e.code),
            _ => None,
        }
    }

    fn is_busy(&self) -> bool {
        matches!(
            self.sqlite_code(),
            Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
        )
    }

    fn is_constraint(&self) -> bool {
        self.sqlite_code() == Some(ErrorCode::ConstraintViolation)
    }
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub blog_id: BlogId,
    pub parent_id: Option<CommentId>,
    pub author_id: String,
    pub content: String,
}

/// Repository trait - every comment read and write goes through here
#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn blog_exists(&self, blog_id: BlogId) -> Result<bool, RepositoryError>;

    /// All comments of a blog, in no particular order
    async fn fetch_comments(&self, blog_id: BlogId) -> Result<Vec<Comment>, RepositoryError>;

    async fn find(&self, id: CommentId) -> Result<Option<Comment>, RepositoryError>;

    /// Insert a root (no parent) or a reply; returns the new id
    async fn insert_comment(&self, comment: &NewComment) -> Result<CommentId, RepositoryError>;

    /// Replace the body and mark the comment edited (last write wins)
    async fn update_content(&self, id: CommentId, content: &str) -> Result<(), RepositoryError>;

    /// Atomically move the blog's pin to `id`
    async fn pin(&self, blog_id: BlogId, id: CommentId) -> Result<(), RepositoryError>;

    /// Clear the pin on `id`; returns false when it was not pinned
    async fn unpin(&self, blog_id: BlogId, id: CommentId) -> Result<bool, RepositoryError>;

    /// Delete a comment, its replies and their loves as one unit.
    /// Returns the number of comments removed.
    async fn delete_cascade(&self, id: CommentId) -> Result<usize, RepositoryError>;

    /// Returns true when the love was added, false when it was removed
    async fn toggle_love(&self, id: CommentId, user_id: &str) -> Result<bool, RepositoryError>;
}

/// Type alias for Arc-wrapped repository (for AppState)
pub type DynCommentRepository = Arc<dyn CommentRepository>;

/// SQLite implementation
pub struct SqliteCommentRepository {
    pool: DbPool,
    conflict_retries: u32,
}

impl SqliteCommentRepository {
    pub fn new(pool: DbPool, conflict_retries: u32) -> Self {
        Self {
            pool,
            conflict_retries,
        }
    }

    /// Run `op` on a pooled connection, retrying when it loses a race for
    /// the write lock (or, for pin swaps, for the one-pin-per-blog index).
    async fn with_retry<T, F>(
        &self,
        name: &'static str,
        retry_on_constraint: bool,
        mut op: F,
    ) -> Result<T, RepositoryError>
    where
        T: Send,
        F: FnMut(&Connection) -> Result<T, RepositoryError> + Send,
    {
        let mut attempt: u32 = 0;
        loop {
            let result = {
                let conn = self.pool.get()?;
                op(&*conn)
            };

            match result {
                Err(e) if e.is_busy() || (retry_on_constraint && e.is_constraint()) => {
                    if attempt >= self.conflict_retries {
                        tracing::warn!("{} gave up after {} retries: {}", name, attempt, e);
                        return Err(RepositoryError::Conflict(format!(
                            "{} lost to a concurrent update",
                            name
                        )));
                    }
                    attempt += 1;
                    tracing::warn!("{} conflicted, retrying ({}): {}", name, attempt, e);
                    tokio::time::sleep(Duration::from_millis(10 * u64::from(attempt))).await;
                }
                other => return other,
            }
        }
    }
}

const SELECT_COMMENT: &str = "SELECT c.id, c.blog_id, c.parent_id, c.author_id, c.content,
        c.created_at, c.edited, c.pinned,
        (SELECT COUNT(*) FROM comment_loves l WHERE l.comment_id = c.id),
        u.name
 FROM comments c
 LEFT JOIN users u ON u.id = c.author_id";

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: CommentId(row.get(0)?),
        blog_id: BlogId(row.get(1)?),
        parent_id: row.get::<_, Option<i64>>(2)?.map(CommentId),
        author_id: row.get(3)?,
        author_name: row.get(9)?,
        content: row.get(4)?,
        created_at: row.get(5)?,
        edited: row.get(6)?,
        pinned: row.get(7)?,
        love_count: row.get(8)?,
    })
}

fn blog_exists(conn: &Connection, blog_id: BlogId) -> Result<bool, RepositoryError> {
    let exists = conn.query_row(
        "SELECT COUNT(*) > 0 FROM blogs WHERE id = ?1",
        params![blog_id.0],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Where a comment lives: (blog, parent)
fn placement(
    conn: &Connection,
    id: CommentId,
) -> Result<(BlogId, Option<CommentId>), RepositoryError> {
    conn.query_row(
        "SELECT blog_id, parent_id FROM comments WHERE id = ?1",
        params![id.0],
        |row| {
            Ok((
                BlogId(row.get(0)?),
                row.get::<_, Option<i64>>(1)?.map(CommentId),
            ))
        },
    )
    .optional()?
    .ok_or_else(|| RepositoryError::NotFound(format!("comment {}", id)))
}

fn placement_in_blog(
    conn: &Connection,
    blog_id: BlogId,
    id: CommentId,
) -> Result<Option<CommentId>, RepositoryError> {
    let (owner, parent) = placement(conn, id)?;
    if owner != blog_id {
        return Err(RepositoryError::NotFound(format!(
            "comment {} in blog {}",
            id, blog_id
        )));
    }
    Ok(parent)
}

#[async_trait]
impl CommentRepository for SqliteCommentRepository {
    async fn blog_exists(&self, blog_id: BlogId) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;
        blog_exists(&conn, blog_id)
    }

    async fn fetch_comments(&self, blog_id: BlogId) -> Result<Vec<Comment>, RepositoryError> {
        let conn = self.pool.get()?;

        let mut stmt = conn.prepare(&format!("{} WHERE c.blog_id = ?1", SELECT_COMMENT))?;
        let comments = stmt
            .query_map(params![blog_id.0], comment_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(comments)
    }

    async fn find(&self, id: CommentId) -> Result<Option<Comment>, RepositoryError> {
        let conn = self.pool.get()?;

        let comment = conn
            .query_row(
                &format!("{} WHERE c.id = ?1", SELECT_COMMENT),
                params![id.0],
                comment_from_row,
            )
            .optional()?;

        Ok(comment)
    }

    async fn insert_comment(&self, comment: &NewComment) -> Result<CommentId, RepositoryError> {
        self.with_retry("insert_comment", false, |conn| {
            in_transaction(conn, |conn| {
                if !blog_exists(conn, comment.blog_id)? {
                    return Err(RepositoryError::NotFound(format!(
                        "blog {}",
                        comment.blog_id
                    )));
                }

                if let Some(parent) = comment.parent_id {
                    placement_in_blog(conn, comment.blog_id, parent)?;
                }

                conn.execute(
                    "INSERT INTO comments (blog_id, parent_id, author_id, content, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        comment.blog_id.0,
                        comment.parent_id.map(|p| p.0),
                        comment.author_id,
                        comment.content,
                        Utc::now()
                    ],
                )?;

                Ok(CommentId(conn.last_insert_rowid()))
            })
        })
        .await
    }

    async fn update_content(&self, id: CommentId, content: &str) -> Result<(), RepositoryError> {
        self.with_retry("update_content", false, |conn| {
            let rows = conn.execute(
                "UPDATE comments SET content = ?1, edited = 1 WHERE id = ?2",
                params![content, id.0],
            )?;
            if rows == 0 {
                return Err(RepositoryError::NotFound(format!("comment {}", id)));
            }
            Ok(())
        })
        .await
    }

    async fn pin(&self, blog_id: BlogId, id: CommentId) -> Result<(), RepositoryError> {
        let cleared = self
            .with_retry("pin", true, |conn| {
                in_transaction(conn, |conn| {
                    if placement_in_blog(conn, blog_id, id)?.is_some() {
                        return Err(RepositoryError::Invalid(
                            "Only top-level comments can be pinned".into(),
                        ));
                    }

                    let cleared = conn.execute(
                        "UPDATE comments SET pinned = 0
                         WHERE blog_id = ?1 AND pinned = 1 AND id != ?2",
                        params![blog_id.0, id.0],
                    )?;
                    conn.execute(
                        "UPDATE comments SET pinned = 1 WHERE id = ?1",
                        params![id.0],
                    )?;

                    Ok(cleared)
                })
            })
            .await?;

        tracing::info!(
            "Pinned comment {} on blog {} (replaced {} previous pin)",
            id,
            blog_id,
            cleared
        );
        Ok(())
    }

    async fn unpin(&self, blog_id: BlogId, id: CommentId) -> Result<bool, RepositoryError> {
        let changed = self
            .with_retry("unpin", false, |conn| {
                in_transaction(conn, |conn| {
                    placement_in_blog(conn, blog_id, id)?;
                    let rows = conn.execute(
                        "UPDATE comments SET pinned = 0 WHERE id = ?1 AND pinned = 1",
                        params![id.0],
                    )?;
                    Ok(rows > 0)
                })
            })
            .await?;

        if changed {
            tracing::info!("Unpinned comment {} on blog {}", id, blog_id);
        }
        Ok(changed)
    }

    async fn delete_cascade(&self, id: CommentId) -> Result<usize, RepositoryError> {
        let (comments, loves) = self
            .with_retry("delete_cascade", false, |conn| {
                in_transaction(conn, |conn| {
                    // UNION (not UNION ALL) stops on parent cycles
                    let subtree: Vec<i64> = {
                        let mut stmt = conn.prepare(
                            "WITH RECURSIVE subtree(id) AS (
                                 SELECT id FROM comments WHERE id = ?1
                                 UNION
                                 SELECT c.id FROM comments c JOIN subtree s ON c.parent_id = s.id
                             )
                             SELECT id FROM subtree",
                        )?;
                        let ids = stmt
                            .query_map(params![id.0], |row| row.get(0))?
                            .collect::<Result<Vec<_>, _>>()?;
                        ids
                    };

                    if subtree.is_empty() {
                        return Err(RepositoryError::NotFound(format!("comment {}", id)));
                    }

                    let mut loves = 0;
                    let mut comments = 0;
                    {
                        let mut delete_loves =
                            conn.prepare("DELETE FROM comment_loves WHERE comment_id = ?1")?;
                        for comment_id in &subtree {
                            loves += delete_loves.execute(params![comment_id])?;
                        }

                        // Deepest replies first, the target last
                        let mut delete_comment =
                            conn.prepare("DELETE FROM comments WHERE id = ?1")?;
                        for comment_id in subtree.iter().rev() {
                            comments += delete_comment.execute(params![comment_id])?;
                        }
                    }

                    if comments != subtree.len() {
                        return Err(RepositoryError::Integrity(format!(
                            "cascade from comment {} removed {} of {} comments",
                            id,
                            comments,
                            subtree.len()
                        )));
                    }

                    Ok((comments, loves))
                })
            })
            .await?;

        tracing::info!(
            "Deleted comment {} with {} replies and {} loves",
            id,
            comments - 1,
            loves
        );
        Ok(comments)
    }

    async fn toggle_love(&self, id: CommentId, user_id: &str) -> Result<bool, RepositoryError> {
        self.with_retry("toggle_love", false, |conn| {
            in_transaction(conn, |conn| {
                placement(conn, id)?;

                let existing: Option<i64> = conn
                    .query_row(
                        "SELECT id FROM comment_loves WHERE comment_id = ?1 AND user_id = ?2",
                        params![id.0, user_id],
                        |row| row.get(0),
                    )
                    .optional()?;

                match existing {
                    Some(love_id) => {
                        conn.execute(
                            "DELETE FROM comment_loves WHERE id = ?1",
                            params![love_id],
                        )?;
                        Ok(false)
                    }
                    None => {
                        conn.execute(
                            "INSERT INTO comment_loves (comment_id, user_id) VALUES (?1, ?2)",
                            params![id.0, user_id],
                        )?;
                        Ok(true)
                    }
                }
            })
        })
        .await
    }
}
