use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use rusqlite::params;
use serde::{Deserialize, Serialize};

use crate::db::in_transaction;
use crate::db::models::{Blog, BlogSummary};
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::response::Envelope;
use crate::state::AppState;
use crate::thread::BlogId;

const MAX_TITLE_LENGTH: usize = 255;

// --- Bodies ---

#[derive(Deserialize)]
pub struct CreateBlogBody {
    pub title: String,
    pub content: Option<String>,
    #[serde(default)]
    pub published: bool,
}

#[derive(Serialize)]
struct LikeState {
    liked: bool,
    like_count: i64,
}

#[derive(Serialize)]
struct ViewCount {
    view_count: i64,
}

// --- Router ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/blogs", get(list_blogs).post(create_blog))
        .route("/api/blogs/{blog_id}/likes", post(toggle_like))
        .route("/api/blogs/{blog_id}/views", post(record_view))
}

// --- Handlers ---

async fn list_blogs(State(state): State<AppState>) -> AppResult<Envelope> {
    let blogs = {
        let conn = state.db.get()?;
        query_published(&conn)?
    };
    Ok(Envelope::ok().with_data(&blogs)?)
}

async fn create_blog(
    State(state): State<AppState>,
    user: CurrentUser,
    body: Result<Json<CreateBlogBody>, JsonRejection>,
) -> AppResult<Envelope> {
    if !user.role.is_privileged() {
        return Err(AppError::Unauthorized);
    }
    let Json(body) = body?;

    let title = body.title.trim().to_string();
    if title.is_empty() {
        return Err(AppError::BadRequest("Title cannot be empty".into()));
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(AppError::BadRequest(format!(
            "Title must be {} characters or less",
            MAX_TITLE_LENGTH
        )));
    }

    let id = {
        let conn = state.db.get()?;
        conn.execute(
            "INSERT INTO blogs (title, content, published, author_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![title, body.content, body.published, user.id, Utc::now()],
        )?;
        conn.last_insert_rowid()
    };

    tracing::info!("Blog {} created by {}", id, user.id);
    Ok(Envelope::created().with_data(&id)?)
}

async fn toggle_like(
    State(state): State<AppState>,
    user: CurrentUser,
    path: Result<Path<BlogId>, PathRejection>,
) -> AppResult<Envelope> {
    let Path(blog_id) = path?;
    let conn = state.db.get()?;

    // The check, the flip and the count share one write lock
    let like = in_transaction(&conn, |conn| -> AppResult<LikeState> {
        ensure_blog_exists(conn, blog_id)?;

        let removed = conn.execute(
            "DELETE FROM likes WHERE blog_id = ?1 AND user_id = ?2",
            params![blog_id.0, user.id],
        )?;
        if removed == 0 {
            conn.execute(
                "INSERT INTO likes (blog_id, user_id) VALUES (?1, ?2)",
                params![blog_id.0, user.id],
            )?;
        }

        let like_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM likes WHERE blog_id = ?1",
            params![blog_id.0],
            |r| r.get(0),
        )?;

        Ok(LikeState {
            liked: removed == 0,
            like_count,
        })
    })?;

    Ok(Envelope::ok().with_data(&like)?)
}

/// One view per user per blog; repeats are ignored.
async fn record_view(
    State(state): State<AppState>,
    user: CurrentUser,
    path: Result<Path<BlogId>, PathRejection>,
) -> AppResult<Envelope> {
    let Path(blog_id) = path?;
    let conn = state.db.get()?;
    ensure_blog_exists(&conn, blog_id)?;

    conn.execute(
        "INSERT OR IGNORE INTO views (blog_id, user_id) VALUES (?1, ?2)",
        params![blog_id.0, user.id],
    )?;

    let view_count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM views WHERE blog_id = ?1",
        params![blog_id.0],
        |r| r.get(0),
    )?;

    Ok(Envelope::ok().with_data(&ViewCount { view_count })?)
}

// --- Query helpers ---

fn ensure_blog_exists(conn: &rusqlite::Connection, blog_id: BlogId) -> AppResult<()> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM blogs WHERE id = ?1",
        params![blog_id.0],
        |r| r.get(0),
    )?;
    if exists {
        Ok(())
    } else {
        Err(AppError::NotFound)
    }
}

fn query_published(conn: &rusqlite::Connection) -> AppResult<Vec<BlogSummary>> {
    let mut stmt = conn.prepare(
        "SELECT b.id, b.title, b.content, b.published, b.author_id, b.created_at,
                (SELECT COUNT(*) FROM likes l WHERE l.blog_id = b.id),
                (SELECT COUNT(*) FROM views v WHERE v.blog_id = b.id),
                (SELECT COUNT(*) FROM comments c WHERE c.blog_id = b.id)
         FROM blogs b
         WHERE b.published = 1
         ORDER BY b.created_at DESC, b.id DESC",
    )?;

    let blogs = stmt
        .query_map([], |row| {
            Ok(BlogSummary {
                blog: Blog {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    content: row.get(2)?,
                    published: row.get(3)?,
                    author_id: row.get(4)?,
                    created_at: row.get(5)?,
                },
                like_count: row.get(6)?,
                view_count: row.get(7)?,
                comment_count: row.get(8)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(blogs)
}
