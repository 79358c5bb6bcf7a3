use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::response::Envelope;
use crate::state::AppState;
use crate::thread::{BlogId, CommentId};

// --- Bodies ---

#[derive(Deserialize)]
pub struct CommentBody {
    pub content: String,
}

#[derive(Serialize)]
struct LoveState {
    loved: bool,
}

#[derive(Serialize)]
struct Removed {
    removed: usize,
}

// --- Router ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/blogs/{blog_id}/comments",
            get(thread).post(create_comment),
        )
        .route(
            "/api/blogs/{blog_id}/comments/{comment_id}",
            post(reply).patch(edit_comment).delete(delete_comment),
        )
        .route(
            "/api/blogs/{blog_id}/comments/{comment_id}/pin",
            post(pin_comment),
        )
        .route(
            "/api/blogs/{blog_id}/comments/{comment_id}/unpin",
            post(unpin_comment),
        )
        .route(
            "/api/blogs/{blog_id}/comments/{comment_id}/loves",
            post(toggle_love),
        )
}

// --- Handlers ---

async fn thread(
    State(state): State<AppState>,
    path: Result<Path<BlogId>, PathRejection>,
) -> AppResult<Envelope> {
    let Path(blog_id) = path?;
    let view = state.comments.thread(blog_id).await?;
    Ok(Envelope::ok().with_data(&view)?)
}

async fn create_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    path: Result<Path<BlogId>, PathRejection>,
    body: Result<Json<CommentBody>, JsonRejection>,
) -> AppResult<Envelope> {
    let Path(blog_id) = path?;
    let Json(body) = body?;

    let id = state
        .comments
        .create(&user.actor(), blog_id, None, &body.content)
        .await?;
    Ok(Envelope::created().with_data(&id)?)
}

async fn reply(
    State(state): State<AppState>,
    user: CurrentUser,
    path: Result<Path<(BlogId, CommentId)>, PathRejection>,
    body: Result<Json<CommentBody>, JsonRejection>,
) -> AppResult<Envelope> {
    let Path((blog_id, parent_id)) = path?;
    let Json(body) = body?;

    let id = state
        .comments
        .create(&user.actor(), blog_id, Some(parent_id), &body.content)
        .await?;
    Ok(Envelope::created().with_data(&id)?)
}

async fn edit_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    path: Result<Path<(BlogId, CommentId)>, PathRejection>,
    body: Result<Json<CommentBody>, JsonRejection>,
) -> AppResult<Envelope> {
    let Path((blog_id, comment_id)) = path?;
    let Json(body) = body?;

    state
        .comments
        .edit(&user.actor(), blog_id, comment_id, &body.content)
        .await?;
    Ok(Envelope::ok())
}

async fn delete_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    path: Result<Path<(BlogId, CommentId)>, PathRejection>,
) -> AppResult<Envelope> {
    let Path((blog_id, comment_id)) = path?;

    let removed = state
        .comments
        .delete(&user.actor(), blog_id, comment_id)
        .await?;
    Ok(Envelope::ok().with_data(&Removed { removed })?)
}

async fn pin_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    path: Result<Path<(BlogId, CommentId)>, PathRejection>,
) -> AppResult<Envelope> {
    let Path((blog_id, comment_id)) = path?;

    state
        .comments
        .pin(&user.actor(), blog_id, comment_id)
        .await?;
    Ok(Envelope::ok())
}

async fn unpin_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    path: Result<Path<(BlogId, CommentId)>, PathRejection>,
) -> AppResult<Envelope> {
    let Path((blog_id, comment_id)) = path?;

    // Unpinning a comment that is not pinned still succeeds
    state
        .comments
        .unpin(&user.actor(), blog_id, comment_id)
        .await?;
    Ok(Envelope::ok())
}

async fn toggle_love(
    State(state): State<AppState>,
    user: CurrentUser,
    path: Result<Path<(BlogId, CommentId)>, PathRejection>,
) -> AppResult<Envelope> {
    let Path((blog_id, comment_id)) = path?;

    let loved = state
        .comments
        .toggle_love(&user.actor(), blog_id, comment_id)
        .await?;
    Ok(Envelope::ok().with_data(&LoveState { loved })?)
}
