use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use std::sync::Arc;

use crate::config::Config;
use crate::thread::{CommentService, SqliteCommentRepository};

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub comments: CommentService,
}

impl AppState {
    /// Wire the SQLite-backed comment service onto `db`.
    pub fn new(db: DbPool, config: Config) -> Self {
        let repo = SqliteCommentRepository::new(db.clone(), config.comments.conflict_retries);
        let comments = CommentService::new(Arc::new(repo), config.comments.max_length);
        Self {
            db,
            config,
            comments,
        }
    }
}
