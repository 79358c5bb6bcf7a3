pub mod domain;
pub mod policy;
pub mod repository;
pub mod service;

pub use domain::{
    build_thread_view, BlogId, Comment, CommentId, ThreadError, ThreadGroup, ThreadView,
};
pub use policy::Actor;
pub use repository::{CommentRepository, DynCommentRepository, SqliteCommentRepository};
pub use service::CommentService;
