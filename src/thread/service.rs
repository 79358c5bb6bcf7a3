use crate::thread::domain::{
    build_thread_view, validate_content, BlogId, Comment, CommentId, ThreadError, ThreadView,
};
use crate::thread::policy::{ensure_can_delete, ensure_can_edit, ensure_can_pin, Actor};
use crate::thread::repository::{DynCommentRepository, NewComment, RepositoryError};

/// Comment operations as the HTTP layer sees them. Validation and
/// authorization run before the store is asked to change anything.
#[derive(Clone)]
pub struct CommentService {
    repo: DynCommentRepository,
    max_length: usize,
}

impl CommentService {
    pub fn new(repo: DynCommentRepository, max_length: usize) -> Self {
        Self { repo, max_length }
    }

    pub async fn thread(&self, blog_id: BlogId) -> Result<ThreadView, ThreadError> {
        if !self.repo.blog_exists(blog_id).await? {
            return Err(ThreadError::NotFound);
        }
        let comments = self.repo.fetch_comments(blog_id).await?;
        Ok(build_thread_view(comments))
    }

    /// Create a top-level comment, or a reply when `parent_id` is set.
    pub async fn create(
        &self,
        actor: &Actor,
        blog_id: BlogId,
        parent_id: Option<CommentId>,
        content: &str,
    ) -> Result<CommentId, ThreadError> {
        let content = validate_content(content, self.max_length)?;

        let id = self
            .repo
            .insert_comment(&NewComment {
                blog_id,
                parent_id,
                author_id: actor.user_id.clone(),
                content,
            })
            .await
            .map_err(not_found)?;

        tracing::debug!("Comment {} created on blog {} by {}", id, blog_id, actor.user_id);
        Ok(id)
    }

    pub async fn edit(
        &self,
        actor: &Actor,
        blog_id: BlogId,
        comment_id: CommentId,
        content: &str,
    ) -> Result<(), ThreadError> {
        let content = validate_content(content, self.max_length)?;
        let comment = self.load(blog_id, comment_id).await?;
        ensure_can_edit(actor, &comment)?;

        self.repo
            .update_content(comment_id, &content)
            .await
            .map_err(not_found)
    }

    /// Returns the number of comments removed (the target plus its replies).
    pub async fn delete(
        &self,
        actor: &Actor,
        blog_id: BlogId,
        comment_id: CommentId,
    ) -> Result<usize, ThreadError> {
        let comment = self.load(blog_id, comment_id).await?;
        ensure_can_delete(actor, &comment)?;

        self.repo
            .delete_cascade(comment_id)
            .await
            .map_err(not_found)
    }

    pub async fn pin(
        &self,
        actor: &Actor,
        blog_id: BlogId,
        comment_id: CommentId,
    ) -> Result<(), ThreadError> {
        ensure_can_pin(actor)?;

        let comment = self.load(blog_id, comment_id).await?;
        if !comment.is_root() {
            return Err(ThreadError::Validation(
                "Only top-level comments can be pinned".into(),
            ));
        }

        self.repo.pin(blog_id, comment_id).await.map_err(|e| match e {
            RepositoryError::Invalid(msg) => ThreadError::Validation(msg),
            other => not_found(other),
        })
    }

    /// Returns false when the comment was not pinned to begin with.
    pub async fn unpin(
        &self,
        actor: &Actor,
        blog_id: BlogId,
        comment_id: CommentId,
    ) -> Result<bool, ThreadError> {
        ensure_can_pin(actor)?;

        self.repo
            .unpin(blog_id, comment_id)
            .await
            .map_err(not_found)
    }

    /// Returns true when the love was added, false when it was withdrawn.
    pub async fn toggle_love(
        &self,
        actor: &Actor,
        blog_id: BlogId,
        comment_id: CommentId,
    ) -> Result<bool, ThreadError> {
        self.load(blog_id, comment_id).await?;

        self.repo
            .toggle_love(comment_id, &actor.user_id)
            .await
            .map_err(not_found)
    }

    async fn load(&self, blog_id: BlogId, comment_id: CommentId) -> Result<Comment, ThreadError> {
        match self.repo.find(comment_id).await? {
            Some(comment) if comment.blog_id == blog_id => Ok(comment),
            _ => Err(ThreadError::NotFound),
        }
    }
}

fn not_found(e: RepositoryError) -> ThreadError {
    match e {
        RepositoryError::NotFound(_) => ThreadError::NotFound,
        other => ThreadError::Store(other),
    }
}
