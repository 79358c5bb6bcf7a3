// Authorization rules for comment mutations - pure checks, no store access
use crate::auth::Role;
use crate::thread::domain::{Comment, ThreadError};

/// The authenticated caller of a comment operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: String,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }

    pub fn is_author_of(&self, comment: &Comment) -> bool {
        self.user_id == comment.author_id
    }
}

/// Only the author may change a comment's content.
pub fn ensure_can_edit(actor: &Actor, comment: &Comment) -> Result<(), ThreadError> {
    if actor.is_author_of(comment) {
        Ok(())
    } else {
        Err(ThreadError::Unauthorized)
    }
}

pub fn ensure_can_delete(actor: &Actor, comment: &Comment) -> Result<(), ThreadError> {
    if actor.is_author_of(comment) || actor.role.is_privileged() {
        Ok(())
    } else {
        Err(ThreadError::Unauthorized)
    }
}

/// Pin and unpin are reserved to elevated roles.
pub fn ensure_can_pin(actor: &Actor) -> Result<(), ThreadError> {
    if actor.role.is_privileged() {
        Ok(())
    } else {
        Err(ThreadError::Unauthorized)
    }
}
