use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blog {
    pub id: i64,
    pub title: String,
    pub content: Option<String>,
    pub published: bool,
    pub author_id: String,
    pub created_at: DateTime<Utc>,
}

/// A published blog as listed on the index, with engagement counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlogSummary {
    #[serde(flatten)]
    pub blog: Blog,
    pub like_count: i64,
    pub view_count: i64,
    pub comment_count: i64,
}
