use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo::Post;
use crate::storage::StorageClient;

/// Post as returned to clients, with browser-fetchable picture URLs.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub location: Option<String>,
    pub description: String,
    pub picture_path: Option<String>,
    pub picture_url: Option<String>,
    pub user_picture_path: Option<String>,
    pub user_picture_url: Option<String>,
    pub likes: Vec<Uuid>,
    pub comments: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl PostView {
    pub fn new(post: Post, storage: &dyn StorageClient) -> Self {
        let picture_url = post.picture_path.as_deref().map(|k| storage.public_url(k));
        let user_picture_url = post
            .user_picture_path
            .as_deref()
            .map(|k| storage.public_url(k));
        Self {
            id: post.id,
            user_id: post.user_id,
            first_name: post.first_name,
            last_name: post.last_name,
            location: post.location,
            description: post.description,
            picture_path: post.picture_path,
            picture_url,
            user_picture_path: post.user_picture_path,
            user_picture_url,
            likes: post.likes,
            comments: post.comments,
            created_at: post.created_at,
        }
    }
}
