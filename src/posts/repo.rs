use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::StoreError;

#[derive(Debug, Clone, FromRow)]
pub struct Post {
    pub id: Uuid,
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub location: Option<String>,
    pub description: String,
    pub picture_path: Option<String>,
    pub user_picture_path: Option<String>,
    pub likes: Vec<Uuid>,
    pub comments: Vec<String>,
    pub created_at: OffsetDateTime,
}

/// Author snapshot is copied in at creation time.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub location: Option<String>,
    pub description: String,
    pub picture_path: Option<String>,
    pub user_picture_path: Option<String>,
}

#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn create(&self, post: NewPost) -> Result<Post, StoreError>;
    /// Newest first.
    async fn list_all(&self) -> Result<Vec<Post>, StoreError>;
    /// Newest first.
    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Post>, StoreError>;
    /// Adds `user_id` to the likes, or removes it if already there.
    async fn toggle_like(&self, post_id: Uuid, user_id: Uuid) -> Result<Post, StoreError>;
}

pub struct PgPostRepository {
    db: PgPool,
}

impl PgPostRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PostRepository for PgPostRepository {
    async fn create(&self, post: NewPost) -> Result<Post, StoreError> {
        let post = sqlx::query_as::<_, Post>(
            r#"
            INSERT INTO posts (id, user_id, first_name, last_name, location, description,
                               picture_path, user_picture_path)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, user_id, first_name, last_name, location, description,
                      picture_path, user_picture_path, likes, comments, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(post.user_id)
        .bind(&post.first_name)
        .bind(&post.last_name)
        .bind(&post.location)
        .bind(&post.description)
        .bind(&post.picture_path)
        .bind(&post.user_picture_path)
        .fetch_one(&self.db)
        .await?;
        Ok(post)
    }

    async fn list_all(&self) -> Result<Vec<Post>, StoreError> {
        let rows = sqlx::query_as::<_, Post>(
            r#"
            SELECT id, user_id, first_name, last_name, location, description,
                   picture_path, user_picture_path, likes, comments, created_at
            FROM posts
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Post>, StoreError> {
        let rows = sqlx::query_as::<_, Post>(
            r#"
            SELECT id, user_id, first_name, last_name, location, description,
                   picture_path, user_picture_path, likes, comments, created_at
            FROM posts
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn toggle_like(&self, post_id: Uuid, user_id: Uuid) -> Result<Post, StoreError> {
        let post = sqlx::query_as::<_, Post>(
            r#"
            UPDATE posts
            SET likes = CASE WHEN $2 = ANY(likes) THEN array_remove(likes, $2)
                             ELSE array_append(likes, $2) END
            WHERE id = $1
            RETURNING id, user_id, first_name, last_name, location, description,
                      picture_path, user_picture_path, likes, comments, created_at
            "#,
        )
        .bind(post_id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(StoreError::NotFound)?;
        Ok(post)
    }
}

/// In-process post store, insertion ordered.
#[derive(Default)]
pub struct MemoryPostRepository {
    posts: RwLock<Vec<Post>>,
}

impl MemoryPostRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PostRepository for MemoryPostRepository {
    async fn create(&self, post: NewPost) -> Result<Post, StoreError> {
        let record = Post {
            id: Uuid::new_v4(),
            user_id: post.user_id,
            first_name: post.first_name,
            last_name: post.last_name,
            location: post.location,
            description: post.description,
            picture_path: post.picture_path,
            user_picture_path: post.user_picture_path,
            likes: Vec::new(),
            comments: Vec::new(),
            created_at: OffsetDateTime::now_utc(),
        };
        self.posts.write().await.push(record.clone());
        Ok(record)
    }

    async fn list_all(&self) -> Result<Vec<Post>, StoreError> {
        Ok(self.posts.read().await.iter().rev().cloned().collect())
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Post>, StoreError> {
        Ok(self
            .posts
            .read()
            .await
            .iter()
            .rev()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn toggle_like(&self, post_id: Uuid, user_id: Uuid) -> Result<Post, StoreError> {
        let mut posts = self.posts.write().await;
        let post = posts
            .iter_mut()
            .find(|p| p.id == post_id)
            .ok_or(StoreError::NotFound)?;
        if let Some(pos) = post.likes.iter().position(|u| *u == user_id) {
            post.likes.remove(pos);
        } else {
            post.likes.push(user_id);
        }
        Ok(post.clone())
    }
}
