use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::repo_types::{NewUser, User};
use crate::error::StoreError;

/// Credential store. Email uniqueness is enforced here, never by callers.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with [`StoreError::Conflict`] when the email is already taken.
    async fn create(&self, user: NewUser) -> Result<User, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    /// Users in the order of `ids`; unknown ids are skipped.
    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<User>, StoreError>;
    /// Adds or removes a mutual friendship and returns `user_id`'s friend list.
    async fn toggle_friend(&self, user_id: Uuid, friend_id: Uuid) -> Result<Vec<Uuid>, StoreError>;
}

pub struct PgUserRepository {
    db: PgPool,
}

impl PgUserRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, first_name, last_name, email, password_hash, picture_path,
                               location, occupation, viewed_profile, impressions)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id, first_name, last_name, email, password_hash, picture_path, friends,
                      location, occupation, viewed_profile, impressions, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.picture_path)
        .bind(&user.location)
        .bind(&user.occupation)
        .bind(user.viewed_profile)
        .bind(user.impressions)
        .fetch_one(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, first_name, last_name, email, password_hash, picture_path, friends,
                   location, occupation, viewed_profile, impressions, created_at, updated_at
            FROM users
            WHERE lower(email) = lower($1)
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, first_name, last_name, email, password_hash, picture_path, friends,
                   location, occupation, viewed_profile, impressions, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<User>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, first_name, last_name, email, password_hash, picture_path, friends,
                   location, occupation, viewed_profile, impressions, created_at, updated_at
            FROM users
            WHERE id = ANY($1)
            ORDER BY array_position($1, id)
            "#,
        )
        .bind(ids)
        .fetch_all(&self.db)
        .await?;
        Ok(users)
    }

    async fn toggle_friend(&self, user_id: Uuid, friend_id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        let mut tx = self.db.begin().await?;

        // Lock both rows in id order so two opposite toggles can't deadlock.
        let rows: Vec<(Uuid, Vec<Uuid>)> = sqlx::query_as(
            r#"SELECT id, friends FROM users WHERE id = ANY($1) ORDER BY id FOR UPDATE"#,
        )
        .bind(vec![user_id, friend_id])
        .fetch_all(&mut *tx)
        .await?;
        if rows.len() != 2 {
            return Err(StoreError::NotFound);
        }

        let already = rows
            .iter()
            .any(|(id, friends)| *id == user_id && friends.contains(&friend_id));
        let sql = if already {
            r#"UPDATE users SET friends = array_remove(friends, $2), updated_at = now() WHERE id = $1"#
        } else {
            r#"UPDATE users SET friends = array_append(array_remove(friends, $2), $2), updated_at = now() WHERE id = $1"#
        };
        for (a, b) in [(user_id, friend_id), (friend_id, user_id)] {
            sqlx::query(sql).bind(a).bind(b).execute(&mut *tx).await?;
        }

        let (friends,): (Vec<Uuid>,) =
            sqlx::query_as(r#"SELECT friends FROM users WHERE id = $1"#)
                .bind(user_id)
                .fetch_one(&mut *tx)
                .await?;
        tx.commit().await?;
        Ok(friends)
    }
}

#[derive(Default)]
struct MemoryUsers {
    by_id: HashMap<Uuid, User>,
    by_email: HashMap<String, Uuid>,
}

/// In-process store used when no database is configured, and by tests.
#[derive(Default)]
pub struct MemoryUserRepository {
    inner: RwLock<MemoryUsers>,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let key = user.email.to_lowercase();
        // Check and insert under one write lock: concurrent duplicates see each other.
        let mut inner = self.inner.write().await;
        if inner.by_email.contains_key(&key) {
            return Err(StoreError::Conflict);
        }
        let now = OffsetDateTime::now_utc();
        let record = User {
            id: Uuid::new_v4(),
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            password_hash: user.password_hash,
            picture_path: user.picture_path,
            friends: Vec::new(),
            location: user.location,
            occupation: user.occupation,
            viewed_profile: user.viewed_profile,
            impressions: user.impressions,
            created_at: now,
            updated_at: now,
        };
        inner.by_email.insert(key, record.id);
        inner.by_id.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .by_email
            .get(&email.to_lowercase())
            .and_then(|id| inner.by_id.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.inner.read().await.by_id.get(&id).cloned())
    }

    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<User>, StoreError> {
        let inner = self.inner.read().await;
        Ok(ids.iter().filter_map(|id| inner.by_id.get(id).cloned()).collect())
    }

    async fn toggle_friend(&self, user_id: Uuid, friend_id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        let mut inner = self.inner.write().await;
        if !inner.by_id.contains_key(&user_id) || !inner.by_id.contains_key(&friend_id) {
            return Err(StoreError::NotFound);
        }
        let already = inner
            .by_id
            .get(&user_id)
            .is_some_and(|u| u.friends.contains(&friend_id));
        let now = OffsetDateTime::now_utc();
        for (a, b) in [(user_id, friend_id), (friend_id, user_id)] {
            if let Some(u) = inner.by_id.get_mut(&a) {
                u.friends.retain(|f| *f != b);
                if !already {
                    u.friends.push(b);
                }
                u.updated_at = now;
            }
        }
        Ok(inner
            .by_id
            .get(&user_id)
            .map(|u| u.friends.clone())
            .unwrap_or_default())
    }
}
