use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the store. Deliberately not `Serialize`: only [`PublicUser`] leaves the process.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,             // trimmed + lowercased
    pub password_hash: String,     // Argon2 PHC string
    pub picture_path: Option<String>,
    pub friends: Vec<Uuid>,
    pub location: Option<String>,
    pub occupation: Option<String>,
    pub viewed_profile: i32,
    pub impressions: i32,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Input for creating a user; the password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub picture_path: Option<String>,
    pub location: Option<String>,
    pub occupation: Option<String>,
    pub viewed_profile: i32,
    pub impressions: i32,
}

/// Public part of the user returned to the client.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub picture_path: Option<String>,
    pub friends: Vec<Uuid>,
    pub location: Option<String>,
    pub occupation: Option<String>,
    pub viewed_profile: i32,
    pub impressions: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            first_name: u.first_name,
            last_name: u.last_name,
            email: u.email,
            picture_path: u.picture_path,
            friends: u.friends,
            location: u.location,
            occupation: u.occupation,
            viewed_profile: u.viewed_profile,
            impressions: u.impressions,
            created_at: u.created_at,
        }
    }
}

/// Trimmed-down user shown in friend lists.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendView {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub occupation: Option<String>,
    pub location: Option<String>,
    pub picture_path: Option<String>,
}

impl From<User> for FriendView {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            first_name: u.first_name,
            last_name: u.last_name,
            occupation: u.occupation,
            location: u.location,
            picture_path: u.picture_path,
        }
    }
}
