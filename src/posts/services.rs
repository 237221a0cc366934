use tracing::{error, info};
use uuid::Uuid;

use super::repo::{NewPost, Post};
use crate::error::AppError;
use crate::state::AppState;
use crate::uploads::{discard_picture, stage_picture, UploadItem};

pub const MAX_DESCRIPTION_LEN: usize = 2_000;

/// Creates a post for `user_id`, snapshotting the author's name, location and picture.
pub async fn create_post(
    state: &AppState,
    user_id: Uuid,
    description: String,
    picture: Option<UploadItem>,
) -> Result<Post, AppError> {
    let description = description.trim().to_string();
    if description.is_empty() && picture.is_none() {
        return Err(AppError::validation("description or picture is required"));
    }
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(AppError::validation("description is too long"));
    }

    let author = state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;

    let picture = match picture {
        Some(item) => Some(stage_picture(state, &format!("posts/{user_id}"), item).await?),
        None => None,
    };

    let created = state
        .posts
        .create(NewPost {
            user_id,
            first_name: author.first_name,
            last_name: author.last_name,
            location: author.location,
            description,
            picture_path: picture.as_ref().map(|p| p.key().to_string()),
            user_picture_path: author.picture_path,
        })
        .await;
    let post = match created {
        Ok(post) => post,
        Err(e) => {
            error!(error = %e, "create post failed");
            discard_picture(picture).await;
            return Err(e.into());
        }
    };
    if let Some(p) = picture {
        p.commit();
    }

    info!(post_id = %post.id, user_id = %user_id, "post created");
    Ok(post)
}

pub async fn toggle_like(state: &AppState, post_id: Uuid, user_id: Uuid) -> Result<Post, AppError> {
    state
        .posts
        .toggle_like(post_id, user_id)
        .await
        .map_err(|e| match e {
            crate::error::StoreError::NotFound => AppError::not_found("Post not found"),
            other => other.into(),
        })
}
