use axum::{
    extract::{rejection::PathRejection, Path, State},
    routing::{get, patch},
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::{
        repo_types::{FriendView, PublicUser},
        AuthUser,
    },
    error::{AppError, StoreError},
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users/:id", get(get_user))
        .route("/users/:id/friends", get(get_friends))
        .route("/users/:id/:friend_id", patch(toggle_friend))
}

async fn friend_views(state: &AppState, ids: &[Uuid]) -> Result<Vec<FriendView>, AppError> {
    let friends = state.users.find_many(ids).await?;
    Ok(friends.into_iter().map(FriendView::from).collect())
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<PublicUser>, AppError> {
    let Path(id) = id?;
    let user = state
        .users
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    Ok(Json(PublicUser::from(user)))
}

#[instrument(skip(state))]
pub async fn get_friends(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Vec<FriendView>>, AppError> {
    let Path(id) = id?;
    let user = state
        .users
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    Ok(Json(friend_views(&state, &user.friends).await?))
}

/// PATCH /users/:id/:friend_id, only on your own friend list.
#[instrument(skip(state))]
pub async fn toggle_friend(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    ids: Result<Path<(Uuid, Uuid)>, PathRejection>,
) -> Result<Json<Vec<FriendView>>, AppError> {
    let Path((id, friend_id)) = ids?;
    if caller != id {
        return Err(AppError::Forbidden(
            "You can only change your own friend list".into(),
        ));
    }
    if id == friend_id {
        return Err(AppError::validation("You cannot befriend yourself"));
    }

    let friends = state
        .users
        .toggle_friend(id, friend_id)
        .await
        .map_err(|e| match e {
            StoreError::NotFound => AppError::not_found("User not found"),
            other => other.into(),
        })?;
    info!(user_id = %id, friend_id = %friend_id, friends = friends.len(), "friend list updated");
    Ok(Json(friend_views(&state, &friends).await?))
}
