use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::PathRejection,
        DefaultBodyLimit, Multipart, Path, State,
    },
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::dto::PostView;
use super::repo::Post;
use super::services;
use crate::{auth::AuthUser, error::AppError, state::AppState, uploads::MultipartForm};

pub fn post_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/posts", get(feed).post(create_post))
        .route("/posts/:id/posts", get(user_posts))
        .route("/posts/:id/like", patch(like_post))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

fn views(state: &AppState, posts: Vec<Post>) -> Vec<PostView> {
    posts
        .into_iter()
        .map(|p| PostView::new(p, state.storage.as_ref()))
        .collect()
}

/// POST /posts (multipart: description, picture)
#[instrument(skip(state, mp))]
pub async fn create_post(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    mp: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<PostView>), AppError> {
    let mut form = MultipartForm::read(mp?).await?;
    let description = form.fields.remove("description").unwrap_or_default();
    let post = services::create_post(&state, user_id, description, form.picture).await?;
    Ok((
        StatusCode::CREATED,
        Json(PostView::new(post, state.storage.as_ref())),
    ))
}

#[instrument(skip(state))]
pub async fn feed(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
) -> Result<Json<Vec<PostView>>, AppError> {
    let posts = state.posts.list_all().await?;
    Ok(Json(views(&state, posts)))
}

#[instrument(skip(state))]
pub async fn user_posts(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    user_id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Vec<PostView>>, AppError> {
    let Path(user_id) = user_id?;
    let posts = state.posts.list_by_user(user_id).await?;
    Ok(Json(views(&state, posts)))
}

/// PATCH /posts/:id/like, toggles the caller's like.
#[instrument(skip(state))]
pub async fn like_post(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<PostView>, AppError> {
    let Path(id) = id?;
    let post = services::toggle_like(&state, id, user_id).await?;
    Ok(Json(PostView::new(post, state.storage.as_ref())))
}
