use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::JsonRejection,
        DefaultBodyLimit, Multipart, State,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{error, instrument};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, RegisterRequest},
        extractors::AuthUser,
        repo_types::PublicUser,
        services::{login_user, register_user},
    },
    error::AppError,
    state::AppState,
    uploads::MultipartForm,
};

pub fn auth_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

/// POST /auth/register (multipart: firstName, lastName, email, password, location, occupation, picture)
#[instrument(skip(state, mp))]
pub async fn register(
    State(state): State<AppState>,
    mp: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<PublicUser>), AppError> {
    let form = MultipartForm::read(mp?).await?;
    let req = RegisterRequest {
        first_name: form.text("firstName").unwrap_or_default(),
        last_name: form.text("lastName").unwrap_or_default(),
        email: form.text("email").unwrap_or_default(),
        // not trimmed: whitespace is part of the password
        password: form.fields.get("password").cloned().unwrap_or_default(),
        location: form.text("location"),
        occupation: form.text("occupation"),
    };

    let user = register_user(&state, req, form.picture).await?;
    Ok((StatusCode::CREATED, Json(PublicUser::from(user))))
}

/// POST /auth/login { email, password }
#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, AppError> {
    let Json(payload) = payload?;
    Ok(Json(login_user(&state, payload).await?))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PublicUser>, AppError> {
    let user = state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| {
            error!(user_id = %user_id, "token subject has no user record");
            AppError::Unauthorized("User not found".into())
        })?;
    Ok(Json(PublicUser::from(user)))
}
