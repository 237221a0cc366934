pub mod dto;
pub mod handlers;
pub mod repo;
pub mod services;

use crate::{auth::require_auth, state::AppState};
use axum::{middleware, Router};

pub fn router(state: &AppState) -> Router<AppState> {
    handlers::post_routes(state.config.max_upload_bytes)
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
}
