use crate::state::AppState;
use axum::{middleware, Router};

pub mod dto;
pub mod extractors;
pub mod handlers;
pub mod jwt;
pub mod password;
pub mod repo;
pub mod repo_types;
pub mod services;

pub use extractors::{require_auth, AuthUser};

/// Public auth endpoints plus the gated `/me`.
pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .merge(handlers::auth_routes(state.config.max_upload_bytes))
        .merge(
            handlers::me_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), require_auth)),
        )
}
