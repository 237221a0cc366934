pub mod handlers;

use crate::{auth::require_auth, state::AppState};
use axum::{middleware, Router};

pub fn router(state: &AppState) -> Router<AppState> {
    handlers::user_routes()
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
}
