pub mod auth;
pub mod contacts;
pub mod users;
pub mod validate;

use std::sync::Arc;

use axum::{Router, middleware};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::{
    middleware::{catch_panic_layer, json_error_middleware},
    state::AppState,
};

pub const API_PREFIX: &str = "/api";

pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .nest("/auth", auth::router(state.clone()))
        .nest("/users", users::router(state.clone()))
        .nest("/contacts", contacts::router(state));

    Router::new().nest(API_PREFIX, api)
}

/// Full application: API routes, uploaded avatars, and the shared layers.
pub fn app(state: Arc<AppState>) -> Router {
    let avatars = ServeDir::new(&state.config.avatar.dir);
    let avatar_path = state.config.avatar.public_path.trim_end_matches('/').to_string();

    Router::new()
        .merge(router(state))
        .nest_service(&avatar_path, avatars)
        .layer(middleware::from_fn(json_error_middleware))
        .layer(catch_panic_layer())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
