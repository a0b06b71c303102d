use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    middleware,
    routing::{get, patch},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::{CurrentUser, Role, RoleAccessLayer, require_identity},
    db::entities::user,
    response::{ApiResult, JsonApiResponse},
    services::ServiceContext,
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: Role,
}

pub fn router(state: Arc<AppState>) -> Router {
    let admin = Router::new()
        .route("/{id}/role", patch(update_role))
        .route_layer(RoleAccessLayer::new(&[Role::Admin]));

    Router::new()
        .route("/me", get(me))
        .merge(admin)
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_identity,
        ))
        .with_state(state)
}

async fn me(CurrentUser(user): CurrentUser) -> ApiResult<user::Model> {
    JsonApiResponse::ok(user)
}

async fn update_role(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<RoleRequest>,
) -> ApiResult<user::Model> {
    let updated = ServiceContext::from_state(&state)
        .users()
        .update_role(id, body.role)
        .await?;
    JsonApiResponse::ok(updated)
}
