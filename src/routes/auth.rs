use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    routing::{get, patch, post},
};
use serde::Deserialize;

use super::validate;
use crate::{
    auth::{BearerToken, CurrentUser, TokenBundle},
    db::entities::user,
    error::AppError,
    response::{ApiResult, JsonApiResponse},
    services::{
        ServiceContext,
        auth_service::{ResetPasswordInput, SignupInput},
    },
    state::AppState,
};

const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
    pub email: Option<String>,
}

pub fn router(state: Arc<AppState>) -> Router {
    let avatar_limit = state.config.avatar.max_bytes + MULTIPART_OVERHEAD_BYTES;

    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/refresh_token", get(refresh_token))
        .route("/confirmed_email/{token}", get(confirmed_email))
        .route("/request_reset_password", post(request_reset_password))
        .route("/reset_password", post(reset_password))
        .route(
            "/avatar",
            patch(update_avatar).layer(DefaultBodyLimit::max(avatar_limit)),
        )
        .with_state(state)
}

async fn signup(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SignupRequest>,
) -> ApiResult<user::Model> {
    validate::username(&body.username)?;
    validate::email(&body.email)?;
    validate::password(&body.password)?;

    let user = ServiceContext::from_state(&state)
        .auth()
        .signup(SignupInput {
            username: &body.username,
            email: &body.email,
            password: &body.password,
        })
        .await?;

    JsonApiResponse::created(
        "User successfully created. Check your email for confirmation.",
        user,
    )
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> ApiResult<TokenBundle> {
    let tokens = ServiceContext::from_state(&state)
        .auth()
        .login(&body.email, &body.password)
        .await?;
    JsonApiResponse::ok(tokens)
}

async fn refresh_token(
    State(state): State<Arc<AppState>>,
    BearerToken(token): BearerToken,
) -> ApiResult<TokenBundle> {
    let tokens = ServiceContext::from_state(&state)
        .auth()
        .refresh(&token)
        .await?;
    JsonApiResponse::ok(tokens)
}

async fn confirmed_email(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> ApiResult<()> {
    let message = ServiceContext::from_state(&state)
        .auth()
        .confirm_email(&token)
        .await?;
    JsonApiResponse::with_status(StatusCode::OK, message, ())
}

async fn request_reset_password(
    State(state): State<Arc<AppState>>,
    Json(body): Json<EmailRequest>,
) -> ApiResult<()> {
    validate::email(&body.email)?;
    ServiceContext::from_state(&state)
        .auth()
        .request_password_reset(&body.email)
        .await?;
    JsonApiResponse::with_status(StatusCode::OK, "Password reset email sent", ())
}

async fn reset_password(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ResetPasswordRequest>,
) -> ApiResult<()> {
    validate::password(&body.new_password)?;
    ServiceContext::from_state(&state)
        .auth()
        .reset_password(ResetPasswordInput {
            token: &body.token,
            new_password: &body.new_password,
            email: body.email.as_deref(),
        })
        .await?;
    JsonApiResponse::with_status(StatusCode::OK, "Password has been reset", ())
}

async fn update_avatar(
    State(state): State<Arc<AppState>>,
    CurrentUser(current): CurrentUser,
    mut multipart: Multipart,
) -> ApiResult<user::Model> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::bad_request(err.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|err| AppError::bad_request(err.body_text()))?;

        let updated = ServiceContext::from_state(&state)
            .auth()
            .update_avatar(&current, &bytes, &content_type)
            .await?;
        return JsonApiResponse::ok(updated);
    }

    Err(AppError::bad_request("Missing file field"))
}
