use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header, request::Parts},
    middleware::Next,
    response::Response,
};

use super::jwt::TokenService;
use crate::{db::entities::user, db::store::UserStore, error::AppError, state::AppState};

/// The confirmed user behind the request's access token.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub user::Model);

/// Raw bearer credential, for routes that take a non-access token.
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

pub async fn resolve_identity(
    tokens: &TokenService,
    users: &dyn UserStore,
    bearer: Option<&str>,
) -> Result<user::Model, AppError> {
    let token = bearer.ok_or_else(|| AppError::unauthorized("Not authenticated"))?;

    let claims = tokens.decode_access_token(token).map_err(|err| {
        tracing::debug!(error = %err, "access token rejected");
        AppError::unauthorized("Could not validate credentials")
    })?;

    let user = users
        .find_by_email(&claims.sub)
        .await?
        .ok_or_else(|| AppError::unauthorized("Could not validate credentials"))?;

    if !user.confirmed {
        return Err(AppError::unauthorized("Email not confirmed"));
    }

    Ok(user)
}

/// Resolves the caller once and stores it for inner layers and handlers.
pub async fn require_identity(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = resolve_identity(
        &state.tokens,
        state.stores.users.as_ref(),
        bearer_token(req.headers()),
    )
    .await?;

    req.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(req).await)
}

impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        if let Some(current) = parts.extensions.get::<CurrentUser>().cloned() {
            return Ok(current);
        }

        let user = resolve_identity(
            &state.tokens,
            state.stores.users.as_ref(),
            bearer_token(&parts.headers),
        )
        .await?;

        let current = CurrentUser(user);
        parts.extensions.insert(current.clone());
        Ok(current)
    }
}

impl<S: Send + Sync> FromRequestParts<S> for BearerToken {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        bearer_token(&parts.headers)
            .map(|token| BearerToken(token.to_string()))
            .ok_or_else(|| AppError::unauthorized("Not authenticated"))
    }
}
