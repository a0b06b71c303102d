use std::{
    fmt,
    str::FromStr,
    sync::Arc,
    task::{Context, Poll},
};

use axum::{
    body::Body,
    http::Request,
    response::{IntoResponse, Response},
};
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tower::{Layer, Service};

use super::identity::CurrentUser;
use crate::{db::entities::user, error::AppError};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Moderator,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Moderator => "moderator",
            Role::User => "user",
        }
    }
}

impl TryFrom<&str> for Role {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "admin" => Ok(Role::Admin),
            "moderator" => Ok(Role::Moderator),
            "user" => Ok(Role::User),
            _ => Err(()),
        }
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Role::try_from(value).map_err(|_| AppError::bad_request(format!("Unknown role: {value}")))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Allow-list of roles permitted to perform an operation.
#[derive(Debug, Clone)]
pub struct RoleAccess {
    allowed: Arc<[Role]>,
}

impl RoleAccess {
    pub fn new(allowed: &[Role]) -> Self {
        Self {
            allowed: Arc::from(allowed),
        }
    }

    /// Authentication is checked before the role is looked at.
    pub fn authorize(&self, user: Option<&user::Model>) -> Result<(), AppError> {
        let user = user.ok_or_else(|| AppError::unauthorized("Not authenticated"))?;

        match Role::try_from(user.role.as_str()) {
            Ok(role) if self.allowed.contains(&role) => Ok(()),
            _ => Err(AppError::forbidden("Operation forbidden")),
        }
    }
}

/// Route-group form of [`RoleAccess`]. Must sit inside `require_identity`.
#[derive(Clone)]
pub struct RoleAccessLayer {
    access: RoleAccess,
}

impl RoleAccessLayer {
    pub fn new(allowed: &[Role]) -> Self {
        Self {
            access: RoleAccess::new(allowed),
        }
    }
}

#[derive(Clone)]
pub struct RequireRole<S> {
    inner: S,
    access: RoleAccess,
}

impl<S> Layer<S> for RoleAccessLayer {
    type Service = RequireRole<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequireRole {
            inner,
            access: self.access.clone(),
        }
    }
}

impl<S> Service<Request<Body>> for RequireRole<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let access = self.access.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let user = req.extensions().get::<CurrentUser>().map(|current| &current.0);
            if let Err(err) = access.authorize(user) {
                return Ok(err.into_response());
            }

            inner.call(req).await
        })
    }
}
