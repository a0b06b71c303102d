use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::error::AppError;

pub type ApiResult<T> = Result<JsonApiResponse<T>, AppError>;

/// Envelope shared by every JSON response, success or failure.
#[derive(Debug, Serialize)]
pub struct JsonApiResponse<T: Serialize> {
    pub status: u16,
    pub message: String,
    pub data: T,
}

impl<T: Serialize> JsonApiResponse<T> {
    pub fn ok(data: T) -> ApiResult<T> {
        Self::with_status(StatusCode::OK, "ok", data)
    }

    pub fn created(message: impl Into<String>, data: T) -> ApiResult<T> {
        Self::with_status(StatusCode::CREATED, message, data)
    }

    pub fn with_status(status: StatusCode, message: impl Into<String>, data: T) -> ApiResult<T> {
        Ok(Self {
            status: status.as_u16(),
            message: message.into(),
            data,
        })
    }
}

impl JsonApiResponse<serde_json::Value> {
    pub(crate) fn from_error(err: &AppError) -> Self {
        Self {
            status: status_for(err).as_u16(),
            message: err.message().to_string(),
            data: serde_json::Value::Null,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        if status.is_server_error() {
            log_app_error(&self, status);
        }
        JsonApiResponse::from_error(&self).into_response()
    }
}

impl<T: Serialize> IntoResponse for JsonApiResponse<T> {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

pub(crate) fn log_app_error(err: &AppError, status: StatusCode) {
    tracing::error!(status = status.as_u16(), error = %err, "request failed");
}

pub(crate) fn status_for(err: &AppError) -> StatusCode {
    match err {
        AppError::BadRequest(_) | AppError::InvalidToken(_) => StatusCode::BAD_REQUEST,
        AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        AppError::Forbidden(_) => StatusCode::FORBIDDEN,
        AppError::NotFound(_) => StatusCode::NOT_FOUND,
        AppError::Conflict(_) => StatusCode::CONFLICT,
        AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use axum::{http::StatusCode, response::IntoResponse};

    use super::{JsonApiResponse, status_for};
    use crate::error::AppError;

    #[test]
    fn invalid_token_is_a_client_error() {
        assert_eq!(
            status_for(&AppError::invalid_token("Invalid token")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&AppError::unauthorized("nope")),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn created_envelope_keeps_status() {
        let response = JsonApiResponse::created("made", 1u8)
            .expect("envelope should build")
            .into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
    }
}
