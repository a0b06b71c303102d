use axum::{
    body::to_bytes,
    extract::Request,
    http::{HeaderMap, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{
    error::AppError,
    response::{JsonApiResponse, log_app_error},
};

const MAX_ERROR_BODY_BYTES: usize = 16 * 1024;

/// Rewrites plain-text error bodies (extractor rejections, 404/405 fallbacks)
/// into the JSON envelope.
pub async fn json_error_middleware(req: Request, next: Next) -> Response {
    let response = next.run(req).await;
    let status = response.status();

    if !(status.is_client_error() || status.is_server_error()) || is_json(response.headers()) {
        return response;
    }

    let (parts, body) = response.into_parts();
    let message = to_bytes(body, MAX_ERROR_BODY_BYTES)
        .await
        .ok()
        .map(|bytes| String::from_utf8_lossy(&bytes).trim().to_string())
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string()
        });

    let app_error = app_error_from_status(status, message);
    if status.is_server_error() {
        log_app_error(&app_error, status);
    }

    let mut rewritten = JsonApiResponse::from_error(&app_error).into_response();
    *rewritten.status_mut() = status;
    for (name, value) in &parts.headers {
        if name != header::CONTENT_TYPE && name != header::CONTENT_LENGTH {
            rewritten.headers_mut().insert(name.clone(), value.clone());
        }
    }
    rewritten
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| {
            let value = value.to_ascii_lowercase();
            value.contains("application/json") || value.contains("+json")
        })
        .unwrap_or(false)
}

fn app_error_from_status(status: StatusCode, message: String) -> AppError {
    match status {
        StatusCode::UNAUTHORIZED => AppError::unauthorized(message),
        StatusCode::FORBIDDEN => AppError::forbidden(message),
        StatusCode::NOT_FOUND => AppError::not_found(message),
        StatusCode::CONFLICT => AppError::conflict(message),
        _ if status.is_client_error() => AppError::bad_request(message),
        _ => AppError::internal(message),
    }
}
