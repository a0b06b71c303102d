use std::any::Any;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tower_http::catch_panic::CatchPanicLayer;

use crate::response::JsonApiResponse;

pub fn catch_panic_layer() -> CatchPanicLayer<fn(Box<dyn Any + Send + 'static>) -> Response> {
    CatchPanicLayer::custom(panic_to_json)
}

fn panic_to_json(panic: Box<dyn Any + Send + 'static>) -> Response {
    let details = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");

    // Panic details only reach clients in debug builds.
    let message = if cfg!(debug_assertions) {
        format!("internal server error: {details}")
    } else {
        "internal server error".to_string()
    };

    JsonApiResponse {
        status: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
        message,
        data: serde_json::Value::Null,
    }
    .into_response()
}
