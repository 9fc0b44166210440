use axum::{
    http::{header::LOCATION, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;

use crate::error::BrokerError;

pub mod handlers;

/// `302 Found` to `url`.
pub fn found(url: &str) -> Response {
    (StatusCode::FOUND, [(LOCATION, url.to_string())]).into_response()
}

/// `{ "ok": true, "result": … }`
pub fn api_ok<T: Serialize>(result: T) -> Response {
    Json(json!({ "ok": true, "result": result })).into_response()
}

/// `{ "ok": false, "error": { "message": … } }`
pub fn api_error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "ok": false, "error": { "message": message } }))).into_response()
}

/// A non-empty query or form value, or a 400 with `missing`.
pub fn required<'a>(value: &'a Option<String>, missing: &'static str) -> Result<&'a str, BrokerError> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or(BrokerError::BadRequest(missing))
}
