// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

use crate::models::session::SessionStatus;

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    // 500 Internal Server Error (store/serialization failures)
    InternalServerError(String),

    // 400 Bad Request (input shape rejected before any state change)
    BadRequest(String),

    // 403 Forbidden (caller is not the session owner)
    Forbidden(String),

    // 404 Not Found (unknown quiz definition or session)
    NotFound(String),

    // 409 Conflict: all allowed attempts for an assessment are used up
    AttemptsExhausted(String),

    // 409 Conflict: the answered question is not the one currently served
    StaleQuestion(String),

    // 410 Gone: the session reached a terminal state; carries that state so
    // the caller can distinguish completed from expired
    SessionNoLongerActive(SessionStatus),

    // 502 Bad Gateway: the question generator failed twice; the caller may
    // retry the call without side effects
    QuestionGenerationFailed(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for AppError {}

/// Implements `IntoResponse` for `AppError`.
/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal Server Error" }),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, json!({ "error": msg })),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            AppError::AttemptsExhausted(msg) => (StatusCode::CONFLICT, json!({ "error": msg })),
            AppError::StaleQuestion(msg) => (StatusCode::CONFLICT, json!({ "error": msg })),
            AppError::SessionNoLongerActive(state) => (
                StatusCode::GONE,
                json!({
                    "error": "Quiz session is no longer active",
                    "status": state,
                }),
            ),
            AppError::QuestionGenerationFailed(msg) => {
                tracing::warn!("Question generation failed: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    json!({ "error": "Question generation failed, please retry" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

/// Converts `sqlx::Error` into `AppError::InternalServerError`.
/// Allows using `?` operator on database queries.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}
