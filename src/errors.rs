//! Error handling for the API
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

use crate::auth::AuthError;

#[derive(Debug)]
pub enum ApiError {
    Auth(AuthError),
    Sql(sqlx::Error),
    BadRequest,
    NotFound,
    Conflict,
    Unprocessable,
    Internal,
}

/// Every failure leaves the same envelope the success paths use, with
/// `success` flipped and the status repeated in the body.
fn envelope(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(json!({
            "success": false,
            "error": status.as_u16(),
            "message": message,
        })),
    )
        .into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Auth(e) => envelope(e.status(), e.description()),
            Self::Sql(e) => {
                error!("SQL error: {e}");
                envelope(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error.")
            }
            Self::BadRequest => envelope(StatusCode::BAD_REQUEST, "Bad request."),
            Self::NotFound => envelope(StatusCode::NOT_FOUND, "Resource not found."),
            Self::Conflict => envelope(StatusCode::CONFLICT, "A conflict was found."),
            Self::Unprocessable => envelope(StatusCode::UNPROCESSABLE_ENTITY, "Unprocessable."),
            Self::Internal => {
                envelope(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error.")
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        Self::Auth(e)
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        Self::Sql(e)
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        error!("JSON error: {e}");
        Self::Internal
    }
}
