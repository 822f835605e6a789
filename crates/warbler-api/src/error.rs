use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use warbler_db::DbError;
use warbler_types::api::ErrorResponse;
use warbler_types::forms::FormErrors;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid form data")]
    Form(#[from] FormErrors),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("not found")]
    NotFound,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("internal server error")]
    Internal,
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Form(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error = self.to_string();
        let fields = match self {
            ApiError::Form(errors) => Some(errors.into_map()),
            _ => None,
        };
        (status, Json(ErrorResponse { error, fields })).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::MissingField(field) => ApiError::BadRequest(format!("{field} is required")),
            DbError::UniqueViolation(columns) => {
                let fields: Vec<&str> = columns
                    .split(", ")
                    .map(|c| c.trim_start_matches("users."))
                    .collect();
                ApiError::Conflict(format!("{} already taken", fields.join(", ")))
            }
            DbError::MissingReference => ApiError::NotFound,
            DbError::CheckViolation(detail) => ApiError::BadRequest(detail),
            other => {
                error!("db error: {}", other);
                ApiError::Internal
            }
        }
    }
}
