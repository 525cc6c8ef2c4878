//! API error handling.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::auth::AuthError;
use crate::feed::{FetchError, RefreshError};
use crate::storage::DatabaseError;
use crate::util::UrlValidationError;

/// API error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Bad request (400).
    BadRequest,
    /// Unauthorized (401).
    Unauthorized,
    /// Not found (404).
    NotFound,
    /// Internal server error (500).
    InternalError,
}

impl ErrorCode {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::BadRequest => StatusCode::BAD_REQUEST,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    code: ErrorCode,
    message: String,
}

/// Error returned by every handler, rendered as `{"error": {"code", "message"}}`.
#[derive(Debug)]
pub struct ApiError {
    code: ErrorCode,
    message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.code.status_code();
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (status, Json(body)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotInReadLater => ApiError::not_found(err.to_string()),
            _ => {
                tracing::error!(error = %err, "Database error");
                ApiError::internal("An internal error occurred")
            }
        }
    }
}

impl From<FetchError> for ApiError {
    fn from(err: FetchError) -> Self {
        if err.is_not_found() {
            return ApiError::bad_request("No feed found at the given URL");
        }
        tracing::error!(error = %err, "Feed fetch failed");
        ApiError::internal("Failed to fetch feed")
    }
}

impl From<RefreshError> for ApiError {
    fn from(err: RefreshError) -> Self {
        tracing::error!(error = %err, "Refresh failed");
        ApiError::internal("Refresh failed")
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::UnknownToken => ApiError::unauthorized("Invalid token"),
            AuthError::Expired => ApiError::unauthorized("Token expired"),
            AuthError::Database(e) => e.into(),
        }
    }
}

impl From<UrlValidationError> for ApiError {
    fn from(err: UrlValidationError) -> Self {
        ApiError::bad_request(err.to_string())
    }
}
