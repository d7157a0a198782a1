//! API error types with HTTP status code mapping.
//!
//! [`ApiError`] is the single error type used by the store, the services
//! and the handlers. Each variant maps to an HTTP status code and a
//! structured JSON error response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 1101,
///     "message": "insufficient tokens"
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message, safe to display.
    pub message: String,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category              | HTTP Status               |
/// |-----------|-----------------------|---------------------------|
/// | 1000–1999 | Validation / business | 400 Bad Request           |
/// | 2000–2999 | Identity              | 401 Unauthorized / 403    |
/// | 3000–3999 | Lookup / uniqueness   | 404 Not Found / 409       |
/// | 5000–5999 | Server                | 500 Internal Server Error |
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed or missing input.
    #[error("invalid request: {0}")]
    BadRequest(String),

    /// The wallet to debit holds fewer tokens than required.
    #[error("insufficient tokens")]
    InsufficientTokens,

    /// The stand holds less stock than the requested quantity.
    #[error("insufficient stock")]
    InsufficientStock,

    /// The requested transition is not allowed from the current state.
    #[error("{0}")]
    InvalidState(String),

    /// No usable caller identity.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated, but not entitled to this action.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Referenced entity does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// Another account already uses this email.
    #[error("email already exists: {0}")]
    EmailAlreadyExists(String),

    /// Duplicate unique field other than the email.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    Persistence(String),
}

impl ApiError {
    /// Builds a [`ApiError::NotFound`] for the given entity kind and id.
    #[must_use]
    pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("{entity} {id}"))
    }

    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::BadRequest(_) => 1001,
            Self::InsufficientTokens => 1101,
            Self::InsufficientStock => 1102,
            Self::InvalidState(_) => 1201,
            Self::Unauthorized(_) => 2001,
            Self::Forbidden(_) => 2101,
            Self::NotFound(_) => 3001,
            Self::EmailAlreadyExists(_) => 3101,
            Self::Conflict(_) => 3102,
            Self::Persistence(_) => 5001,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_)
            | Self::InsufficientTokens
            | Self::InsufficientStock
            | Self::InvalidState(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::EmailAlreadyExists(_) | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message exposed to clients. Server-side failures are logged and
    /// replaced by a generic text.
    fn public_message(&self) -> String {
        match self {
            Self::Persistence(_) => "internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound("row".to_string()),
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                if db_err.constraint() == Some("users_email_key") {
                    Self::EmailAlreadyExists(db_err.message().to_string())
                } else {
                    Self::Conflict(db_err.message().to_string())
                }
            }
            sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                Self::BadRequest(db_err.message().to_string())
            }
            sqlx::Error::Database(ref db_err) if db_err.is_check_violation() => {
                Self::BadRequest(db_err.message().to_string())
            }
            other => Self::Persistence(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, code = self.error_code(), "request failed");
        }
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.public_message(),
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_rule_violations_are_bad_requests() {
        assert_eq!(ApiError::InsufficientTokens.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::InsufficientStock.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::InvalidState("tombola already ended".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn identity_errors_map_to_401_and_403() {
        assert_eq!(
            ApiError::Unauthorized("missing x-user-id".to_string()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::Forbidden("not the owner".to_string()).status_code(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn not_found_message_names_the_entity() {
        let err = ApiError::not_found("stand", 42);
        assert_eq!(err.to_string(), "stand 42 not found");
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn row_not_found_becomes_not_found() {
        let err = ApiError::from(sqlx::Error::RowNotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn server_errors_hide_their_details() {
        let err = ApiError::Persistence("connection reset by peer".to_string());
        assert_eq!(err.public_message(), "internal server error");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn email_conflict_is_409() {
        let err = ApiError::EmailAlreadyExists("ada@example.org".to_string());
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.error_code(), 3101);
    }
}
