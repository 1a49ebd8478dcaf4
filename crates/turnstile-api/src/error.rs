use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

use turnstile_access::AccessError;
use turnstile_types::api::ErrorBody;

/// Application-level error that converts into an HTTP response with a
/// machine-readable code. Redemption failures each get their own code
/// because the caller relays different instructions to the user for each.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn unauthorized() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            code: "UNAUTHORIZED",
            message: "Missing or invalid service token".to_string(),
        }
    }

    pub fn not_found(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            code,
            message: message.into(),
        }
    }

    pub fn internal() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "INTERNAL_ERROR",
            message: "An internal error occurred".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.code.to_string(),
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<AccessError> for ApiError {
    fn from(err: AccessError) -> Self {
        let (status, code) = match &err {
            AccessError::NotFound => (StatusCode::NOT_FOUND, "TOKEN_NOT_FOUND"),
            AccessError::AlreadyUsed => (StatusCode::CONFLICT, "TOKEN_ALREADY_USED"),
            AccessError::Expired => (StatusCode::GONE, "TOKEN_EXPIRED"),
            AccessError::Revoked => (StatusCode::GONE, "TOKEN_REVOKED"),
            AccessError::ChannelUnavailable(_) => (StatusCode::BAD_GATEWAY, "CHANNEL_UNAVAILABLE"),
            AccessError::Db(e) => {
                error!("database error: {:#}", e);
                return Self::internal();
            }
        };
        Self {
            status,
            code,
            message: err.to_string(),
        }
    }
}
