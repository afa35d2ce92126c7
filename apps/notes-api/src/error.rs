use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

/// Structured API error returned to clients.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldError>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Application-level error type that converts into an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
    pub details: Option<Vec<FieldError>>,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "BAD_REQUEST".to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            code: "NOT_FOUND".to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            code: "UNAUTHORIZED".to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "INTERNAL_ERROR".to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn validation(details: Vec<FieldError>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "VALIDATION_ERROR".to_string(),
            message: "Validation failed".to_string(),
            details: Some(details),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: ApiErrorDetail {
                code: self.code,
                message: self.message,
                details: self.details,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

/// Failure of the persistence collaborator.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("query failed: {0}")]
    Query(#[from] diesel::result::Error),
    #[error("stored document is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

impl From<diesel_async::pooled_connection::deadpool::PoolError> for StoreError {
    fn from(err: diesel_async::pooled_connection::deadpool::PoolError) -> Self {
        Self::Unavailable(err.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        tracing::error!(?err, "store error");
        Self::internal("An internal error occurred")
    }
}

// ---------------------------------------------------------------------------
// Token errors
// ---------------------------------------------------------------------------

/// Reasons a bearer token is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("missing token")]
    Missing,
    #[error("invalid token")]
    Invalid,
    #[error("expired token")]
    Expired,
    #[error("revoked token")]
    Revoked,
    #[error("token signing failed")]
    Signing,
}

impl TokenError {
    pub fn client_message(self) -> &'static str {
        match self {
            Self::Missing => "Missing authentication token",
            Self::Invalid => "Invalid authentication token",
            Self::Expired => "Authentication token has expired",
            Self::Revoked => "Authentication token has been revoked",
            Self::Signing => "Token signing failed",
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Signing => Self::internal(err.client_message()),
            _ => Self::unauthorized(err.client_message()),
        }
    }
}

// ---------------------------------------------------------------------------
// Realtime errors
// ---------------------------------------------------------------------------

/// Failure of a single realtime event. Everything except
/// `AuthenticationFailure` is reported back to the sending connection as an
/// `error` event and leaves the connection open.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("authentication failed: {0}")]
    AuthenticationFailure(#[from] TokenError),
    #[error("user is not the owner of meeting {0}")]
    AuthorizationFailure(i64),
    #[error("meeting {0} not found")]
    NotFound(String),
    #[error("dependency unavailable: {0}")]
    DependencyUnavailable(#[from] StoreError),
    #[error("bad payload: {0}")]
    BadPayload(String),
    #[error("too many pending events")]
    Busy,
}

impl GatewayError {
    /// Wire code carried in the `error` event.
    pub fn code(&self) -> &'static str {
        match self {
            Self::AuthenticationFailure(_) => "UNAUTHORIZED",
            Self::AuthorizationFailure(_) => "FORBIDDEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::DependencyUnavailable(_) => "UNAVAILABLE",
            Self::BadPayload(_) => "BAD_REQUEST",
            Self::Busy => "BUSY",
        }
    }

    /// Message safe to show the client; store internals are not exposed.
    pub fn client_message(&self) -> String {
        match self {
            Self::AuthenticationFailure(e) => e.client_message().to_string(),
            Self::AuthorizationFailure(_) => "Not authorized for this meeting".to_string(),
            Self::NotFound(_) => "Meeting not found".to_string(),
            Self::DependencyUnavailable(_) => "Service temporarily unavailable".to_string(),
            Self::BadPayload(reason) => format!("Malformed event: {reason}"),
            Self::Busy => "Too many pending events, try again".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_error_codes() {
        assert_eq!(GatewayError::AuthorizationFailure(1).code(), "FORBIDDEN");
        assert_eq!(GatewayError::NotFound("42".into()).code(), "NOT_FOUND");
        assert_eq!(
            GatewayError::DependencyUnavailable(StoreError::Unavailable("down".into())).code(),
            "UNAVAILABLE"
        );
        assert_eq!(GatewayError::BadPayload("x".into()).code(), "BAD_REQUEST");
        assert_eq!(GatewayError::Busy.code(), "BUSY");
    }

    #[test]
    fn store_details_are_not_leaked_to_clients() {
        let err = GatewayError::from(StoreError::Unavailable("pg://secret-host".into()));
        assert!(!err.client_message().contains("secret-host"));
    }

    #[test]
    fn token_errors_map_to_unauthorized() {
        let api: ApiError = TokenError::Revoked.into();
        assert_eq!(api.status, StatusCode::UNAUTHORIZED);
        assert_eq!(api.message, "Authentication token has been revoked");
    }
}
