// auth-server/src/error.rs
use actix_web::http::{header, StatusCode};
use actix_web::{HttpResponse, ResponseError};
use common::{AuthError, AuthResponse, ErrorCode};
use std::fmt;

/// HTTP face of an `AuthError`. Credential verdicts stay 200 with
/// `success = false`; transport-level conditions get real status codes.
#[derive(Debug)]
pub struct ApiError {
    pub error: AuthError,
    status: StatusCode,
}

impl ApiError {
    pub fn new(error: AuthError, status: StatusCode) -> Self {
        Self { error, status }
    }

    /// Failure on a bearer-protected endpoint
    pub fn bearer(error: AuthError) -> Self {
        let status = match error.code() {
            ErrorCode::Disabled | ErrorCode::Unverified => StatusCode::FORBIDDEN,
            _ => default_status(&error),
        };
        Self::new(error, status)
    }
}

fn default_status(error: &AuthError) -> StatusCode {
    match error.code() {
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Conflict => StatusCode::CONFLICT,
        ErrorCode::Unauthenticated => StatusCode::UNAUTHORIZED,
        ErrorCode::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        ErrorCode::Internal | ErrorCode::NetworkFailure => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::OK,
    }
}

impl From<AuthError> for ApiError {
    fn from(error: AuthError) -> Self {
        let status = default_status(&error);
        Self::new(error, status)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        self.status
    }

    fn error_response(&self) -> HttpResponse {
        let body = match &self.error {
            // Never leak internals to callers
            AuthError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                AuthResponse::failure(&AuthError::Internal("unexpected error".into()))
            }
            other => AuthResponse::failure(other),
        };

        let mut response = HttpResponse::build(self.status);
        if self.status == StatusCode::UNAUTHORIZED {
            response.append_header((header::WWW_AUTHENTICATE, "Bearer"));
        }
        if self.status == StatusCode::TOO_MANY_REQUESTS {
            response.append_header((header::RETRY_AFTER, "60"));
        }
        response.json(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::from(AuthError::BadCredential).status_code(), StatusCode::OK);
        assert_eq!(ApiError::from(AuthError::Validation("x".into())).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::from(AuthError::Unauthenticated).status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::bearer(AuthError::Disabled).status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::bearer(AuthError::Unauthenticated).status_code(), StatusCode::UNAUTHORIZED);
    }
}
