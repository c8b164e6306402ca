// common/src/error.rs
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure taxonomy shared by the issuing service and the session client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("User not found")]
    NotFound,
    #[error("Account is disabled")]
    Disabled,
    #[error("Invalid credentials")]
    BadCredential,
    #[error("Signature does not match wallet address")]
    SignatureMismatch,
    #[error("Signed message expired or already used")]
    ReplayRejected,
    #[error("Invalid refresh token")]
    Rejected,
    #[error("Service unavailable: {0}")]
    NetworkFailure(String),
    #[error("Email verification required")]
    Unverified,
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Not authenticated")]
    Unauthenticated,
    #[error("Too many attempts, please try again later")]
    RateLimited,
    #[error("Another authentication request is already in progress")]
    Busy,
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Machine-readable error code carried in failed responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotFound,
    Disabled,
    BadCredential,
    SignatureMismatch,
    ReplayRejected,
    Rejected,
    NetworkFailure,
    Unverified,
    Validation,
    Conflict,
    Unauthenticated,
    RateLimited,
    Busy,
    Internal,
}

impl AuthError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AuthError::NotFound => ErrorCode::NotFound,
            AuthError::Disabled => ErrorCode::Disabled,
            AuthError::BadCredential => ErrorCode::BadCredential,
            AuthError::SignatureMismatch => ErrorCode::SignatureMismatch,
            AuthError::ReplayRejected => ErrorCode::ReplayRejected,
            AuthError::Rejected => ErrorCode::Rejected,
            AuthError::NetworkFailure(_) => ErrorCode::NetworkFailure,
            AuthError::Unverified => ErrorCode::Unverified,
            AuthError::Validation(_) => ErrorCode::Validation,
            AuthError::Conflict(_) => ErrorCode::Conflict,
            AuthError::Unauthenticated => ErrorCode::Unauthenticated,
            AuthError::RateLimited => ErrorCode::RateLimited,
            AuthError::Busy => ErrorCode::Busy,
            AuthError::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Rebuild an error from a failed response. Codes carrying free text keep
    /// the server's message.
    pub fn from_code(code: ErrorCode, message: &str) -> Self {
        match code {
            ErrorCode::NotFound => AuthError::NotFound,
            ErrorCode::Disabled => AuthError::Disabled,
            ErrorCode::BadCredential => AuthError::BadCredential,
            ErrorCode::SignatureMismatch => AuthError::SignatureMismatch,
            ErrorCode::ReplayRejected => AuthError::ReplayRejected,
            ErrorCode::Rejected => AuthError::Rejected,
            ErrorCode::NetworkFailure => AuthError::NetworkFailure(message.to_string()),
            ErrorCode::Unverified => AuthError::Unverified,
            ErrorCode::Validation => AuthError::Validation(message.to_string()),
            ErrorCode::Conflict => AuthError::Conflict(message.to_string()),
            ErrorCode::Unauthenticated => AuthError::Unauthenticated,
            ErrorCode::RateLimited => AuthError::RateLimited,
            ErrorCode::Busy => AuthError::Busy,
            ErrorCode::Internal => AuthError::Internal(message.to_string()),
        }
    }
}
