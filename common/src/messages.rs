// Common Crate - messages.rs
// Request and response bodies of the /api/auth surface
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, ErrorCode};
use crate::models::{Identity, TokenPair};
use crate::utils::is_wallet_address;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LoginMethod {
    Email,
    Username,
    Wallet,
}

impl LoginMethod {
    /// Guess the lookup method from the shape of the identifier
    pub fn infer(identifier: &str) -> Self {
        if identifier.contains('@') {
            LoginMethod::Email
        } else if is_wallet_address(identifier) {
            LoginMethod::Wallet
        } else {
            LoginMethod::Username
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    /// Username, email, or wallet address
    pub identifier: String,
    pub password: Option<String>,
    pub signature: Option<String>,
    pub message: Option<String>,
    pub method: Option<LoginMethod>,
}

impl LoginRequest {
    pub fn resolved_method(&self) -> LoginMethod {
        self.method.unwrap_or_else(|| LoginMethod::infer(&self.identifier))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub wallet_address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletLoginRequest {
    pub wallet_address: String,
    pub signature: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeQuery {
    pub address: String,
}

/// Envelope returned by every token-bearing operation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<TokenPair>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<Identity>,
}

impl AuthResponse {
    pub fn ok(message: impl Into<String>, tokens: Option<TokenPair>, user: Option<Identity>) -> Self {
        Self {
            success: true,
            message: message.into(),
            code: None,
            tokens,
            user,
        }
    }

    pub fn failure(err: &AuthError) -> Self {
        Self {
            success: false,
            message: err.to_string(),
            code: Some(err.code()),
            tokens: None,
            user: None,
        }
    }

    /// Convert a failed envelope back into the error that produced it
    pub fn error(&self) -> Option<AuthError> {
        if self.success {
            return None;
        }
        Some(match self.code {
            Some(code) => AuthError::from_code(code, &self.message),
            None => AuthError::Internal(self.message.clone()),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutResponse {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeResponse {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge: Option<String>,
}
