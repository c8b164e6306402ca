// auth-server/src/validation.rs
use common::{is_wallet_address, AuthError, RegisterRequest};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::password::validate_password_strength;

static USERNAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_]{3,30}$").expect("valid username regex"));
static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

const MAX_NAME_LENGTH: usize = 50;

/// Validate a registration request before any lookup happens
pub fn validate_registration(req: &RegisterRequest, min_password_length: usize) -> Result<(), AuthError> {
    if !USERNAME_RE.is_match(&req.username) {
        return Err(AuthError::Validation(
            "Username must be 3-30 characters of letters, numbers, and underscores".into(),
        ));
    }
    if !EMAIL_RE.is_match(req.email.trim()) {
        return Err(AuthError::Validation("Invalid email address".into()));
    }

    validate_password_strength(&req.password, min_password_length)?;
    if req.password != req.confirm_password {
        return Err(AuthError::Validation("Passwords do not match".into()));
    }

    for name in [&req.first_name, &req.last_name].into_iter().flatten() {
        if name.chars().count() > MAX_NAME_LENGTH {
            return Err(AuthError::Validation(format!(
                "Names must be at most {} characters",
                MAX_NAME_LENGTH
            )));
        }
    }

    if let Some(wallet) = &req.wallet_address {
        if !is_wallet_address(wallet) {
            return Err(AuthError::Validation("Invalid Ethereum address format".into()));
        }
    }

    Ok(())
}
