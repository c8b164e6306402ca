// auth-server/src/password.rs
//! Argon2 password hashing and the registration password policy.
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use common::AuthError;
use rand::{thread_rng, RngCore};

const SPECIAL_CHARACTERS: &str = "!@#$%^&*(),.?\":{}|<>";

/// Hash a password into a PHC string
pub fn hash_password(plain: &str) -> Result<String, AuthError> {
    let mut salt_bytes = [0u8; 16];
    thread_rng().fill_bytes(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| AuthError::Internal(e.to_string()))?;

    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Internal(e.to_string()))
}

/// Verify a password against a PHC string. Malformed hashes never verify.
pub fn verify_password(hash: &str, plain: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default().verify_password(plain.as_bytes(), &parsed).is_ok(),
        Err(_) => false,
    }
}

/// Check a new password against the complexity rules
pub fn validate_password_strength(password: &str, min_length: usize) -> Result<(), AuthError> {
    let reject = |msg: &str| Err(AuthError::Validation(msg.to_string()));

    if password.chars().count() < min_length {
        return Err(AuthError::Validation(format!(
            "Password must be at least {} characters long",
            min_length
        )));
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return reject("Password must contain at least one uppercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return reject("Password must contain at least one lowercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return reject("Password must contain at least one number");
    }
    if !password.chars().any(|c| SPECIAL_CHARACTERS.contains(c)) {
        return reject("Password must contain at least one special character");
    }
    Ok(())
}
