// auth-server/src/signature.rs
//! EIP-191 `personal_sign` recovery over secp256k1.
use common::AuthError;
use keccak_hash::keccak;
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};

/// Keccak-256 of the EIP-191 prefixed message
pub fn eip191_hash(message: &str) -> [u8; 32] {
    let prefixed = format!("\x19Ethereum Signed Message:\n{}{}", message.len(), message);
    keccak(prefixed.as_bytes()).0
}

/// Ethereum address (lower-case, 0x-prefixed) of a public key
pub fn address_from_public_key(public_key: &PublicKey) -> String {
    // Uncompressed form is 0x04 || X || Y; the address hashes X || Y
    let uncompressed = public_key.serialize_uncompressed();
    let hash = keccak(&uncompressed[1..]);
    format!("0x{}", hex::encode(&hash.0[12..32]))
}

/// Recover the signing address from a 65-byte `r || s || v` hex signature
pub fn recover_address(message: &str, signature: &str) -> Result<String, AuthError> {
    let raw = hex::decode(signature.trim().trim_start_matches("0x"))
        .map_err(|_| AuthError::Validation("Signature is not valid hex".into()))?;
    if raw.len() != 65 {
        return Err(AuthError::Validation("Signature must be 65 bytes".into()));
    }

    let v = match raw[64] {
        v @ (0 | 1) => v,
        v @ (27 | 28) => v - 27,
        _ => return Err(AuthError::Validation("Unsupported signature recovery id".into())),
    };

    let recovery_id = RecoveryId::from_i32(i32::from(v)).map_err(|_| AuthError::SignatureMismatch)?;
    let signature =
        RecoverableSignature::from_compact(&raw[..64], recovery_id).map_err(|_| AuthError::SignatureMismatch)?;
    let digest = Message::from_digest(eip191_hash(message));

    let public_key = Secp256k1::verification_only()
        .recover_ecdsa(&digest, &signature)
        .map_err(|_| AuthError::SignatureMismatch)?;

    Ok(address_from_public_key(&public_key))
}

/// Produce a `personal_sign` style signature (v = 27/28). Used by tooling and tests.
pub fn sign_message(secret_key: &SecretKey, message: &str) -> String {
    let secp = Secp256k1::new();
    let digest = Message::from_digest(eip191_hash(message));
    let (recovery_id, compact) = secp.sign_ecdsa_recoverable(&digest, secret_key).serialize_compact();

    let mut raw = compact.to_vec();
    raw.push(recovery_id.to_i32() as u8 + 27);
    format!("0x{}", hex::encode(raw))
}

/// Address controlled by a secret key
pub fn address_of(secret_key: &SecretKey) -> String {
    let secp = Secp256k1::new();
    address_from_public_key(&PublicKey::from_secret_key(&secp, secret_key))
}
