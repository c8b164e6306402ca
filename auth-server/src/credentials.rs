// auth-server/src/credentials.rs
//! Credential Validator: password and wallet-signature verdicts.
use actix_web::web;
use chrono::{DateTime, Utc};
use common::models::{Identity, UserStatus};
use common::{is_wallet_address, normalize_address, AuthConfig, AuthError, LoginMethod};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

use crate::identity_store::IdentityStore;
use crate::password::verify_password;
use crate::signature::recover_address;
use crate::utils::token::{generate_nonce, hash_string};

const NONCE_KEY: &str = "nonce";
const ISSUED_AT_KEY: &str = "issued at";
const ADDRESS_KEY: &str = "address";
// Prune seen nonces once the cache grows past this
const NONCE_PRUNE_THRESHOLD: usize = 1024;

/// Fields extracted from a signed wallet message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedChallenge {
    pub address: Option<String>,
    pub nonce: String,
    pub issued_at: i64,
}

/// Build the message a wallet is asked to sign
pub fn build_challenge(domain: &str, address: &str, nonce: &str, issued_at: DateTime<Utc>) -> String {
    format!(
        "{} wants you to sign in with your wallet.\n\nAddress: {}\nNonce: {}\nIssued At: {}",
        domain,
        normalize_address(address),
        nonce,
        issued_at.timestamp()
    )
}

/// Pull nonce and timestamp out of a signed message. `Issued At` accepts
/// unix seconds or RFC 3339.
pub fn parse_challenge(message: &str) -> Option<SignedChallenge> {
    let mut address = None;
    let mut nonce = None;
    let mut issued_at = None;

    for line in message.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim().to_lowercase().as_str() {
            ADDRESS_KEY => address = Some(normalize_address(value)),
            NONCE_KEY if !value.is_empty() => nonce = Some(value.to_string()),
            ISSUED_AT_KEY | "timestamp" => {
                issued_at = value.parse::<i64>().ok().or_else(|| {
                    DateTime::parse_from_rfc3339(value).ok().map(|dt| dt.timestamp())
                })
            }
            _ => {}
        }
    }

    Some(SignedChallenge {
        address,
        nonce: nonce?,
        issued_at: issued_at?,
    })
}

/// Seen-nonce set bounded by the acceptance window
#[derive(Debug, Clone, Default)]
pub struct NonceCache {
    seen: Arc<DashMap<String, i64>>,
}

impl NonceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a nonce. Returns false if it was already used.
    pub fn record(&self, key: String, issued_at: i64, now: i64, window_secs: i64) -> bool {
        if self.seen.len() > NONCE_PRUNE_THRESHOLD {
            self.seen.retain(|_, ts| (now - *ts).abs() <= window_secs);
        }

        match self.seen.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(issued_at);
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

fn check_status(identity: &Identity) -> Result<(), AuthError> {
    match identity.status {
        UserStatus::Active => Ok(()),
        UserStatus::Pending => Err(AuthError::Unverified),
        UserStatus::Banned | UserStatus::Inactive => Err(AuthError::Disabled),
    }
}

#[derive(Clone)]
pub struct CredentialValidator {
    identities: Arc<dyn IdentityStore>,
    nonces: NonceCache,
    config: AuthConfig,
}

impl CredentialValidator {
    pub fn new(identities: Arc<dyn IdentityStore>, config: AuthConfig) -> Self {
        Self {
            identities,
            nonces: NonceCache::new(),
            config,
        }
    }

    /// Issue a fresh challenge for a wallet to sign
    pub fn challenge(&self, address: &str) -> Result<String, AuthError> {
        if !is_wallet_address(address) {
            return Err(AuthError::Validation("Invalid Ethereum address format".into()));
        }
        Ok(build_challenge(
            &self.config.challenge_domain,
            address,
            &generate_nonce(),
            Utc::now(),
        ))
    }

    /// Verify identifier + password. Account status is checked before the password.
    pub async fn validate_password(
        &self,
        identifier: &str,
        method: LoginMethod,
        password: &str,
    ) -> Result<Identity, AuthError> {
        let identity = match method {
            LoginMethod::Email => self.identities.find_by_email(identifier.trim()).await,
            LoginMethod::Username => self.identities.find_by_username(identifier.trim()).await,
            LoginMethod::Wallet => {
                return Err(AuthError::Validation(
                    "Signature and message required for wallet login".into(),
                ))
            }
        }
        .ok_or(AuthError::NotFound)?;

        check_status(&identity)?;

        let hash = self
            .identities
            .password_hash(identity.id)
            .await
            .ok_or(AuthError::BadCredential)?;
        let plain = password.to_string();
        let verified = web::block(move || verify_password(&hash, &plain))
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        if !verified {
            tracing::debug!("Password mismatch for identity {}", identity.id);
            return Err(AuthError::BadCredential);
        }
        Ok(identity)
    }

    /// Verify a wallet signature and resolve (or provision) the bound identity
    pub async fn validate_signature(
        &self,
        address: &str,
        message: &str,
        signature: &str,
    ) -> Result<Identity, AuthError> {
        if !is_wallet_address(address) {
            return Err(AuthError::Validation("Invalid Ethereum address format".into()));
        }
        let address = normalize_address(address);

        let existing = self.identities.find_by_wallet(&address).await;
        if let Some(identity) = &existing {
            check_status(identity)?;
        }

        let recovered = recover_address(message, signature)?;
        if recovered != address {
            tracing::warn!("Signature for {} recovered {}", address, recovered);
            return Err(AuthError::SignatureMismatch);
        }

        let challenge = parse_challenge(message).ok_or(AuthError::ReplayRejected)?;
        if matches!(&challenge.address, Some(bound) if *bound != address) {
            return Err(AuthError::SignatureMismatch);
        }

        let now = Utc::now().timestamp();
        let window = self.config.signature_window_secs;
        if (now - challenge.issued_at).abs() > window {
            tracing::debug!("Signed message for {} outside acceptance window", address);
            return Err(AuthError::ReplayRejected);
        }
        let key = hash_string(&format!("{}:{}", address, challenge.nonce));
        if !self.nonces.record(key, challenge.issued_at, now, window) {
            tracing::warn!("Replayed nonce for {}", address);
            return Err(AuthError::ReplayRejected);
        }

        let mut identity = match existing {
            Some(identity) => identity,
            None if self.config.wallet_auto_provision => self.provision(&address).await?,
            None => return Err(AuthError::NotFound),
        };

        if identity.wallet(&address).is_none() {
            identity.add_wallet(&address, &self.config.wallet_network);
        }
        if identity.verify_wallet(&address) {
            identity = self.identities.update(identity).await?;
            tracing::info!("Verified wallet {} for identity {}", address, identity.id);
        }
        Ok(identity)
    }

    /// First login from an unknown wallet creates a standard, active identity
    async fn provision(&self, address: &str) -> Result<Identity, AuthError> {
        let hex = &address[2..];
        for len in [8, 12, hex.len()] {
            let mut identity = Identity::new(format!("wallet_{}", &hex[..len]), None);
            identity.add_wallet(address, &self.config.wallet_network);

            match self.identities.insert(identity, None).await {
                Ok(identity) => {
                    tracing::info!("Provisioned identity {} for wallet {}", identity.id, address);
                    return Ok(identity);
                }
                Err(AuthError::Conflict(_)) => {
                    // A concurrent login may have bound the wallet first
                    if let Some(identity) = self.identities.find_by_wallet(address).await {
                        return Ok(identity);
                    }
                }
                Err(e) => return Err(e),
            }
        }
        Err(AuthError::Conflict("Could not allocate a username for wallet".into()))
    }
}
