// auth-server/src/store.rs
use chrono::{DateTime, Utc};
use common::models::TokenPair;
use common::AuthError;
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::issuer::IssuedTokens;

/// Current session of one identity
#[derive(Debug, Clone)]
pub struct StoredSession {
    pub version: u64,
    pub pair: TokenPair,
    pub access_jti: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
    pub issued_at: DateTime<Utc>,
}

impl From<IssuedTokens> for StoredSession {
    fn from(issued: IssuedTokens) -> Self {
        Self {
            version: issued.version,
            pair: issued.pair,
            access_jti: issued.access_jti,
            access_expires_at: issued.access_expires_at,
            refresh_expires_at: issued.refresh_expires_at,
            issued_at: Utc::now(),
        }
    }
}

// The version outlives the session so tokens from a cleared session never match again
#[derive(Debug, Default)]
struct SessionSlot {
    version: u64,
    session: Option<StoredSession>,
}

/// Per-identity session storage. Every method is a single read-modify-write
/// under the identity's shard lock.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    slots: Arc<DashMap<Uuid, SessionSlot>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the next session version for an identity
    pub fn next_version(&self, identity_id: Uuid) -> u64 {
        let mut slot = self.slots.entry(identity_id).or_default();
        slot.version += 1;
        slot.version
    }

    /// Last write wins; any prior session is discarded
    pub fn put(&self, identity_id: Uuid, session: StoredSession) {
        let mut slot = self.slots.entry(identity_id).or_default();
        slot.version = slot.version.max(session.version);
        slot.session = Some(session);
    }

    pub fn get(&self, identity_id: Uuid) -> Option<TokenPair> {
        self.session(identity_id).map(|s| s.pair)
    }

    pub fn session(&self, identity_id: Uuid) -> Option<StoredSession> {
        self.slots.get(&identity_id).and_then(|slot| slot.session.clone())
    }

    /// Idempotent. Returns true if a session was removed.
    pub fn clear(&self, identity_id: Uuid) -> bool {
        match self.slots.get_mut(&identity_id) {
            Some(mut slot) => {
                slot.version += 1;
                slot.session.take().is_some()
            }
            None => false,
        }
    }

    /// Clear the session only if `presented` is its live refresh token
    pub fn revoke(&self, identity_id: Uuid, presented: &str) -> bool {
        let Some(mut slot) = self.slots.get_mut(&identity_id) else {
            return false;
        };
        if !matches!(&slot.session, Some(s) if s.pair.refresh_token == presented) {
            return false;
        }
        slot.version += 1;
        slot.session = None;
        true
    }

    /// Replace the session only if `presented` is its live refresh token.
    /// `mint` receives the next version and runs while the slot is locked.
    pub fn compare_and_swap<F>(
        &self,
        identity_id: Uuid,
        presented: &str,
        now: DateTime<Utc>,
        mint: F,
    ) -> Result<StoredSession, AuthError>
    where
        F: FnOnce(u64) -> Result<StoredSession, AuthError>,
    {
        let mut slot = self.slots.get_mut(&identity_id).ok_or(AuthError::Rejected)?;

        let current = slot.session.as_ref().ok_or(AuthError::Rejected)?;
        if current.pair.refresh_token != presented || current.refresh_expires_at <= now {
            return Err(AuthError::Rejected);
        }

        let version = slot.version + 1;
        let replacement = mint(version)?;
        slot.version = version;
        slot.session = Some(replacement.clone());
        Ok(replacement)
    }

    /// An access token is live only if it belongs to the current session
    pub fn verify_access(&self, identity_id: Uuid, jti: &str, version: u64) -> bool {
        self.slots
            .get(&identity_id)
            .and_then(|slot| {
                slot.session
                    .as_ref()
                    .map(|s| s.version == version && s.access_jti == jti)
            })
            .unwrap_or(false)
    }

    /// Drop sessions whose refresh token has expired. Returns the count removed.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut purged = 0;
        for mut slot in self.slots.iter_mut() {
            if matches!(&slot.session, Some(s) if s.refresh_expires_at <= now) {
                slot.session = None;
                slot.version += 1;
                purged += 1;
            }
        }
        purged
    }

    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.session.is_some()).count()
    }
}
