// auth-server/src/identity_store.rs
use async_trait::async_trait;
use common::models::Identity;
use common::{normalize_address, AuthError};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Identity lookup and persistence used by the session core
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Option<Identity>;
    async fn find_by_username(&self, username: &str) -> Option<Identity>;
    async fn find_by_email(&self, email: &str) -> Option<Identity>;
    async fn find_by_wallet(&self, address: &str) -> Option<Identity>;
    /// Fails with `Conflict` if the username, email or a wallet is taken.
    /// The password hash is visible no later than the identity.
    async fn insert(&self, identity: Identity, password_hash: Option<String>) -> Result<Identity, AuthError>;
    async fn update(&self, identity: Identity) -> Result<Identity, AuthError>;
    async fn password_hash(&self, id: Uuid) -> Option<String>;
    async fn set_password_hash(&self, id: Uuid, hash: String) -> Result<(), AuthError>;
}

/// DashMap-backed store for development and tests
#[derive(Debug, Clone, Default)]
pub struct MemoryIdentityStore {
    users: Arc<DashMap<Uuid, Identity>>,
    // Secondary indexes, keys lower-cased
    usernames: Arc<DashMap<String, Uuid>>,
    emails: Arc<DashMap<String, Uuid>>,
    wallets: Arc<DashMap<String, Uuid>>,
    passwords: Arc<DashMap<Uuid, String>>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    fn lookup(&self, index: &DashMap<String, Uuid>, key: &str) -> Option<Identity> {
        let id = *index.get(&key.to_lowercase())?;
        self.users.get(&id).map(|entry| entry.value().clone())
    }

    fn claim(index: &DashMap<String, Uuid>, key: String, id: Uuid, what: &str) -> Result<(), AuthError> {
        match index.entry(key) {
            Entry::Occupied(entry) if *entry.get() != id => {
                Err(AuthError::Conflict(format!("{} already registered", what)))
            }
            Entry::Occupied(_) => Ok(()),
            Entry::Vacant(entry) => {
                entry.insert(id);
                Ok(())
            }
        }
    }

    /// Bind every wallet of `identity` to it, undoing partial work on conflict
    fn index_wallets(&self, identity: &Identity) -> Result<(), AuthError> {
        let mut claimed = Vec::new();
        for wallet in &identity.wallet_addresses {
            let key = normalize_address(&wallet.address);
            let fresh = !self.wallets.contains_key(&key);
            if let Err(e) = Self::claim(&self.wallets, key.clone(), identity.id, "Wallet address") {
                for key in claimed {
                    self.wallets.remove(&key);
                }
                return Err(e);
            }
            if fresh {
                claimed.push(key);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn find_by_id(&self, id: Uuid) -> Option<Identity> {
        self.users.get(&id).map(|entry| entry.value().clone())
    }

    async fn find_by_username(&self, username: &str) -> Option<Identity> {
        self.lookup(&self.usernames, username)
    }

    async fn find_by_email(&self, email: &str) -> Option<Identity> {
        self.lookup(&self.emails, email)
    }

    async fn find_by_wallet(&self, address: &str) -> Option<Identity> {
        self.lookup(&self.wallets, &normalize_address(address))
    }

    async fn insert(&self, identity: Identity, password_hash: Option<String>) -> Result<Identity, AuthError> {
        let username = identity.username.to_lowercase();
        Self::claim(&self.usernames, username.clone(), identity.id, "Username")?;

        if let Some(email) = identity.email.as_ref().map(|e| e.to_lowercase()) {
            if let Err(e) = Self::claim(&self.emails, email, identity.id, "Email") {
                self.usernames.remove(&username);
                return Err(e);
            }
        }

        if let Err(e) = self.index_wallets(&identity) {
            self.usernames.remove(&username);
            if let Some(email) = identity.email.as_ref() {
                self.emails.remove(&email.to_lowercase());
            }
            return Err(e);
        }

        if let Some(hash) = password_hash {
            self.passwords.insert(identity.id, hash);
        }
        self.users.insert(identity.id, identity.clone());
        tracing::debug!("Stored identity {} ({})", identity.id, identity.username);
        Ok(identity)
    }

    async fn update(&self, identity: Identity) -> Result<Identity, AuthError> {
        if !self.users.contains_key(&identity.id) {
            return Err(AuthError::NotFound);
        }
        self.index_wallets(&identity)?;
        self.users.insert(identity.id, identity.clone());
        Ok(identity)
    }

    async fn password_hash(&self, id: Uuid) -> Option<String> {
        self.passwords.get(&id).map(|entry| entry.value().clone())
    }

    async fn set_password_hash(&self, id: Uuid, hash: String) -> Result<(), AuthError> {
        if !self.users.contains_key(&id) {
            return Err(AuthError::NotFound);
        }
        self.passwords.insert(id, hash);
        Ok(())
    }
}
