// common/src/models/identity.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::utils::normalize_address;

/// Default blockchain network tag for bound wallets
pub const DEFAULT_NETWORK: &str = "ethereum";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    User,
    Admin,
    Moderator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserStatus {
    Active,
    Inactive,
    Banned,
    Pending,
}

impl UserStatus {
    /// Banned and inactive accounts never receive tokens.
    pub fn is_disabled(&self) -> bool {
        matches!(self, UserStatus::Banned | UserStatus::Inactive)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// A blockchain address bound to an identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletAddress {
    pub address: String,
    pub network: String,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
}

impl WalletAddress {
    pub fn new(address: &str, network: &str) -> Self {
        Self {
            address: normalize_address(address),
            network: network.to_string(),
            is_verified: false,
            created_at: Utc::now(),
        }
    }
}

/// User record as seen by the session core
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: Uuid,
    pub username: String,
    pub email: Option<String>,
    pub role: Role,
    pub status: UserStatus,
    #[serde(default)]
    pub profile: UserProfile,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default)]
    pub wallet_addresses: Vec<WalletAddress>,
    pub primary_wallet: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
    #[serde(default)]
    pub login_count: u64,
}

impl Identity {
    /// Create a new standard, active identity
    pub fn new(username: impl Into<String>, email: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            email,
            role: Role::User,
            status: UserStatus::Active,
            profile: UserProfile::default(),
            is_verified: false,
            wallet_addresses: Vec::new(),
            primary_wallet: None,
            created_at: Utc::now(),
            last_login: None,
            login_count: 0,
        }
    }

    /// Bind a wallet. Returns false if the address is already bound.
    /// The first bound wallet becomes primary.
    pub fn add_wallet(&mut self, address: &str, network: &str) -> bool {
        let address = normalize_address(address);
        if self.wallet(&address).is_some() {
            return false;
        }

        self.wallet_addresses.push(WalletAddress::new(&address, network));
        if self.primary_wallet.is_none() {
            self.primary_wallet = Some(address);
        }
        true
    }

    pub fn wallet(&self, address: &str) -> Option<&WalletAddress> {
        let address = normalize_address(address);
        self.wallet_addresses.iter().find(|w| w.address == address)
    }

    /// Mark a bound wallet verified. Verification never reverts.
    /// Returns true if the flag changed.
    pub fn verify_wallet(&mut self, address: &str) -> bool {
        let address = normalize_address(address);
        match self.wallet_addresses.iter_mut().find(|w| w.address == address) {
            Some(wallet) if !wallet.is_verified => {
                wallet.is_verified = true;
                true
            }
            _ => false,
        }
    }

    /// Record a successful login
    pub fn record_login(&mut self) {
        self.login_count += 1;
        self.last_login = Some(Utc::now());
    }
}
