// common/src/models/session.rs
use serde::{Deserialize, Serialize};

use super::identity::Identity;
use super::token::TokenPair;

/// Session material a client keeps across restarts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSession {
    pub access_token: String,
    pub refresh_token: String,
    pub user_data: Option<Identity>,
}

impl PersistedSession {
    pub fn new(tokens: &TokenPair, user: Option<&Identity>) -> Self {
        Self {
            access_token: tokens.access_token.clone(),
            refresh_token: tokens.refresh_token.clone(),
            user_data: user.cloned(),
        }
    }
}
