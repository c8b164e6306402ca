// auth-server/src/issuer.rs
use chrono::{DateTime, Duration, Utc};
use common::models::{Identity, Role, TokenKind, TokenPair};
use common::{AuthConfig, AuthError};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT claims. Profile fields are only present on access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub typ: TokenKind,
    /// Session version the token was minted under
    pub ver: u64,
    pub jti: String,
    pub iat: usize,
    pub exp: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

impl Claims {
    pub fn identity_id(&self) -> Result<Uuid, AuthError> {
        Uuid::parse_str(&self.sub).map_err(|_| AuthError::Rejected)
    }
}

/// A freshly minted pair plus the bookkeeping the session store needs
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub pair: TokenPair,
    pub version: u64,
    pub access_jti: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &[u8], access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            config.secret_key.as_bytes(),
            Duration::minutes(config.access_token_ttl_minutes),
            Duration::days(config.refresh_token_ttl_days),
        )
    }

    /// Mint a pair bound to the identity and session version
    pub fn issue(&self, identity: &Identity, version: u64) -> Result<IssuedTokens, AuthError> {
        self.issue_at(identity, version, Utc::now())
    }

    pub fn issue_at(&self, identity: &Identity, version: u64, now: DateTime<Utc>) -> Result<IssuedTokens, AuthError> {
        let access_jti = Uuid::new_v4().to_string();
        let access_expires_at = now + self.access_ttl;
        let refresh_expires_at = now + self.refresh_ttl;

        let access = Claims {
            sub: identity.id.to_string(),
            typ: TokenKind::Access,
            ver: version,
            jti: access_jti.clone(),
            iat: now.timestamp() as usize,
            exp: access_expires_at.timestamp() as usize,
            username: Some(identity.username.clone()),
            email: identity.email.clone(),
            role: Some(identity.role),
        };
        let refresh = Claims {
            sub: identity.id.to_string(),
            typ: TokenKind::Refresh,
            ver: version,
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp() as usize,
            exp: refresh_expires_at.timestamp() as usize,
            username: None,
            email: None,
            role: None,
        };

        let pair = TokenPair::bearer(self.encode(&access)?, self.encode(&refresh)?, self.access_ttl.num_seconds());
        Ok(IssuedTokens {
            pair,
            version,
            access_jti,
            access_expires_at,
            refresh_expires_at,
        })
    }

    fn encode(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(&Header::default(), claims, &self.encoding).map_err(|e| AuthError::Internal(e.to_string()))
    }

    /// Verify signature, expiry and kind
    pub fn decode(&self, token: &str, kind: TokenKind) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            tracing::debug!("Token rejected: {}", e);
            AuthError::Rejected
        })?;
        if data.claims.typ != kind {
            return Err(AuthError::Rejected);
        }
        Ok(data.claims)
    }
}
