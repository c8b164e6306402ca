// auth-server/src/service.rs
use actix::Addr;
use actix_web::web;
use common::models::{Identity, TokenKind, TokenPair, UserStatus};
use common::{
    AuthConfig, AuthError, ChangePasswordRequest, LoginMethod, LoginRequest, RegisterRequest,
    WalletLoginRequest,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::credentials::CredentialValidator;
use crate::identity_store::IdentityStore;
use crate::issuer::TokenIssuer;
use crate::password::{hash_password, validate_password_strength, verify_password};
use crate::session_registry::{
    ClearSession, OpenSession, RevokeSession, RotateSession, SessionRegistryActor, VerifyAccess,
};
use crate::validation::validate_registration;

/// Outcome of a registration. `tokens` is `None` while email verification is pending.
#[derive(Debug, Clone)]
pub struct Registration {
    pub identity: Identity,
    pub tokens: Option<TokenPair>,
}

/// Orchestrates credential checks, issuance and revocation
#[derive(Clone)]
pub struct AuthService {
    identities: Arc<dyn IdentityStore>,
    validator: CredentialValidator,
    issuer: TokenIssuer,
    registry: Addr<SessionRegistryActor>,
    config: AuthConfig,
}

fn mailbox(err: actix::MailboxError) -> AuthError {
    tracing::error!("Session registry unavailable: {}", err);
    AuthError::Internal("session registry unavailable".into())
}

impl AuthService {
    pub fn new(
        identities: Arc<dyn IdentityStore>,
        issuer: TokenIssuer,
        registry: Addr<SessionRegistryActor>,
        config: AuthConfig,
    ) -> Self {
        Self {
            validator: CredentialValidator::new(identities.clone(), config.clone()),
            identities,
            issuer,
            registry,
            config,
        }
    }

    pub fn identities(&self) -> &Arc<dyn IdentityStore> {
        &self.identities
    }

    pub fn challenge(&self, address: &str) -> Result<String, AuthError> {
        self.validator.challenge(address)
    }

    /// Password or wallet login, depending on the resolved method
    pub async fn login(&self, req: LoginRequest) -> Result<(TokenPair, Identity), AuthError> {
        let identity = match req.resolved_method() {
            LoginMethod::Wallet => {
                let (Some(signature), Some(message)) = (req.signature.as_deref(), req.message.as_deref()) else {
                    return Err(AuthError::Validation(
                        "Signature and message required for wallet login".into(),
                    ));
                };
                self.validator
                    .validate_signature(&req.identifier, message, signature)
                    .await?
            }
            method => {
                let password = req
                    .password
                    .as_deref()
                    .ok_or_else(|| AuthError::Validation("Password required".into()))?;
                self.validator
                    .validate_password(&req.identifier, method, password)
                    .await?
            }
        };

        self.open_session(identity).await
    }

    pub async fn wallet_login(&self, req: WalletLoginRequest) -> Result<(TokenPair, Identity), AuthError> {
        let identity = self
            .validator
            .validate_signature(&req.wallet_address, &req.message, &req.signature)
            .await?;
        self.open_session(identity).await
    }

    pub async fn register(&self, req: RegisterRequest) -> Result<Registration, AuthError> {
        validate_registration(&req, self.config.password_min_length)?;

        let mut identity = Identity::new(req.username.trim(), Some(req.email.trim().to_lowercase()));
        identity.profile.first_name = req.first_name.clone();
        identity.profile.last_name = req.last_name.clone();
        if let Some(wallet) = &req.wallet_address {
            identity.add_wallet(wallet, &self.config.wallet_network);
        }
        if self.config.require_email_verification {
            identity.status = UserStatus::Pending;
        }

        let password = req.password.clone();
        let hash = web::block(move || hash_password(&password))
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))??;
        let identity = self.identities.insert(identity, Some(hash)).await?;
        tracing::info!("Registered identity {} ({})", identity.id, identity.username);

        if identity.status == UserStatus::Pending {
            return Ok(Registration { identity, tokens: None });
        }

        let (tokens, identity) = self.open_session(identity).await?;
        Ok(Registration {
            identity,
            tokens: Some(tokens),
        })
    }

    /// Exchange a refresh token for a new pair. The presented token is spent.
    pub async fn refresh(&self, refresh_token: &str) -> Result<(TokenPair, Identity), AuthError> {
        let claims = self.issuer.decode(refresh_token, TokenKind::Refresh)?;
        let identity = self
            .identities
            .find_by_id(claims.identity_id()?)
            .await
            .ok_or(AuthError::Rejected)?;

        if identity.status != UserStatus::Active {
            self.registry
                .send(ClearSession { identity_id: identity.id })
                .await
                .map_err(mailbox)?;
            return Err(if identity.status == UserStatus::Pending {
                AuthError::Unverified
            } else {
                AuthError::Disabled
            });
        }

        let tokens = self
            .registry
            .send(RotateSession {
                identity: identity.clone(),
                refresh_token: refresh_token.to_string(),
            })
            .await
            .map_err(mailbox)??;
        Ok((tokens, identity))
    }

    /// Resolve the identity behind a bearer access token
    pub async fn authenticate(&self, access_token: &str) -> Result<Identity, AuthError> {
        let claims = self
            .issuer
            .decode(access_token, TokenKind::Access)
            .map_err(|_| AuthError::Unauthenticated)?;
        let identity_id = claims.identity_id().map_err(|_| AuthError::Unauthenticated)?;

        let live = self
            .registry
            .send(VerifyAccess {
                identity_id,
                jti: claims.jti,
                version: claims.ver,
            })
            .await
            .map_err(mailbox)?;
        if !live {
            return Err(AuthError::Unauthenticated);
        }

        let identity = self
            .identities
            .find_by_id(identity_id)
            .await
            .ok_or(AuthError::Unauthenticated)?;
        if identity.status.is_disabled() {
            return Err(AuthError::Disabled);
        }
        Ok(identity)
    }

    /// Invalidate the server-side session. Idempotent.
    pub async fn logout(&self, identity_id: Uuid) -> Result<bool, AuthError> {
        self.registry
            .send(ClearSession { identity_id })
            .await
            .map_err(mailbox)
    }

    /// Revoke the session a refresh token belongs to. Works without a live
    /// access token; a superseded or unknown token is `Rejected`.
    pub async fn revoke(&self, refresh_token: &str) -> Result<(), AuthError> {
        let claims = self.issuer.decode(refresh_token, TokenKind::Refresh)?;
        let revoked = self
            .registry
            .send(RevokeSession {
                identity_id: claims.identity_id()?,
                refresh_token: refresh_token.to_string(),
            })
            .await
            .map_err(mailbox)?;
        if revoked {
            Ok(())
        } else {
            Err(AuthError::Rejected)
        }
    }

    /// Replace the password and revoke the current session
    pub async fn change_password(&self, identity: &Identity, req: ChangePasswordRequest) -> Result<(), AuthError> {
        validate_password_strength(&req.new_password, self.config.password_min_length)?;
        if req.new_password != req.confirm_password {
            return Err(AuthError::Validation("Passwords do not match".into()));
        }

        let stored = self
            .identities
            .password_hash(identity.id)
            .await
            .ok_or(AuthError::BadCredential)?;
        let current = req.current_password.clone();
        let verified = web::block(move || verify_password(&stored, &current))
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?;
        if !verified {
            return Err(AuthError::BadCredential);
        }

        let new_password = req.new_password.clone();
        let hash = web::block(move || hash_password(&new_password))
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))??;
        self.identities.set_password_hash(identity.id, hash).await?;
        self.logout(identity.id).await?;

        tracing::info!("Password changed for identity {}", identity.id);
        Ok(())
    }

    async fn open_session(&self, mut identity: Identity) -> Result<(TokenPair, Identity), AuthError> {
        identity.record_login();
        let identity = self.identities.update(identity).await?;

        let tokens = self
            .registry
            .send(OpenSession {
                identity: identity.clone(),
            })
            .await
            .map_err(mailbox)??;
        Ok((tokens, identity))
    }
}
