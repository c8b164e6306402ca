// auth-server/src/session_registry.rs
use actix::{Actor, AsyncContext, Context, Handler, Message, MessageResult};
use chrono::Utc;
use common::models::{Identity, TokenPair};
use common::AuthError;
use std::time::Duration;
use uuid::Uuid;

use crate::issuer::TokenIssuer;
use crate::store::{SessionStore, StoredSession};

// Purge expired sessions every hour by default
const DEFAULT_CLEANUP_INTERVAL: u64 = 3600;

/// Actor message: issue a new pair, superseding any current session
#[derive(Message)]
#[rtype(result = "Result<TokenPair, AuthError>")]
pub struct OpenSession {
    pub identity: Identity,
}

/// Actor message: exchange the live refresh token for a new pair
#[derive(Message)]
#[rtype(result = "Result<TokenPair, AuthError>")]
pub struct RotateSession {
    pub identity: Identity,
    pub refresh_token: String,
}

/// Actor message: current pair of an identity
#[derive(Message)]
#[rtype(result = "Option<TokenPair>")]
pub struct GetSession {
    pub identity_id: Uuid,
}

/// Actor message: revoke the session of an identity
#[derive(Message)]
#[rtype(result = "bool")]
pub struct ClearSession {
    pub identity_id: Uuid,
}

/// Actor message: revoke the session `refresh_token` belongs to, if it is still live
#[derive(Message)]
#[rtype(result = "bool")]
pub struct RevokeSession {
    pub identity_id: Uuid,
    pub refresh_token: String,
}

/// Actor message: is this access token from the current session
#[derive(Message)]
#[rtype(result = "bool")]
pub struct VerifyAccess {
    pub identity_id: Uuid,
    pub jti: String,
    pub version: u64,
}

/// Actor message: purge sessions with expired refresh tokens
#[derive(Message)]
#[rtype(result = "usize")]
pub struct CleanupExpiredSessions;

/// Actor message: get session metrics
#[derive(Message)]
#[rtype(result = "SessionMetrics")]
pub struct GetSessionMetrics;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionMetrics {
    pub active_sessions: usize,
    pub opened: u64,
    pub rotated: u64,
    pub rejected_rotations: u64,
    pub revoked: u64,
    pub expired: u64,
}

/// Single writer over the session store. Issuance, rotation and revocation
/// are handled one message at a time, so rotation is a true compare-and-swap.
pub struct SessionRegistryActor {
    store: SessionStore,
    issuer: TokenIssuer,
    cleanup_interval: Option<u64>,
    metrics: SessionMetrics,
}

impl SessionRegistryActor {
    pub fn new(issuer: TokenIssuer) -> Self {
        Self {
            store: SessionStore::new(),
            issuer,
            cleanup_interval: Some(DEFAULT_CLEANUP_INTERVAL),
            metrics: SessionMetrics::default(),
        }
    }

    /// Zero disables the periodic purge
    pub fn with_cleanup_interval(mut self, interval_seconds: u64) -> Self {
        self.cleanup_interval = (interval_seconds > 0).then_some(interval_seconds);
        self
    }

    fn cleanup_sessions(&mut self) -> usize {
        let purged = self.store.purge_expired(Utc::now());
        self.metrics.expired += purged as u64;
        purged
    }
}

impl Actor for SessionRegistryActor {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        let Some(interval) = self.cleanup_interval else {
            tracing::info!("SessionRegistryActor started, periodic cleanup disabled");
            return;
        };
        // A registry first polled while its runtime shuts down has no timer to arm
        if tokio::runtime::Handle::try_current().is_err() {
            tracing::debug!("SessionRegistryActor started outside a runtime, cleanup not scheduled");
            return;
        }
        tracing::info!("SessionRegistryActor started, cleanup every {}s", interval);

        ctx.run_interval(Duration::from_secs(interval), |_act, ctx| {
            ctx.notify(CleanupExpiredSessions);
        });
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!(
            "SessionRegistryActor stopped. {} opened, {} rotated, {} revoked during lifetime",
            self.metrics.opened,
            self.metrics.rotated,
            self.metrics.revoked
        );
    }
}

impl Handler<OpenSession> for SessionRegistryActor {
    type Result = MessageResult<OpenSession>;

    fn handle(&mut self, msg: OpenSession, _ctx: &mut Self::Context) -> Self::Result {
        let identity_id = msg.identity.id;
        let version = self.store.next_version(identity_id);

        let result = self.issuer.issue(&msg.identity, version).map(|issued| {
            let pair = issued.pair.clone();
            self.store.put(identity_id, StoredSession::from(issued));
            pair
        });

        if result.is_ok() {
            self.metrics.opened += 1;
            tracing::info!("Opened session v{} for identity {}", version, identity_id);
        }
        MessageResult(result)
    }
}

impl Handler<RotateSession> for SessionRegistryActor {
    type Result = MessageResult<RotateSession>;

    fn handle(&mut self, msg: RotateSession, _ctx: &mut Self::Context) -> Self::Result {
        let identity_id = msg.identity.id;
        let issuer = &self.issuer;

        let result = self
            .store
            .compare_and_swap(identity_id, &msg.refresh_token, Utc::now(), |version| {
                issuer.issue(&msg.identity, version).map(StoredSession::from)
            })
            .map(|session| session.pair);

        match &result {
            Ok(_) => {
                self.metrics.rotated += 1;
                tracing::info!("Rotated session for identity {}", identity_id);
            }
            Err(e) => {
                self.metrics.rejected_rotations += 1;
                tracing::warn!("Rotation rejected for identity {}: {}", identity_id, e);
            }
        }
        MessageResult(result)
    }
}

impl Handler<GetSession> for SessionRegistryActor {
    type Result = MessageResult<GetSession>;

    fn handle(&mut self, msg: GetSession, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.store.get(msg.identity_id))
    }
}

impl Handler<ClearSession> for SessionRegistryActor {
    type Result = MessageResult<ClearSession>;

    fn handle(&mut self, msg: ClearSession, _ctx: &mut Self::Context) -> Self::Result {
        let removed = self.store.clear(msg.identity_id);
        if removed {
            self.metrics.revoked += 1;
            tracing::info!("Revoked session for identity {}", msg.identity_id);
        }
        MessageResult(removed)
    }
}

impl Handler<RevokeSession> for SessionRegistryActor {
    type Result = MessageResult<RevokeSession>;

    fn handle(&mut self, msg: RevokeSession, _ctx: &mut Self::Context) -> Self::Result {
        let removed = self.store.revoke(msg.identity_id, &msg.refresh_token);
        if removed {
            self.metrics.revoked += 1;
            tracing::info!("Revoked session for identity {} by refresh token", msg.identity_id);
        }
        MessageResult(removed)
    }
}

impl Handler<VerifyAccess> for SessionRegistryActor {
    type Result = MessageResult<VerifyAccess>;

    fn handle(&mut self, msg: VerifyAccess, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.store.verify_access(msg.identity_id, &msg.jti, msg.version))
    }
}

impl Handler<CleanupExpiredSessions> for SessionRegistryActor {
    type Result = MessageResult<CleanupExpiredSessions>;

    fn handle(&mut self, _msg: CleanupExpiredSessions, _ctx: &mut Self::Context) -> Self::Result {
        let expired_count = self.cleanup_sessions();
        if expired_count > 0 {
            tracing::info!("Cleaned up {} expired sessions", expired_count);
        }
        MessageResult(expired_count)
    }
}

impl Handler<GetSessionMetrics> for SessionRegistryActor {
    type Result = MessageResult<GetSessionMetrics>;

    fn handle(&mut self, _msg: GetSessionMetrics, _ctx: &mut Self::Context) -> Self::Result {
        let mut metrics = self.metrics.clone();
        metrics.active_sessions = self.store.active_count();
        MessageResult(metrics)
    }
}
