// session-client/src/controller.rs
use common::models::{Identity, PersistedSession, TokenPair};
use common::{AuthError, ClientConfig, LoginMethod, LoginRequest, RegisterRequest, WalletLoginRequest};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};

use crate::state::{transition, Attempt, Effect, Event, Phase, SessionState, Transition, TransitionError};
use crate::storage::{DurableStore, FileStore};
use crate::transport::{AuthApi, HttpAuthApi, SessionGrant};

/// How a registration ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterOutcome {
    Authenticated(Identity),
    VerificationRequired(Identity),
}

/// Owns the client session. State changes go through `transition`; network
/// calls run with the state lock released.
pub struct SessionController {
    api: Arc<dyn AuthApi>,
    storage: Arc<dyn DurableStore>,
    state: Mutex<SessionState>,
    updates: watch::Sender<SessionState>,
    nav_tx: mpsc::UnboundedSender<String>,
    nav_rx: Mutex<mpsc::UnboundedReceiver<String>>,
}

impl SessionController {
    pub fn new(api: Arc<dyn AuthApi>, storage: Arc<dyn DurableStore>) -> Self {
        let (updates, _) = watch::channel(SessionState::default());
        let (nav_tx, nav_rx) = mpsc::unbounded_channel();
        Self {
            api,
            storage,
            state: Mutex::new(SessionState::default()),
            updates,
            nav_tx,
            nav_rx: Mutex::new(nav_rx),
        }
    }

    /// HTTP transport and file storage from client configuration
    pub fn from_config(config: &ClientConfig) -> Result<Self, AuthError> {
        let api = HttpAuthApi::new(config)?;
        Ok(Self::new(
            Arc::new(api),
            Arc::new(FileStore::new(&config.storage_path)),
        ))
    }

    pub async fn state(&self) -> SessionState {
        self.state.lock().await.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.updates.subscribe()
    }

    /// Drain navigation intents emitted since the last call
    pub async fn take_navigations(&self) -> Vec<String> {
        let mut rx = self.nav_rx.lock().await;
        let mut paths = Vec::new();
        while let Ok(path) = rx.try_recv() {
            paths.push(path);
        }
        paths
    }

    async fn apply(&self, event: Event) -> Result<SessionState, TransitionError> {
        let mut state = self.state.lock().await;
        self.apply_locked(&mut state, event).await
    }

    async fn apply_locked(&self, state: &mut SessionState, event: Event) -> Result<SessionState, TransitionError> {
        let Transition { state: next, effects } = transition(state, event)?;
        *state = next;

        for effect in effects {
            self.run_effect(effect, state).await;
        }
        self.updates.send_replace(state.clone());
        Ok(state.clone())
    }

    async fn run_effect(&self, effect: Effect, state: &SessionState) {
        match effect {
            Effect::Persist => {
                let Some(tokens) = &state.tokens else { return };
                let session = PersistedSession::new(tokens, state.identity.as_ref());
                if let Err(e) = self.storage.save(&session).await {
                    tracing::warn!("Failed to persist session: {}", e);
                }
            }
            Effect::ClearDurable => {
                if let Err(e) = self.storage.clear().await {
                    tracing::warn!("Failed to clear stored session: {}", e);
                }
            }
            Effect::Navigate(path) => {
                let _ = self.nav_tx.send(path);
            }
        }
    }

    /// Apply a completion. A stale completion is dropped and reported as
    /// `Unauthenticated` because the session it belonged to is gone.
    async fn complete(&self, event: Event) -> Result<SessionState, AuthError> {
        self.apply(event).await.map_err(|e| {
            tracing::debug!("Discarded completion: {}", e);
            AuthError::from(e)
        })
    }

    /// Revoke tokens the session did not adopt, so a grant that lost to a
    /// logout does not stay live on the server
    async fn discard_grant(&self, tokens: &TokenPair) {
        if let Err(e) = self.api.logout(tokens).await {
            tracing::warn!("Failed to revoke discarded grant: {}", e);
        }
    }

    async fn authenticate(
        &self,
        attempt: Attempt,
        call: impl Future<Output = Result<SessionGrant, AuthError>>,
    ) -> Result<Identity, AuthError> {
        let epoch = self.apply(Event::Begin(attempt)).await?.epoch;

        match call.await {
            Ok(grant) => {
                let identity = grant.user.clone();
                let tokens = grant.tokens.clone();
                let adopted = self
                    .complete(Event::Succeeded {
                        epoch,
                        tokens: grant.tokens,
                        identity: grant.user,
                    })
                    .await;
                if let Err(e) = adopted {
                    self.discard_grant(&tokens).await;
                    return Err(e);
                }
                tracing::info!("Authenticated as {}", identity.username);
                Ok(identity)
            }
            Err(error) => {
                tracing::info!("Authentication failed: {}", error);
                let _ = self
                    .complete(Event::Failed {
                        epoch,
                        error: error.clone(),
                    })
                    .await;
                Err(error)
            }
        }
    }

    pub async fn login(
        &self,
        identifier: &str,
        password: &str,
        method: Option<LoginMethod>,
    ) -> Result<Identity, AuthError> {
        let request = LoginRequest {
            identifier: identifier.to_string(),
            password: Some(password.to_string()),
            signature: None,
            message: None,
            method,
        };
        self.authenticate(Attempt::Login, self.api.login(request)).await
    }

    pub async fn wallet_login(&self, address: &str, signature: &str, message: &str) -> Result<Identity, AuthError> {
        let request = WalletLoginRequest {
            wallet_address: address.to_string(),
            signature: signature.to_string(),
            message: message.to_string(),
        };
        self.authenticate(Attempt::WalletLogin, self.api.wallet_login(request)).await
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<RegisterOutcome, AuthError> {
        let epoch = self.apply(Event::Begin(Attempt::Register)).await?.epoch;

        match self.api.register(request).await {
            Ok(registered) => match registered.tokens {
                Some(tokens) => {
                    let adopted = self
                        .complete(Event::Succeeded {
                            epoch,
                            tokens: tokens.clone(),
                            identity: registered.user.clone(),
                        })
                        .await;
                    if let Err(e) = adopted {
                        self.discard_grant(&tokens).await;
                        return Err(e);
                    }
                    Ok(RegisterOutcome::Authenticated(registered.user))
                }
                None => {
                    self.complete(Event::VerificationPending { epoch }).await?;
                    Ok(RegisterOutcome::VerificationRequired(registered.user))
                }
            },
            Err(error) => {
                tracing::info!("Registration failed: {}", error);
                let _ = self
                    .complete(Event::Failed {
                        epoch,
                        error: error.clone(),
                    })
                    .await;
                Err(error)
            }
        }
    }

    /// Rotate the current refresh token
    pub async fn refresh(&self) -> Result<TokenPair, AuthError> {
        let state = self.apply(Event::AccessRejected).await?;
        self.rotate(state).await
    }

    async fn rotate(&self, state: SessionState) -> Result<TokenPair, AuthError> {
        let epoch = state.epoch;
        let refresh_token = state
            .tokens
            .map(|tokens| tokens.refresh_token)
            .ok_or(AuthError::Unauthenticated)?;

        match self.api.refresh(&refresh_token).await {
            Ok(grant) => {
                let tokens = grant.tokens.clone();
                let adopted = self
                    .complete(Event::Refreshed {
                        epoch,
                        tokens: grant.tokens,
                        identity: grant.user,
                    })
                    .await;
                if let Err(e) = adopted {
                    self.discard_grant(&tokens).await;
                    return Err(e);
                }
                tracing::debug!("Session refreshed");
                Ok(tokens)
            }
            Err(error) => {
                tracing::warn!("Refresh failed: {}", error);
                let _ = self
                    .complete(Event::RefreshFailed {
                        epoch,
                        error: error.clone(),
                    })
                    .await;
                Err(error)
            }
        }
    }

    /// Resume from durable storage. Stored tokens are always rotated before use.
    pub async fn restore(&self) -> SessionState {
        let persisted = match self.storage.load().await {
            Ok(Some(persisted)) => persisted,
            Ok(None) => return self.state().await,
            Err(e) => {
                tracing::warn!("Could not read stored session: {}", e);
                return self.state().await;
            }
        };

        let tokens = TokenPair::bearer(persisted.access_token, persisted.refresh_token, 0);
        let restored = self
            .apply(Event::Restore {
                tokens,
                identity: persisted.user_data,
            })
            .await;

        match restored {
            Ok(state) => {
                if let Err(e) = self.rotate(state).await {
                    tracing::info!("Stored session not resumed: {}", e);
                }
            }
            Err(e) => tracing::debug!("Restore skipped: {}", e),
        }
        self.state().await
    }

    /// Local session is dropped first. The server call is best effort.
    pub async fn logout(&self) {
        let tokens = {
            let mut state = self.state.lock().await;
            let tokens = state.tokens.clone();
            // Logout is valid from every state
            let _ = self.apply_locked(&mut state, Event::Logout).await;
            tokens
        };

        if let Some(tokens) = tokens {
            if let Err(e) = self.api.logout(&tokens).await {
                tracing::warn!("Server logout failed: {}", e);
            }
        }
    }

    /// Wait out any in-flight transition and return the usable tokens
    async fn ready_tokens(&self) -> Result<TokenPair, AuthError> {
        let mut updates = self.subscribe();
        loop {
            let state = self.state().await;
            if !state.is_loading() {
                return match (state.phase, state.tokens) {
                    (Phase::Authenticated, Some(tokens)) => Ok(tokens),
                    _ => Err(AuthError::Unauthenticated),
                };
            }
            updates
                .changed()
                .await
                .map_err(|_| AuthError::Internal("session controller dropped".into()))?;
        }
    }

    /// Refresh, or wait for the refresh already in flight
    async fn refresh_or_join(&self) -> Result<TokenPair, AuthError> {
        match self.refresh().await {
            Err(AuthError::Busy) => self.ready_tokens().await,
            other => other,
        }
    }

    /// Run an authenticated call. On `Unauthenticated` the session is
    /// refreshed and the call replayed exactly once.
    pub async fn with_access<T, F, Fut>(&self, call: F) -> Result<T, AuthError>
    where
        F: Fn(TokenPair) -> Fut,
        Fut: Future<Output = Result<T, AuthError>>,
    {
        let (used, refreshed) = match self.ready_tokens().await {
            Ok(tokens) => (tokens, false),
            Err(AuthError::Unauthenticated) => {
                let state = self.state().await;
                // Tokens kept through a network failure get their one refresh up front
                if state.phase != Phase::Failed || state.tokens.is_none() {
                    return Err(AuthError::Unauthenticated);
                }
                (self.refresh_or_join().await?, true)
            }
            Err(e) => return Err(e),
        };
        match call(used.clone()).await {
            Err(AuthError::Unauthenticated) if !refreshed => {}
            other => return other,
        }

        let current = self.state().await;
        let tokens = if current.is_authenticated() && current.tokens.as_ref() != Some(&used) {
            // Someone else already rotated
            self.ready_tokens().await?
        } else {
            self.refresh_or_join().await?
        };
        call(tokens).await
    }

    /// Identity the server associates with the session
    pub async fn current_user(&self) -> Result<Identity, AuthError> {
        let api = self.api.clone();
        self.with_access(move |tokens| {
            let api = api.clone();
            async move { api.me(&tokens).await }
        })
        .await
    }
}
