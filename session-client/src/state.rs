// session-client/src/state.rs
//! Session state machine. `transition` is pure: it returns the next state and
//! the side effects the controller must carry out.
use common::models::{Identity, Role, TokenPair};
use common::AuthError;
use thiserror::Error;

use crate::guard::{DASHBOARD_PATH, LOGIN_PATH};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Anonymous,
    Authenticating,
    Authenticated,
    Refreshing,
    Failed,
}

/// Which credential flow started an authentication attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    Login,
    WalletLogin,
    Register,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub phase: Phase,
    pub identity: Option<Identity>,
    pub tokens: Option<TokenPair>,
    pub attempt: Option<Attempt>,
    pub last_error: Option<AuthError>,
    /// Bumped whenever an attempt starts or the session is dropped. Completions
    /// tagged with an older epoch are discarded.
    pub epoch: u64,
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        self.phase == Phase::Authenticated && self.tokens.is_some()
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.phase, Phase::Authenticating | Phase::Refreshing)
    }

    pub fn role(&self) -> Option<Role> {
        self.identity.as_ref().map(|identity| identity.role)
    }

    fn cleared(&self, phase: Phase) -> Self {
        Self {
            phase,
            epoch: self.epoch,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Begin(Attempt),
    Succeeded {
        epoch: u64,
        tokens: TokenPair,
        identity: Identity,
    },
    Failed {
        epoch: u64,
        error: AuthError,
    },
    /// Registration accepted but the account awaits verification
    VerificationPending {
        epoch: u64,
    },
    /// Access token refused; start a rotation
    AccessRejected,
    /// Durable tokens found at startup
    Restore {
        tokens: TokenPair,
        identity: Option<Identity>,
    },
    Refreshed {
        epoch: u64,
        tokens: TokenPair,
        identity: Identity,
    },
    RefreshFailed {
        epoch: u64,
        error: AuthError,
    },
    Logout,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Persist,
    ClearDurable,
    Navigate(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub state: SessionState,
    pub effects: Vec<Effect>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("another authentication request is already in progress")]
    Busy,
    #[error("completion belongs to a superseded attempt")]
    Stale,
    #[error("no session to refresh")]
    NoSession,
}

impl From<TransitionError> for AuthError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::Busy => AuthError::Busy,
            TransitionError::Stale | TransitionError::NoSession => AuthError::Unauthenticated,
        }
    }
}

fn navigate(path: &str) -> Effect {
    Effect::Navigate(path.to_string())
}

fn check_completion(state: &SessionState, epoch: u64, phase: Phase) -> Result<(), TransitionError> {
    if state.epoch != epoch || state.phase != phase {
        return Err(TransitionError::Stale);
    }
    Ok(())
}

pub fn transition(state: &SessionState, event: Event) -> Result<Transition, TransitionError> {
    let (next, effects) = match event {
        Event::Begin(attempt) => {
            if state.is_loading() {
                return Err(TransitionError::Busy);
            }
            let next = SessionState {
                phase: Phase::Authenticating,
                attempt: Some(attempt),
                epoch: state.epoch + 1,
                ..SessionState::default()
            };
            (next, vec![])
        }

        Event::Succeeded { epoch, tokens, identity } => {
            check_completion(state, epoch, Phase::Authenticating)?;
            let next = SessionState {
                phase: Phase::Authenticated,
                identity: Some(identity),
                tokens: Some(tokens),
                attempt: None,
                last_error: None,
                epoch,
            };
            (next, vec![Effect::Persist, navigate(DASHBOARD_PATH)])
        }

        Event::Failed { epoch, error } => {
            check_completion(state, epoch, Phase::Authenticating)?;
            let mut next = state.cleared(Phase::Failed);
            next.last_error = Some(error);
            (next, vec![Effect::ClearDurable])
        }

        Event::VerificationPending { epoch } => {
            check_completion(state, epoch, Phase::Authenticating)?;
            (state.cleared(Phase::Anonymous), vec![navigate(LOGIN_PATH)])
        }

        Event::AccessRejected => {
            if state.is_loading() {
                return Err(TransitionError::Busy);
            }
            // A failed phase keeps its tokens after a network error, so it may retry
            if state.tokens.is_none() || state.phase == Phase::Anonymous {
                return Err(TransitionError::NoSession);
            }
            let next = SessionState {
                phase: Phase::Refreshing,
                last_error: None,
                epoch: state.epoch + 1,
                ..state.clone()
            };
            (next, vec![])
        }

        Event::Restore { tokens, identity } => {
            if state.is_loading() {
                return Err(TransitionError::Busy);
            }
            let next = SessionState {
                phase: Phase::Refreshing,
                identity,
                tokens: Some(tokens),
                attempt: None,
                last_error: None,
                epoch: state.epoch + 1,
            };
            (next, vec![])
        }

        Event::Refreshed { epoch, tokens, identity } => {
            check_completion(state, epoch, Phase::Refreshing)?;
            let next = SessionState {
                phase: Phase::Authenticated,
                identity: Some(identity),
                tokens: Some(tokens),
                attempt: None,
                last_error: None,
                epoch,
            };
            (next, vec![Effect::Persist])
        }

        Event::RefreshFailed { epoch, error } => {
            check_completion(state, epoch, Phase::Refreshing)?;
            if matches!(error, AuthError::NetworkFailure(_)) {
                // Server unreachable: the tokens may still be good
                let next = SessionState {
                    phase: Phase::Failed,
                    last_error: Some(error),
                    ..state.clone()
                };
                (next, vec![])
            } else {
                let mut next = state.cleared(Phase::Anonymous);
                next.last_error = Some(error);
                (next, vec![Effect::ClearDurable, navigate(LOGIN_PATH)])
            }
        }

        Event::Logout => {
            let next = SessionState {
                epoch: state.epoch + 1,
                ..SessionState::default()
            };
            (next, vec![Effect::ClearDurable, navigate(LOGIN_PATH)])
        }
    };

    Ok(Transition { state: next, effects })
}
