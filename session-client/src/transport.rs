// session-client/src/transport.rs
use async_trait::async_trait;
use common::models::{Identity, TokenPair};
use common::{
    AuthError, AuthResponse, ClientConfig, LoginRequest, RefreshTokenRequest, RegisterRequest,
    WalletLoginRequest,
};
use reqwest::{Client, RequestBuilder, StatusCode};
use std::time::Duration;

/// Tokens plus the identity they were issued to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionGrant {
    pub tokens: TokenPair,
    pub user: Identity,
}

/// Result of a registration call. `tokens` is absent while verification is pending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registered {
    pub tokens: Option<TokenPair>,
    pub user: Identity,
}

/// Calls the auth service. Implementations map a 401 to `Unauthenticated`
/// and unreachable servers to `NetworkFailure`.
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, request: LoginRequest) -> Result<SessionGrant, AuthError>;
    async fn wallet_login(&self, request: WalletLoginRequest) -> Result<SessionGrant, AuthError>;
    async fn register(&self, request: RegisterRequest) -> Result<Registered, AuthError>;
    async fn refresh(&self, refresh_token: &str) -> Result<SessionGrant, AuthError>;
    async fn logout(&self, tokens: &TokenPair) -> Result<(), AuthError>;
    async fn me(&self, tokens: &TokenPair) -> Result<Identity, AuthError>;
}

fn grant(response: AuthResponse) -> Result<SessionGrant, AuthError> {
    match (response.tokens, response.user) {
        (Some(tokens), Some(user)) => Ok(SessionGrant { tokens, user }),
        _ => Err(AuthError::Internal("response missing tokens or user".into())),
    }
}

fn network(err: reqwest::Error) -> AuthError {
    AuthError::NetworkFailure(err.to_string())
}

pub struct HttpAuthApi {
    client: Client,
    base_url: String,
}

impl HttpAuthApi {
    pub fn new(config: &ClientConfig) -> Result<Self, AuthError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/auth{}", self.base_url, path)
    }

    async fn send(&self, request: RequestBuilder) -> Result<AuthResponse, AuthError> {
        let response = request.send().await.map_err(network)?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(AuthError::Unauthenticated);
        }

        let body: AuthResponse = response.json().await.map_err(|e| {
            tracing::warn!("Unreadable auth response ({}): {}", status, e);
            AuthError::NetworkFailure(format!("unexpected response ({})", status))
        })?;
        match body.error() {
            Some(err) => Err(err),
            None => Ok(body),
        }
    }
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    async fn login(&self, request: LoginRequest) -> Result<SessionGrant, AuthError> {
        let response = self.send(self.client.post(self.url("/login")).json(&request)).await?;
        grant(response)
    }

    async fn wallet_login(&self, request: WalletLoginRequest) -> Result<SessionGrant, AuthError> {
        let response = self
            .send(self.client.post(self.url("/wallet-login")).json(&request))
            .await?;
        grant(response)
    }

    async fn register(&self, request: RegisterRequest) -> Result<Registered, AuthError> {
        let response = self.send(self.client.post(self.url("/register")).json(&request)).await?;
        let user = response
            .user
            .ok_or_else(|| AuthError::Internal("response missing user".into()))?;
        Ok(Registered {
            tokens: response.tokens,
            user,
        })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<SessionGrant, AuthError> {
        let body = RefreshTokenRequest {
            refresh_token: refresh_token.to_string(),
        };
        let response = self.send(self.client.post(self.url("/refresh")).json(&body)).await?;
        grant(response)
    }

    // The refresh token lets the server revoke even after the access token expired
    async fn logout(&self, tokens: &TokenPair) -> Result<(), AuthError> {
        let body = RefreshTokenRequest {
            refresh_token: tokens.refresh_token.clone(),
        };
        let request = self
            .client
            .post(self.url("/logout"))
            .bearer_auth(&tokens.access_token)
            .json(&body);
        self.send(request).await.map(|_| ())
    }

    async fn me(&self, tokens: &TokenPair) -> Result<Identity, AuthError> {
        let response = self
            .send(self.client.get(self.url("/me")).bearer_auth(&tokens.access_token))
            .await?;
        response.user.ok_or(AuthError::Unauthenticated)
    }
}
