// auth-server/src/middleware/rate_limiter.rs
use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use common::{AuthError, RateLimitConfig};
use dashmap::DashMap;
use futures_util::future::{ready, LocalBoxFuture, Ready};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::ApiError;

const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);
/// Tracked keys before idle clients are swept
const SWEEP_THRESHOLD: usize = 1024;

/// Maximum requests per window for paths starting with `prefix`
#[derive(Debug, Clone)]
pub struct RateLimitRule {
    pub prefix: String,
    pub max_requests: usize,
}

/// Sliding-window limiter keyed by peer IP and rule. Forwarded headers are
/// client controlled and never used as the key.
#[derive(Debug, Clone, Default)]
pub struct RateLimiter {
    rules: Vec<RateLimitRule>,
    window: Duration,
    hits: Arc<DashMap<(String, usize), Vec<Instant>>>,
}

impl RateLimiter {
    pub fn new(rules: Vec<RateLimitRule>) -> Self {
        Self {
            rules,
            window: RATE_LIMIT_WINDOW,
            hits: Arc::new(DashMap::new()),
        }
    }

    /// Login and registration limits under `scope`
    pub fn for_auth(scope: &str, config: &RateLimitConfig) -> Self {
        Self::new(vec![
            RateLimitRule {
                prefix: format!("{}/login", scope),
                max_requests: config.login_per_minute,
            },
            RateLimitRule {
                prefix: format!("{}/wallet-login", scope),
                max_requests: config.login_per_minute,
            },
            RateLimitRule {
                prefix: format!("{}/register", scope),
                max_requests: config.register_per_minute,
            },
        ])
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Count a request; true if it exceeds the rule for its path
    pub fn is_rate_limited(&self, ip: &str, path: &str) -> bool {
        let Some((index, rule)) = self
            .rules
            .iter()
            .enumerate()
            .find(|(_, rule)| path.starts_with(&rule.prefix))
        else {
            return false;
        };

        if self.tracked() >= SWEEP_THRESHOLD {
            self.purge_idle();
        }

        let now = Instant::now();
        let mut entry = self.hits.entry((ip.to_string(), index)).or_default();
        entry.retain(|time| now.duration_since(*time) < self.window);

        if entry.len() >= rule.max_requests {
            true
        } else {
            entry.push(now);
            false
        }
    }

    /// Drop keys whose hits have all left the window
    pub fn purge_idle(&self) -> usize {
        let now = Instant::now();
        let before = self.hits.len();
        self.hits.retain(|_, times| {
            times.retain(|time| now.duration_since(*time) < self.window);
            !times.is_empty()
        });
        let removed = before.saturating_sub(self.hits.len());
        if removed > 0 {
            tracing::debug!("Swept {} idle rate limit entries", removed);
        }
        removed
    }

    pub fn tracked(&self) -> usize {
        self.hits.len()
    }
}

fn client_ip(req: &ServiceRequest) -> String {
    req.peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

impl<S, B> Transform<S, ServiceRequest> for RateLimiter
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RateLimiterMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimiterMiddleware {
            service,
            limiter: self.clone(),
        }))
    }
}

pub struct RateLimiterMiddleware<S> {
    service: S,
    limiter: RateLimiter,
}

impl<S, B> Service<ServiceRequest> for RateLimiterMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let ip = client_ip(&req);

        if self.limiter.is_rate_limited(&ip, req.path()) {
            tracing::warn!("Rate limit exceeded for IP {} on {}", ip, req.path());
            let response = req
                .error_response(ApiError::from(AuthError::RateLimited))
                .map_into_right_body();
            return Box::pin(async { Ok(response) });
        }

        let fut = self.service.call(req);
        Box::pin(async move { fut.await.map(ServiceResponse::map_into_left_body) })
    }
}
