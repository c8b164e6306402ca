// auth-server/src/api/mod.rs
pub mod auth;

use actix_web::{error, web, HttpRequest};
use common::AuthError;

use crate::error::ApiError;
use crate::middleware::RateLimiter;

pub const AUTH_SCOPE: &str = "/api/auth";

/// Malformed bodies and queries answer with the usual envelope
fn rejected_payload(err: impl std::fmt::Display, req: &HttpRequest) -> error::Error {
    tracing::debug!("Rejected payload on {}: {}", req.path(), err);
    ApiError::from(AuthError::Validation(err.to_string())).into()
}

/// Mount the auth routes behind `limiter`. Clones of one limiter share counters.
pub fn configure(limiter: RateLimiter) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        cfg.service(
            web::scope(AUTH_SCOPE)
                .wrap(limiter)
                .app_data(web::JsonConfig::default().error_handler(|err, req| rejected_payload(err, req)))
                .app_data(web::QueryConfig::default().error_handler(|err, req| rejected_payload(err, req)))
                .service(auth::login)
                .service(auth::register)
                .service(auth::wallet_login)
                .service(auth::refresh)
                .service(auth::logout)
                .service(auth::me)
                .service(auth::change_password)
                .service(auth::challenge),
        );
    }
}
