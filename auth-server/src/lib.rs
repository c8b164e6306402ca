// auth-server/src/lib.rs
pub mod api;
pub mod credentials;
pub mod error;
pub mod identity_store;
pub mod issuer;
pub mod middleware;
pub mod password;
pub mod service;
pub mod session_registry;
pub mod signature;
pub mod store;
pub mod utils;
pub mod validation;

use actix::Actor;
use common::Config;
use std::sync::Arc;

use crate::identity_store::{IdentityStore, MemoryIdentityStore};
use crate::issuer::TokenIssuer;
use crate::service::AuthService;
use crate::session_registry::SessionRegistryActor;

/// Wire the service over `identities`. Must run inside an actix system.
pub fn build_service(config: &Config, identities: Arc<dyn IdentityStore>) -> AuthService {
    let issuer = TokenIssuer::from_config(&config.auth);
    let registry = SessionRegistryActor::new(issuer.clone())
        .with_cleanup_interval(config.auth.session_cleanup_interval_secs)
        .start();

    AuthService::new(identities, issuer, registry, config.auth.clone())
}

/// Service backed by the in-memory identity store
pub fn build_memory_service(config: &Config) -> AuthService {
    build_service(config, Arc::new(MemoryIdentityStore::new()))
}
