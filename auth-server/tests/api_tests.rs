// auth-server/tests/api_tests.rs
use actix_web::http::{header, StatusCode};
use actix_web::{test, web, App};
use auth_server::credentials::build_challenge;
use auth_server::middleware::RateLimiter;
use auth_server::service::AuthService;
use auth_server::signature::{address_of, sign_message};
use auth_server::{api, build_memory_service};
use chrono::{Duration, Utc};
use common::models::{TokenPair, UserStatus};
use common::{AuthResponse, Config, ErrorCode};
use secp256k1::SecretKey;
use serde_json::{json, Value};

const PASSWORD: &str = "Str0ng!Pass";

fn test_config() -> Config {
    let mut config = Config::default();
    config.auth.secret_key = "integration-secret".into();
    config.rate_limit.login_per_minute = 1000;
    config.rate_limit.register_per_minute = 1000;
    config
}

macro_rules! app {
    ($config:expr) => {{
        let config: &Config = &$config;
        let service = build_memory_service(config);
        let limiter = RateLimiter::for_auth(api::AUTH_SCOPE, &config.rate_limit);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(service.clone()))
                .configure(api::configure(limiter)),
        )
        .await;
        (app, service)
    }};
}

macro_rules! send {
    ($app:expr, $req:expr) => {{
        let resp = test::call_service(&$app, $req.to_request()).await;
        let status = resp.status();
        let body: AuthResponse = test::read_body_json(resp).await;
        (status, body)
    }};
}

fn register_body(username: &str) -> Value {
    json!({
        "username": username,
        "email": format!("{}@example.com", username),
        "password": PASSWORD,
        "confirmPassword": PASSWORD,
    })
}

fn post(path: &str, body: Value) -> test::TestRequest {
    test::TestRequest::post().uri(path).set_json(body)
}

fn bearer(req: test::TestRequest, tokens: &TokenPair) -> test::TestRequest {
    req.insert_header((header::AUTHORIZATION, tokens.authorization()))
}

fn wallet_key(byte: u8) -> (SecretKey, String) {
    let key = SecretKey::from_slice(&[byte; 32]).unwrap();
    let address = address_of(&key);
    (key, address)
}

fn wallet_login_body(key: &SecretKey, address: &str, nonce: &str, issued_at: chrono::DateTime<Utc>) -> Value {
    let message = build_challenge("localhost", address, nonce, issued_at);
    json!({
        "walletAddress": address,
        "signature": sign_message(key, &message),
        "message": message,
    })
}

const DISABLED: [UserStatus; 2] = [UserStatus::Banned, UserStatus::Inactive];

async fn set_status(service: &AuthService, username: &str, status: UserStatus) {
    let mut identity = service.identities().find_by_username(username).await.unwrap();
    identity.status = status;
    service.identities().update(identity).await.unwrap();
}

#[actix_rt::test]
async fn test_register_then_login() {
    let (app, service) = app!(test_config());

    let (status, body) = send!(app, post("/api/auth/register", register_body("alice")));
    assert_eq!(status, StatusCode::OK);
    assert!(body.success);
    assert_eq!(body.message, "User registered successfully");
    let user = body.user.unwrap();
    assert_eq!(user.username, "alice");
    assert_eq!(user.status, UserStatus::Active);
    assert!(body.tokens.is_some());
    assert!(service.identities().password_hash(user.id).await.is_some());

    let (status, body) = send!(
        app,
        post("/api/auth/login", json!({ "identifier": "alice", "password": PASSWORD }))
    );
    assert_eq!(status, StatusCode::OK);
    assert!(body.success);
    let tokens = body.tokens.unwrap();
    assert_eq!(tokens.token_type, "bearer");
    assert_eq!(tokens.expires_in, 1800);

    let (status, body) = send!(
        app,
        post("/api/auth/login", json!({ "identifier": "alice@example.com", "password": PASSWORD }))
    );
    assert_eq!(status, StatusCode::OK);
    assert!(body.success);
}

#[actix_rt::test]
async fn test_register_rejects_duplicates_and_weak_passwords() {
    let (app, _service) = app!(test_config());
    send!(app, post("/api/auth/register", register_body("alice")));

    let (status, body) = send!(app, post("/api/auth/register", register_body("alice")));
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body.code, Some(ErrorCode::Conflict));

    let mut weak = register_body("carol");
    weak["password"] = json!("password");
    weak["confirmPassword"] = json!("password");
    let (status, body) = send!(app, post("/api/auth/register", weak));
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body.code, Some(ErrorCode::Validation));
}

#[actix_rt::test]
async fn test_login_verdicts() {
    let (app, service) = app!(test_config());
    send!(app, post("/api/auth/register", register_body("alice")));

    let (_, body) = send!(
        app,
        post("/api/auth/login", json!({ "identifier": "alice", "password": "Wr0ng!Pass" }))
    );
    assert!(!body.success);
    assert_eq!(body.code, Some(ErrorCode::BadCredential));
    assert!(body.tokens.is_none());

    let (_, body) = send!(
        app,
        post("/api/auth/login", json!({ "identifier": "nobody", "password": PASSWORD }))
    );
    assert_eq!(body.code, Some(ErrorCode::NotFound));
}

#[actix_rt::test]
async fn test_disabled_identity_cannot_login() {
    for status in DISABLED {
        let (app, service) = app!(test_config());
        send!(app, post("/api/auth/register", register_body("alice")));

        set_status(&service, "alice", status).await;
        let (http_status, body) = send!(
            app,
            post("/api/auth/login", json!({ "identifier": "alice", "password": PASSWORD }))
        );
        assert_eq!(http_status, StatusCode::OK);
        assert!(!body.success);
        assert_eq!(body.code, Some(ErrorCode::Disabled), "{:?}", status);
        assert_eq!(body.message, "Account is disabled");
        assert!(body.tokens.is_none());
    }
}

#[actix_rt::test]
async fn test_each_login_issues_fresh_pair() {
    let (app, _service) = app!(test_config());
    send!(app, post("/api/auth/register", register_body("alice")));

    let login = || post("/api/auth/login", json!({ "identifier": "alice", "password": PASSWORD }));
    let (_, first) = send!(app, login());
    let (_, second) = send!(app, login());
    let first = first.tokens.unwrap();
    let second = second.tokens.unwrap();
    assert_ne!(first.refresh_token, second.refresh_token);
    assert_ne!(first.access_token, second.access_token);

    // The superseded pair is dead
    let (_, body) = send!(
        app,
        post("/api/auth/refresh", json!({ "refreshToken": first.refresh_token }))
    );
    assert_eq!(body.code, Some(ErrorCode::Rejected));
    let (status, _) = send!(app, bearer(test::TestRequest::get().uri("/api/auth/me"), &first));
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_rt::test]
async fn test_refresh_rotates_once() {
    let (app, _service) = app!(test_config());
    let (_, body) = send!(app, post("/api/auth/register", register_body("alice")));
    let issued = body.tokens.unwrap();

    let (status, body) = send!(
        app,
        post("/api/auth/refresh", json!({ "refreshToken": issued.refresh_token }))
    );
    assert_eq!(status, StatusCode::OK);
    assert!(body.success);
    let rotated = body.tokens.unwrap();
    assert_ne!(rotated.access_token, issued.access_token);
    assert_ne!(rotated.refresh_token, issued.refresh_token);

    let (status, body) = send!(
        app,
        post("/api/auth/refresh", json!({ "refreshToken": issued.refresh_token }))
    );
    assert_eq!(status, StatusCode::OK);
    assert!(!body.success);
    assert_eq!(body.code, Some(ErrorCode::Rejected));

    let (status, body) = send!(app, bearer(test::TestRequest::get().uri("/api/auth/me"), &rotated));
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.user.unwrap().username, "alice");
}

#[actix_rt::test]
async fn test_concurrent_refresh_single_winner() {
    let (app, _service) = app!(test_config());
    let (_, body) = send!(app, post("/api/auth/register", register_body("alice")));
    let issued = body.tokens.unwrap();

    let request = || {
        post("/api/auth/refresh", json!({ "refreshToken": issued.refresh_token })).to_request()
    };
    let (a, b) = futures_util::future::join(
        test::call_service(&app, request()),
        test::call_service(&app, request()),
    )
    .await;
    let a: AuthResponse = test::read_body_json(a).await;
    let b: AuthResponse = test::read_body_json(b).await;

    assert_eq!([a.success, b.success].iter().filter(|s| **s).count(), 1);
    let loser = if a.success { b } else { a };
    assert_eq!(loser.code, Some(ErrorCode::Rejected));
}

#[actix_rt::test]
async fn test_refresh_for_banned_identity() {
    let (app, service) = app!(test_config());
    let (_, body) = send!(app, post("/api/auth/register", register_body("alice")));
    let issued = body.tokens.unwrap();

    set_status(&service, "alice", UserStatus::Banned).await;
    let (_, body) = send!(
        app,
        post("/api/auth/refresh", json!({ "refreshToken": issued.refresh_token }))
    );
    assert_eq!(body.code, Some(ErrorCode::Disabled));
    assert!(body.tokens.is_none());
}

#[actix_rt::test]
async fn test_logout_revokes_session() {
    let (app, _service) = app!(test_config());
    let (_, body) = send!(app, post("/api/auth/register", register_body("alice")));
    let tokens = body.tokens.unwrap();

    let (status, body) = send!(app, bearer(test::TestRequest::post().uri("/api/auth/logout"), &tokens));
    assert_eq!(status, StatusCode::OK);
    assert!(body.success);

    let resp = test::call_service(
        &app,
        bearer(test::TestRequest::get().uri("/api/auth/me"), &tokens).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.headers().contains_key(header::WWW_AUTHENTICATE));

    let (_, body) = send!(
        app,
        post("/api/auth/refresh", json!({ "refreshToken": tokens.refresh_token }))
    );
    assert_eq!(body.code, Some(ErrorCode::Rejected));
}

#[actix_rt::test]
async fn test_logout_with_refresh_token_only() {
    let (app, _service) = app!(test_config());
    let (_, body) = send!(app, post("/api/auth/register", register_body("alice")));
    let tokens = body.tokens.unwrap();

    // The access token is unusable but the refresh token still names the session
    let (status, body) = send!(
        app,
        post("/api/auth/logout", json!({ "refreshToken": tokens.refresh_token }))
            .insert_header((header::AUTHORIZATION, "Bearer expired"))
    );
    assert_eq!(status, StatusCode::OK);
    assert!(body.success);

    let (_, body) = send!(
        app,
        post("/api/auth/refresh", json!({ "refreshToken": tokens.refresh_token }))
    );
    assert_eq!(body.code, Some(ErrorCode::Rejected));
    let (status, _) = send!(app, bearer(test::TestRequest::get().uri("/api/auth/me"), &tokens));
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_rt::test]
async fn test_logout_with_superseded_refresh_token_keeps_session() {
    let (app, _service) = app!(test_config());
    let (_, body) = send!(app, post("/api/auth/register", register_body("alice")));
    let issued = body.tokens.unwrap();
    let (_, body) = send!(
        app,
        post("/api/auth/refresh", json!({ "refreshToken": issued.refresh_token }))
    );
    let rotated = body.tokens.unwrap();

    let (status, body) = send!(
        app,
        post("/api/auth/logout", json!({ "refreshToken": issued.refresh_token }))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.code, Some(ErrorCode::Rejected));

    let (status, _) = send!(app, bearer(test::TestRequest::get().uri("/api/auth/me"), &rotated));
    assert_eq!(status, StatusCode::OK);
}

#[actix_rt::test]
async fn test_logout_without_credentials() {
    let (app, _service) = app!(test_config());
    let (status, body) = send!(app, test::TestRequest::post().uri("/api/auth/logout"));
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body.code, Some(ErrorCode::Unauthenticated));
}

#[actix_rt::test]
async fn test_malformed_body_keeps_envelope() {
    let (app, _service) = app!(test_config());

    let (status, body) = send!(app, post("/api/auth/refresh", json!({})));
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(!body.success);
    assert_eq!(body.code, Some(ErrorCode::Validation));
    assert!(body.message.contains("refreshToken"), "{}", body.message);

    let (status, body) = send!(
        app,
        test::TestRequest::post()
            .uri("/api/auth/login")
            .insert_header((header::CONTENT_TYPE, "application/json"))
            .set_payload("{not json")
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body.code, Some(ErrorCode::Validation));

    let (status, body) = send!(app, test::TestRequest::get().uri("/api/auth/challenge"));
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body.code, Some(ErrorCode::Validation));
}

#[actix_rt::test]
async fn test_me_requires_bearer() {
    let (app, _service) = app!(test_config());
    let (status, body) = send!(app, test::TestRequest::get().uri("/api/auth/me"));
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body.code, Some(ErrorCode::Unauthenticated));

    let (status, _) = send!(
        app,
        test::TestRequest::get()
            .uri("/api/auth/me")
            .insert_header((header::AUTHORIZATION, "Bearer not-a-token"))
    );
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_rt::test]
async fn test_change_password_revokes_session() {
    let (app, _service) = app!(test_config());
    let (_, body) = send!(app, post("/api/auth/register", register_body("alice")));
    let tokens = body.tokens.unwrap();
    let new_password = "N3w!Password";

    let (status, body) = send!(
        app,
        bearer(
            post(
                "/api/auth/change-password",
                json!({
                    "currentPassword": PASSWORD,
                    "newPassword": new_password,
                    "confirmPassword": new_password,
                })
            ),
            &tokens
        )
    );
    assert_eq!(status, StatusCode::OK);
    assert!(body.success);

    let (status, _) = send!(app, bearer(test::TestRequest::get().uri("/api/auth/me"), &tokens));
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (_, body) = send!(
        app,
        post("/api/auth/login", json!({ "identifier": "alice", "password": PASSWORD }))
    );
    assert_eq!(body.code, Some(ErrorCode::BadCredential));
    let (_, body) = send!(
        app,
        post("/api/auth/login", json!({ "identifier": "alice", "password": new_password }))
    );
    assert!(body.success);
}

#[actix_rt::test]
async fn test_pending_registration_issues_no_tokens() {
    let mut config = test_config();
    config.auth.require_email_verification = true;
    let (app, _service) = app!(config);

    let (status, body) = send!(app, post("/api/auth/register", register_body("alice")));
    assert_eq!(status, StatusCode::OK);
    assert!(body.success);
    assert!(body.tokens.is_none());
    assert_eq!(body.user.unwrap().status, UserStatus::Pending);

    let (_, body) = send!(
        app,
        post("/api/auth/login", json!({ "identifier": "alice", "password": PASSWORD }))
    );
    assert_eq!(body.code, Some(ErrorCode::Unverified));
    assert!(body.tokens.is_none());
}

#[actix_rt::test]
async fn test_wallet_login_provisions_identity() {
    let (app, service) = app!(test_config());
    let (key, address) = wallet_key(7);

    let (status, body) = send!(
        app,
        post("/api/auth/wallet-login", wallet_login_body(&key, &address, "first", Utc::now()))
    );
    assert_eq!(status, StatusCode::OK);
    assert!(body.success, "{}", body.message);
    assert!(body.tokens.is_some());

    let user = body.user.unwrap();
    assert!(user.username.starts_with("wallet_"));
    assert_eq!(user.primary_wallet.as_deref(), Some(address.as_str()));
    assert!(user.wallet(&address).unwrap().is_verified);

    // Second login resolves the same identity
    let (_, body) = send!(
        app,
        post("/api/auth/wallet-login", wallet_login_body(&key, &address, "second", Utc::now()))
    );
    assert_eq!(body.user.unwrap().id, user.id);
    assert_eq!(service.identities().find_by_wallet(&address).await.unwrap().id, user.id);
}

#[actix_rt::test]
async fn test_wallet_login_through_generic_login() {
    let (app, _service) = app!(test_config());
    let (key, address) = wallet_key(8);
    let message = build_challenge("localhost", &address, "generic", Utc::now());

    let (_, body) = send!(
        app,
        post(
            "/api/auth/login",
            json!({
                "identifier": address,
                "signature": sign_message(&key, &message),
                "message": message,
            })
        )
    );
    assert!(body.success, "{}", body.message);

    let (status, body) = send!(app, post("/api/auth/login", json!({ "identifier": address })));
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body.code, Some(ErrorCode::Validation));
}

#[actix_rt::test]
async fn test_wallet_signature_mismatch() {
    let (app, _service) = app!(test_config());
    let (_, address) = wallet_key(7);
    let (other_key, _) = wallet_key(9);

    let (status, body) = send!(
        app,
        post("/api/auth/wallet-login", wallet_login_body(&other_key, &address, "n1", Utc::now()))
    );
    assert_eq!(status, StatusCode::OK);
    assert!(!body.success);
    assert_eq!(body.code, Some(ErrorCode::SignatureMismatch));
    assert!(body.tokens.is_none());
}

#[actix_rt::test]
async fn test_wallet_replay_rejected() {
    let (app, _service) = app!(test_config());
    let (key, address) = wallet_key(7);
    let signed = wallet_login_body(&key, &address, "once", Utc::now());

    let (_, body) = send!(app, post("/api/auth/wallet-login", signed.clone()));
    assert!(body.success);
    let (_, body) = send!(app, post("/api/auth/wallet-login", signed));
    assert_eq!(body.code, Some(ErrorCode::ReplayRejected));

    let stale = wallet_login_body(&key, &address, "stale", Utc::now() - Duration::seconds(301));
    let (_, body) = send!(app, post("/api/auth/wallet-login", stale));
    assert_eq!(body.code, Some(ErrorCode::ReplayRejected));
}

#[actix_rt::test]
async fn test_disabled_wallet_cannot_login() {
    for status in DISABLED {
        let (app, service) = app!(test_config());
        let (key, address) = wallet_key(7);

        let (_, body) = send!(
            app,
            post("/api/auth/wallet-login", wallet_login_body(&key, &address, "n1", Utc::now()))
        );
        let username = body.user.unwrap().username;
        set_status(&service, &username, status).await;

        let (_, body) = send!(
            app,
            post("/api/auth/wallet-login", wallet_login_body(&key, &address, "n2", Utc::now()))
        );
        assert_eq!(body.code, Some(ErrorCode::Disabled), "{:?}", status);
        assert!(body.tokens.is_none());
    }
}

#[actix_rt::test]
async fn test_challenge_endpoint() {
    let (app, _service) = app!(test_config());
    let (_, address) = wallet_key(7);

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri(&format!("/api/auth/challenge?address={}", address))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    let challenge = body["challenge"].as_str().unwrap();
    assert!(challenge.contains(&format!("Address: {}", address)));
    assert!(challenge.contains("Nonce: "));

    let (status, _) = send!(app, test::TestRequest::get().uri("/api/auth/challenge?address=0x123"));
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_rt::test]
async fn test_login_rate_limited() {
    let mut config = test_config();
    config.rate_limit.login_per_minute = 2;
    let (app, _service) = app!(config);

    let login = || post("/api/auth/login", json!({ "identifier": "nobody", "password": PASSWORD }));
    send!(app, login());
    send!(app, login());

    let resp = test::call_service(&app, login().to_request()).await;
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(resp.headers().get(header::RETRY_AFTER).unwrap(), "60");
}

#[actix_rt::test]
async fn test_forwarded_headers_do_not_reset_limit() {
    let mut config = test_config();
    config.rate_limit.login_per_minute = 2;
    let (app, _service) = app!(config);
    let peer: std::net::SocketAddr = "203.0.113.9:40000".parse().unwrap();

    let mut limited = 0;
    for i in 0..20 {
        let req = post("/api/auth/login", json!({ "identifier": "nobody", "password": PASSWORD }))
            .peer_addr(peer)
            .insert_header(("x-forwarded-for", format!("10.0.0.{}", i)))
            .insert_header((header::FORWARDED, format!("for=10.0.1.{}", i)));
        let resp = test::call_service(&app, req.to_request()).await;
        if resp.status() == StatusCode::TOO_MANY_REQUESTS {
            limited += 1;
        }
    }
    assert_eq!(limited, 18);

    // A different peer has its own budget
    let other: std::net::SocketAddr = "203.0.113.10:40000".parse().unwrap();
    let (status, _) = send!(
        app,
        post("/api/auth/login", json!({ "identifier": "nobody", "password": PASSWORD })).peer_addr(other)
    );
    assert_eq!(status, StatusCode::OK);
}
